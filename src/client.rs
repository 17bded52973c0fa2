use crate::conversation::{Conversation, ImageReference};
use crate::error::{AnalyzeError, Result};
use crate::parser;
use crate::prompt::{self, PromptProfile};
use crate::types::AnalyzerConfig;
use crate::wire::{ChatRequest, ChatResponse};
use reqwest::Client;
use tracing::{debug, info, instrument, warn};

/// Sends floor-plan images to a multimodal chat model and returns the
/// sanitized answer text.
///
/// Each call builds its own conversation and request, so one analyzer can
/// be shared across concurrent requests. There are no retries and no
/// client-side timeout beyond the `reqwest` default.
///
/// # Example
/// ```no_run
/// use tablemap::{AnalyzerConfig, FloorPlanAnalyzer};
///
/// # async fn example() -> tablemap::Result<()> {
/// let analyzer = FloorPlanAnalyzer::new(AnalyzerConfig::new("sk-..."));
/// let bytes = std::fs::read("plan.png").unwrap();
/// let json = analyzer.analyze_image(&bytes, "image/png").await?;
/// println!("{}", json);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FloorPlanAnalyzer {
    http: Client,
    config: AnalyzerConfig,
    profile: PromptProfile,
}

impl FloorPlanAnalyzer {
    /// Create an analyzer using the default restaurant-layout profile.
    pub fn new(config: AnalyzerConfig) -> Self {
        Self {
            http: Client::new(),
            config,
            profile: PromptProfile::default(),
        }
    }

    /// Use a custom `reqwest::Client` (for connection pooling, proxies, TLS).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// Replace the prompt profile (system text, schema, exemplars).
    pub fn with_profile(mut self, profile: PromptProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn profile(&self) -> &PromptProfile {
        &self.profile
    }

    /// Analyze raw image bytes.
    ///
    /// The bytes are base64-encoded and sent as an inline image tagged with
    /// `mime_type`. They are not validated; a bad image is reported by the
    /// provider as a [`AnalyzeError::Provider`].
    pub async fn analyze_image(&self, image: &[u8], mime_type: &str) -> Result<String> {
        info!(bytes = image.len(), mime_type, "Analyzing floor plan");
        self.analyze_reference(ImageReference::inline(image, mime_type))
            .await
    }

    /// Analyze an image that is already base64-encoded.
    pub async fn analyze_image_base64(&self, image_b64: &str, mime_type: &str) -> Result<String> {
        self.analyze_reference(ImageReference::inline_base64(image_b64, mime_type))
            .await
    }

    async fn analyze_reference(&self, image: ImageReference) -> Result<String> {
        let conversation = prompt::build_conversation(&self.profile, image);
        self.send_conversation(&conversation).await
    }

    /// Send a prepared conversation and return the sanitized first answer.
    #[instrument(skip_all, fields(model = %self.config.model, turns = conversation.len()))]
    pub async fn send_conversation(&self, conversation: &Conversation) -> Result<String> {
        let request = ChatRequest::new(&self.config.model, conversation);
        debug!(
            endpoint = %self.config.endpoint,
            messages = request.messages.len(),
            "Sending chat request"
        );

        let resp = self
            .http
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Provider request failed");
                AnalyzeError::transport(
                    format!("Cannot reach provider at {}", self.config.endpoint),
                    e,
                )
            })?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| AnalyzeError::transport("Failed to read provider response", e))?;

        // Logged at info so the default filter shows what the provider sent.
        info!(status = status.as_u16(), body = %body, "Raw provider response");

        decode_response(&body)
    }
}

/// Classify a raw response body and extract the sanitized answer.
///
/// - undecodable body: [`AnalyzeError::Transport`]
/// - non-empty `error.message`: [`AnalyzeError::Provider`], whatever `choices` holds
/// - missing, `null` or empty `choices`: [`AnalyzeError::EmptyResponse`]
/// - otherwise the first choice's text with any code fence stripped
pub fn decode_response(body: &str) -> Result<String> {
    let envelope: ChatResponse = serde_json::from_str(body).map_err(|e| {
        warn!(error = %e, "Provider response is not a chat completion envelope");
        AnalyzeError::transport("Failed to decode provider response", e)
    })?;

    if let Some(message) = envelope.error_message() {
        warn!(provider_message = message, "Provider returned an error");
        return Err(AnalyzeError::Provider(message.to_string()));
    }

    let answer = envelope.first_answer().ok_or_else(|| {
        warn!("Provider returned no choices");
        AnalyzeError::EmptyResponse
    })?;

    Ok(parser::strip_code_fence(answer))
}
