use crate::error::ConfigError;

/// Chat completions endpoint used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Vision-capable model used when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-4o";

pub const API_KEY_VAR: &str = "OPENAI_API_KEY";

/// Configuration for the model gateway.
#[derive(Clone)]
pub struct AnalyzerConfig {
    /// Full URL of the chat completions endpoint
    pub endpoint: String,
    /// Model identifier sent with every request
    pub model: String,
    /// Bearer token for the provider
    pub api_key: String,
}

impl std::fmt::Debug for AnalyzerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyzerConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: String::new(),
        }
    }
}

impl AnalyzerConfig {
    /// Create a config with the given API key and default endpoint/model.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    /// Set the chat completions endpoint.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the model identifier.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Load from `OPENAI_API_KEY`, with optional `OPENAI_API_URL` and
    /// `TABLEMAP_MODEL` overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(API_KEY_VAR)
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingApiKey(API_KEY_VAR))?;

        let mut config = Self::new(api_key);
        if let Some(endpoint) = lookup("OPENAI_API_URL").filter(|v| !v.trim().is_empty()) {
            config = config.endpoint(endpoint.trim());
        }
        if let Some(model) = lookup("TABLEMAP_MODEL").filter(|v| !v.trim().is_empty()) {
            config = config.model(model.trim());
        }
        Ok(config)
    }
}

/// Configuration for the upload server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// Origin allowed by CORS (the web frontend)
    pub allowed_origin: String,
    /// Maximum accepted request body, in bytes
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            allowed_origin: "http://localhost:5173".to_string(),
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// Load from `TABLEMAP_BIND`, `TABLEMAP_PORT`, `TABLEMAP_ALLOWED_ORIGIN`
    /// and `TABLEMAP_MAX_UPLOAD_BYTES`, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            bind_address: lookup("TABLEMAP_BIND").unwrap_or(defaults.bind_address),
            port: parse_var(&lookup, "TABLEMAP_PORT")?.unwrap_or(defaults.port),
            allowed_origin: lookup("TABLEMAP_ALLOWED_ORIGIN").unwrap_or(defaults.allowed_origin),
            max_upload_bytes: parse_var(&lookup, "TABLEMAP_MAX_UPLOAD_BYTES")?
                .unwrap_or(defaults.max_upload_bytes),
        })
    }

    /// `bind_address:port`
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

fn parse_var<F, T>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { name, value: raw }),
    }
}
