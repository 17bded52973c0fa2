//! Chat-completions wire format.

use crate::conversation::{Content, Conversation, Part, Turn};
use serde::{Deserialize, Serialize};

/// Request body: `{model, messages}`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, conversation: &Conversation) -> Self {
        Self {
            model: model.into(),
            messages: conversation.turns().iter().map(ChatMessage::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: MessageContent,
}

/// Either a plain string or an array of typed parts.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

impl From<&Turn> for ChatMessage {
    fn from(turn: &Turn) -> Self {
        let content = match &turn.content {
            Content::Text(text) => MessageContent::Text(text.clone()),
            Content::Parts(parts) => {
                MessageContent::Parts(parts.iter().map(ContentPart::from).collect())
            }
        };
        Self {
            role: turn.role.as_str(),
            content,
        }
    }
}

impl From<&Part> for ContentPart {
    fn from(part: &Part) -> Self {
        match part {
            Part::Text(text) => ContentPart::Text { text: text.clone() },
            Part::Image(image) => ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: image.to_url(),
                },
            },
        }
    }
}

/// Response envelope: `{choices: [{message: {content}}], error?: {message}}`.
///
/// Every field may be missing or `null` on the wire; error responses from
/// proxies often send `"choices": null` next to the error object.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Option<Vec<ChatChoice>>,
    #[serde(default)]
    pub error: Option<ApiError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    #[serde(default)]
    pub message: Option<ChoiceMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChoiceMessage {
    /// `null` for refusals and tool calls
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub message: Option<String>,
}

impl ChatResponse {
    /// The provider's error message, if it sent a non-empty one.
    pub fn error_message(&self) -> Option<&str> {
        self.error
            .as_ref()
            .and_then(|e| e.message.as_deref())
            .filter(|m| !m.is_empty())
    }

    /// Text of the first choice. `None` when `choices` is missing, `null`
    /// or empty; a `null` message or content reads as empty text.
    pub fn first_answer(&self) -> Option<&str> {
        self.choices.as_deref().and_then(<[ChatChoice]>::first).map(|c| {
            c.message
                .as_ref()
                .and_then(|m| m.content.as_deref())
                .unwrap_or("")
        })
    }
}
