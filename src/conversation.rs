//! Conversation model sent to the vision model.
//!
//! A [`Conversation`] is an ordered list of [`Turn`]s. Order matters: the
//! model conditions on the system turn and any worked examples before it
//! sees the target image.

use crate::image;

/// Who a turn is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
        }
    }
}

/// Where an image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageReference {
    /// Remotely fetchable image, used for few-shot exemplars.
    Url(String),
    /// Base64 payload tagged with its media type, used for uploads.
    Inline { mime_type: String, data: String },
}

impl ImageReference {
    /// Encode raw image bytes into an inline reference.
    pub fn inline(bytes: &[u8], mime_type: impl Into<String>) -> Self {
        Self::Inline {
            mime_type: mime_type.into(),
            data: image::encode_image(bytes),
        }
    }

    /// Wrap an already base64-encoded payload.
    pub fn inline_base64(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self::Inline {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    pub fn url(url: impl Into<String>) -> Self {
        Self::Url(url.into())
    }

    /// The URL form the provider accepts: either the remote URL as-is or a
    /// `data:` URL for inline payloads.
    pub fn to_url(&self) -> String {
        match self {
            ImageReference::Url(url) => url.clone(),
            ImageReference::Inline { mime_type, data } => {
                format!("data:{};base64,{}", mime_type, data)
            }
        }
    }
}

/// One element of a multi-part turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Text(String),
    Image(ImageReference),
}

/// Turn content. The variant is fixed when the turn is built; image-bearing
/// turns are always `Parts`, even with a single image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Text(String),
    Parts(Vec<Part>),
}

impl Content {
    /// Number of image parts carried by this content.
    pub fn image_count(&self) -> usize {
        match self {
            Content::Text(_) => 0,
            Content::Parts(parts) => parts
                .iter()
                .filter(|p| matches!(p, Part::Image(_)))
                .count(),
        }
    }

    /// Image parts, in order.
    pub fn images(&self) -> Vec<&ImageReference> {
        match self {
            Content::Text(_) => Vec::new(),
            Content::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    Part::Image(img) => Some(img),
                    Part::Text(_) => None,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub content: Content,
}

impl Turn {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: Content::Text(text.into()),
        }
    }

    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Content::Text(text.into()),
        }
    }

    pub fn user_parts(parts: Vec<Part>) -> Self {
        Self {
            role: Role::User,
            content: Content::Parts(parts),
        }
    }

    /// A user turn carrying a single image and nothing else.
    pub fn user_image(image: ImageReference) -> Self {
        Self::user_parts(vec![Part::Image(image)])
    }
}

/// Ordered turns for a single request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn with_turn(mut self, turn: Turn) -> Self {
        self.turns.push(turn);
        self
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }
}
