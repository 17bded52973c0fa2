use thiserror::Error;

/// Errors returned by a floor-plan analysis call.
///
/// Every failure surfaces immediately; nothing is retried.
#[derive(Error, Debug)]
pub enum AnalyzeError {
    /// The call could not be completed, or the body was not a response
    /// envelope.
    #[error("{context}: {source}")]
    Transport {
        context: String,
        source: TransportCause,
    },

    /// The provider answered with an error message, kept verbatim.
    #[error("Provider error: {0}")]
    Provider(String),

    /// The envelope parsed but held no answer choices.
    #[error("No response from provider (empty choices)")]
    EmptyResponse,
}

/// Underlying cause of a transport failure.
#[derive(Error, Debug)]
pub enum TransportCause {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Decode(#[from] serde_json::Error),
}

impl AnalyzeError {
    pub(crate) fn transport(context: impl Into<String>, source: impl Into<TransportCause>) -> Self {
        AnalyzeError::Transport {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, AnalyzeError::Transport { .. })
    }

    pub fn is_provider(&self) -> bool {
        matches!(self, AnalyzeError::Provider(_))
    }

    pub fn is_empty_response(&self) -> bool {
        matches!(self, AnalyzeError::EmptyResponse)
    }
}

/// Startup-time configuration failures.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} is not set")]
    MissingApiKey(&'static str),

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },

    #[error("Failed to read prompt profile {path}: {source}")]
    ProfileRead {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid prompt profile: {0}")]
    ProfileParse(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AnalyzeError>;
