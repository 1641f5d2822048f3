use shared::types::FormError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BoardError {
    /// The backend answered with a non-success status.
    #[error("Provider error ({status}): {message}")]
    Provider {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    Form(#[from] FormError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The owning view was torn down before the operation finished.
    #[error("Operation cancelled")]
    Cancelled,
}

impl BoardError {
    pub fn provider(status: u16, message: impl Into<String>) -> Self {
        Self::Provider {
            status,
            code: None,
            message: message.into(),
        }
    }

    /// Text shown to the user in a notice.
    pub fn user_message(&self) -> String {
        match self {
            Self::Provider { message, .. } => message.clone(),
            Self::Http(e) if e.is_timeout() => "The server took too long to answer".to_string(),
            Self::Http(_) => "Could not reach the server".to_string(),
            Self::Decode(_) => "Unexpected response from the server".to_string(),
            Self::Form(e) => e.to_message(),
            Self::Config(msg) => msg.clone(),
            Self::Cancelled => "Operation cancelled".to_string(),
        }
    }
}
