use thiserror::Error;

/// Failures talking to the remote document store.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Transport-level fault: unreachable host, timeout, TLS.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The version marker sent with a write no longer matches the stored
    /// document.
    #[error("remote document changed since it was read")]
    Conflict,

    /// The stored file could not be decoded into text.
    #[error("malformed remote content: {0}")]
    Content(String),

    /// Any other non-success response.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("access token is not a valid header value")]
    InvalidCredential,
}

impl SyncError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict)
    }
}
