//! Error types for the remote video API.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VeoError {
    /// Non-2xx response. Carries the status code and the response body.
    #[error("API Error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to parse response: {source}, body: {body}")]
    Decode {
        #[source]
        source: serde_json::Error,
        body: String,
    },
}

impl VeoError {
    /// HTTP status of a non-success response, if that is what this error is.
    pub fn status(&self) -> Option<u16> {
        match self {
            VeoError::Api { status, .. } => Some(*status),
            VeoError::Transport(e) => e.status().map(|s| s.as_u16()),
            VeoError::Decode { .. } => None,
        }
    }
}
