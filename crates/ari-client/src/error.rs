//! Error types for ARI operations

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AriError {
    #[error("Websocket transport error: {0}")]
    Transport(String),

    #[error("Event socket closed by server")]
    ConnectionClosed,

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("ARI rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Failed to decode ARI payload: {0}")]
    Decode(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for AriError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AriError::Timeout(err.to_string())
        } else if err.is_connect() {
            AriError::Transport(err.to_string())
        } else {
            AriError::Http(err.to_string())
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for AriError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        AriError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for AriError {
    fn from(err: serde_json::Error) -> Self {
        AriError::Decode(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AriError>;
