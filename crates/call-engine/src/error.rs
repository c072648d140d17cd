//! Error types for call-distribution operations
//!
//! Repository operations return structured failures; the router decides
//! recovery. Media failures tear down the current routing attempt only, store
//! failures during selection degrade to "no agent available", and loss of the
//! control transport is fatal to the process.

use thiserror::Error;

use crate::store::StoreError;
use acd_ari_client::AriError;

#[derive(Debug, Error)]
pub enum CallCenterError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Illegal state: {0}")]
    IllegalState(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Media error: {0}")]
    Media(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CallCenterError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        CallCenterError::InvalidInput(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        CallCenterError::NotFound(what.into())
    }

    pub fn illegal_state(msg: impl Into<String>) -> Self {
        CallCenterError::IllegalState(msg.into())
    }

    pub fn media(msg: impl Into<String>) -> Self {
        CallCenterError::Media(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        CallCenterError::Configuration(msg.into())
    }
}

impl From<AriError> for CallCenterError {
    fn from(err: AriError) -> Self {
        match err {
            AriError::Transport(_) | AriError::ConnectionClosed => {
                CallCenterError::Transport(err.to_string())
            }
            AriError::Timeout(_) => CallCenterError::Timeout(err.to_string()),
            AriError::Config(_) => CallCenterError::Configuration(err.to_string()),
            other => CallCenterError::Media(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, CallCenterError>;
