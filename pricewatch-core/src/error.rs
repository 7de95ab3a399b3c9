//! Error types shared across Pricewatch crates

use thiserror::Error;

/// Workspace-wide error type
#[derive(Error, Debug)]
pub enum PricewatchError {
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Unknown asset: {0}")]
    UnknownAsset(String),
}

impl PricewatchError {
    pub fn invalid_message(msg: impl Into<String>) -> Self {
        PricewatchError::InvalidMessage(msg.into())
    }

    pub fn unknown_asset(asset: impl Into<String>) -> Self {
        PricewatchError::UnknownAsset(asset.into())
    }
}

impl From<serde_json::Error> for PricewatchError {
    fn from(err: serde_json::Error) -> Self {
        PricewatchError::InvalidMessage(format!("Invalid JSON: {}", err))
    }
}

/// Result type alias for Pricewatch operations
pub type PricewatchResult<T> = Result<T, PricewatchError>;
