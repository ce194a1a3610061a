//! Error types for MediaShade

use thiserror::Error;

/// Result type alias for MediaShade operations
pub type MediaShadeResult<T> = Result<T, MediaShadeError>;

/// Main error type for MediaShade
#[derive(Error, Debug)]
pub enum MediaShadeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Preference error: {0}")]
    Preference(#[from] crate::preferences::PreferenceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MediaShadeError {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
