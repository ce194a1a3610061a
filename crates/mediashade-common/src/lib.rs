//! # MediaShade Common
//!
//! Shared plumbing for the MediaShade crates.
//!
//! ## Features
//!
//! - Logging configuration and setup
//! - Retry and timeout utilities for collaborator calls and startup

use std::time::Duration;
use thiserror::Error;

pub mod logging;
pub mod retry;

pub use logging::{init_logging, try_init_logging, LogConfig, LogFormat};
pub use retry::{retry_with_backoff, with_timeout, RetryConfig};

/// Errors raised by the shared utilities.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommonError {
    /// An awaited operation did not finish in time.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// The global subscriber could not be installed.
    #[error("Logging setup failed: {0}")]
    Logging(String),
}

/// Result type alias for the shared utilities.
pub type Result<T> = std::result::Result<T, CommonError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            CommonError::Timeout(Duration::from_millis(250)).to_string(),
            "Operation timed out after 250ms"
        );
        assert_eq!(
            CommonError::Logging("already set".into()).to_string(),
            "Logging setup failed: already set"
        );
    }
}
