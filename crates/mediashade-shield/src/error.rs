use mediashade_core::MediaShadeError;
use mediashade_dom::DomError;
use thiserror::Error;

/// Startup failures. Anything after startup is logged, not returned.
#[derive(Error, Debug)]
pub enum ShieldError {
    #[error("invalid configuration: {0}")]
    Config(#[from] MediaShadeError),

    #[error("DOM error: {0}")]
    Dom(#[from] DomError),
}

pub type ShieldResult<T> = Result<T, ShieldError>;
