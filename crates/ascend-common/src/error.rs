//! Error types for Ascend

use thiserror::Error;

/// Result type alias for Ascend operations
pub type Result<T> = std::result::Result<T, AscendError>;

/// Main error type for Ascend
///
/// The per-file pipeline steps report their failures through this type so the
/// orchestrator can log the reason and carry on with the next step.
#[derive(Error, Debug)]
pub enum AscendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Title lookup error: {0}")]
    TitleLookup(String),

    #[error("Notification error: {0}")]
    Notification(String),
}

impl AscendError {
    /// Missing configuration key
    pub fn missing_key(key: &str) -> Self {
        AscendError::Config(format!("{} must be set", key))
    }
}
