use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Element is detached from DOM: {0}")]
    ElementDetached(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid key sequence: {0}")]
    InvalidKeySequence(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Browser backend error: {0}")]
    Browser(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl E2eError {
    /// Errors that a retrying query or assertion may swallow and try again on.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            E2eError::ElementNotFound(_) | E2eError::ElementDetached(_)
        )
    }
}

impl From<chromiumoxide::error::CdpError> for E2eError {
    fn from(e: chromiumoxide::error::CdpError) -> Self {
        E2eError::Browser(e.to_string())
    }
}
