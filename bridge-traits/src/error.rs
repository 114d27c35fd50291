use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Unsupported source: {0}")]
    UnsupportedSource(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Shorthand used by host adapters when wrapping a platform error message.
    pub fn failed(message: impl Into<String>) -> Self {
        BridgeError::OperationFailed(message.into())
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
