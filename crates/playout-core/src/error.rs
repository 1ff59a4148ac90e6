//! Error types for the playout engine.

use thiserror::Error;

/// Main error type for playout operations.
#[derive(Error, Debug)]
pub enum PlayoutError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GPU error: {0}")]
    Gpu(String),

    /// A device resource could not be created. The object was never handed out.
    #[error("Resource initialization failed: {0}")]
    ResourceInit(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An output consumer failed; the distribution device drops it.
    #[error("Consumer error: {0}")]
    Consumer(String),

    #[error("Frame source closed")]
    SourceClosed,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlayoutError {
    /// Wrap a GPU failure from construction as a resource-initialization fault.
    pub fn into_resource_init(self) -> Self {
        match self {
            Self::ResourceInit(_) => self,
            other => Self::ResourceInit(other.to_string()),
        }
    }
}

/// Result type alias for playout operations.
pub type Result<T> = std::result::Result<T, PlayoutError>;
