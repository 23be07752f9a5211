use crate::config::ConfigurationError;
use crate::constants::STOPPED_REASON;

/// Errors raised by the queue engine and its collaborators
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Queue service error: {reason}")]
    QueueService { reason: String },
    #[error("Event transport error: {0}")]
    Transport(String),
    #[error("Device error: {0}")]
    Device(String),
    #[error("Scanning error: {0}")]
    Scanning(String),
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),
    #[error("Invalid bean: {0}")]
    InvalidBean(String),
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    pub fn queue_service(reason: impl Into<String>) -> Self {
        Self::QueueService {
            reason: reason.into(),
        }
    }

    /// Error returned by a queue service that has already shut down
    pub fn stopped() -> Self {
        Self::queue_service(STOPPED_REASON)
    }

    /// True when a queue service reported that it has stopped. Tidy-up treats
    /// this as a benign race rather than a failure.
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::QueueService { reason } if reason == STOPPED_REASON)
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
