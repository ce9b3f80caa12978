//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Queue error: {0}")]
    Queue(#[from] refx_queue::QueueError),

    #[error("Store error: {0}")]
    Store(#[from] refx_store::StoreError),

    #[error("Media error: {0}")]
    Media(#[from] refx_media::MediaError),

    #[error("Storage error: {0}")]
    Storage(#[from] refx_storage::StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Text recorded on the job row when an attempt fails.
    pub fn detail(&self) -> String {
        match self {
            WorkerError::Media(err) => err.detail(),
            other => other.to_string(),
        }
    }
}
