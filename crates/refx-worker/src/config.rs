//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{WorkerError, WorkerResult};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum retries before a job is failed
    pub max_retries: u32,
    /// Work directory for temporary files
    pub work_dir: PathBuf,
    /// How long a dequeue blocks waiting for work
    pub dequeue_block: Duration,
    /// Backoff after a queue or store error
    pub error_backoff: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            work_dir: PathBuf::from("/tmp/refx"),
            dequeue_block: Duration::from_secs(5),
            error_backoff: Duration::from_secs(5),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    ///
    /// Unset variables fall back to defaults; set-but-malformed values are
    /// fatal so a typo'd deployment does not run with surprise settings.
    pub fn from_env() -> WorkerResult<Self> {
        let defaults = Self::default();
        Ok(Self {
            max_retries: parse_var("MAX_RETRIES", defaults.max_retries)?,
            work_dir: std::env::var("WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            dequeue_block: Duration::from_secs(parse_var(
                "WORKER_DEQUEUE_BLOCK_SECS",
                defaults.dequeue_block.as_secs(),
            )?),
            error_backoff: Duration::from_secs(parse_var(
                "WORKER_ERROR_BACKOFF_SECS",
                defaults.error_backoff.as_secs(),
            )?),
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> WorkerResult<T> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| WorkerError::config_error(format!("{name} is not a valid value: {raw}"))),
        Err(_) => Ok(default),
    }
}
