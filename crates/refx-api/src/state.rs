//! Shared application state.

use std::sync::Arc;

use refx_queue::{RedisQueue, RenderQueue};
use refx_store::{JobStore, RedisJobStore};

use crate::config::ApiConfig;
use crate::error::ApiResult;

/// State shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub store: Arc<dyn JobStore>,
    pub queue: Arc<dyn RenderQueue>,
}

impl AppState {
    /// Create state with production backends, verifying connectivity.
    pub async fn new(config: ApiConfig) -> ApiResult<Self> {
        let queue = RedisQueue::from_env()?;
        queue.connect().await?;

        let store = RedisJobStore::from_env()?;
        store.connect().await?;

        Ok(Self {
            config,
            store: Arc::new(store),
            queue: Arc::new(queue),
        })
    }
}
