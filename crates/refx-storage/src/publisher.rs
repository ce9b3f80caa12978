//! Artifact publication seam.

use std::path::Path;

use async_trait::async_trait;

use crate::client::{R2Client, R2Config};
use crate::error::{StorageError, StorageResult};

/// Makes a rendered artifact durable and externally reachable.
///
/// Publication happens strictly before a job is marked completed, so a
/// completed row always points at an artifact that exists.
#[async_trait]
pub trait ArtifactPublisher: Send + Sync {
    /// Upload the local file under `key` and return its public URL.
    async fn publish(&self, local_path: &Path, key: &str) -> StorageResult<String>;
}

/// Production publisher backed by R2.
#[derive(Clone)]
pub struct R2Publisher {
    client: R2Client,
    public_base_url: String,
}

impl R2Publisher {
    pub fn new(config: &R2Config) -> Self {
        Self {
            client: R2Client::new(config),
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self::new(&R2Config::from_env()?))
    }

    /// Verify the bucket is reachable.
    pub async fn check_connectivity(&self) -> StorageResult<()> {
        self.client.check_connectivity().await
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }
}

#[async_trait]
impl ArtifactPublisher for R2Publisher {
    async fn publish(&self, local_path: &Path, key: &str) -> StorageResult<String> {
        if key.is_empty() || key.starts_with('/') || key.contains("..") {
            return Err(StorageError::InvalidKey(key.to_string()));
        }

        self.client.upload_file(local_path, key, "video/mp4").await?;
        Ok(self.public_url(key))
    }
}
