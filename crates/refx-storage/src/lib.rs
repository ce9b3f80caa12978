//! R2 artifact storage for rendered outputs.
//!
//! Provides the S3-compatible client plus the `ArtifactPublisher` seam the
//! worker uses to turn a local encode output into a public URL.

pub mod client;
pub mod error;
pub mod publisher;

pub use client::{R2Client, R2Config};
pub use error::{StorageError, StorageResult};
pub use publisher::{ArtifactPublisher, R2Publisher};
