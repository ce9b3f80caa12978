//! Durable render job store access.
//!
//! The store owns each job's row: identity, ownership, status, progress,
//! output location. The pipeline reads and writes rows by job id only;
//! transition legality is enforced through `refx_models::RenderJob`, so a
//! terminal row can never be overwritten through this crate.
//!
//! Two implementations:
//! - `RedisJobStore` — production, one JSON document per job plus a
//!   per-owner index
//! - `MemoryJobStore` — in-process map for tests and local development

pub mod error;
pub mod memory;
pub mod redis_store;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryJobStore;
pub use redis_store::{RedisJobStore, StoreConfig};
pub use store::JobStore;
