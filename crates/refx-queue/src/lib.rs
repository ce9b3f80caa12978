//! Redis-backed FIFO job queue.
//!
//! This crate provides:
//! - The `JobDescriptor` wire format carried between admission and workers
//! - A `RenderQueue` trait so the handle can be injected and faked
//! - `RedisQueue`, the production implementation (list push/pop)
//!
//! Delivery is at-least-once and exclusive per message: whichever consumer
//! pops a descriptor owns it. Durability of retry is the worker's job (it
//! re-enqueues explicitly), not the queue's.

pub mod descriptor;
pub mod error;
pub mod queue;

pub use descriptor::JobDescriptor;
pub use error::{QueueError, QueueResult};
pub use queue::{QueueConfig, RedisQueue, RenderQueue};
