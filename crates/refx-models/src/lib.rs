//! Shared data models for the Refx render pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Render jobs and their status lifecycle
//! - Requested effects
//! - State-transition validation (single source of truth for the
//!   legal status graph)

pub mod effect;
pub mod job;

pub use effect::{canonical_order, Effect, UnknownEffect};
pub use job::{JobId, JobStatus, RenderJob, TransitionError};
