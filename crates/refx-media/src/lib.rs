//! FFmpeg CLI wrapper for render jobs.
//!
//! This crate provides:
//! - Effect-to-filter-graph translation (pure, deterministic ordering)
//! - FFmpeg command builder and runner with progress tracking
//! - FFprobe duration probing
//! - The `Encoder` seam the worker drives (`FfmpegEncoder` in production)

pub mod command;
pub mod effects;
pub mod encoder;
pub mod error;
pub mod probe;
pub mod progress;

pub use command::{FfmpegCommand, FfmpegRunner};
pub use effects::{effect_graph, EffectGraph};
pub use encoder::{EncodeRequest, Encoder, EncoderConfig, FfmpegEncoder, ProgressFn};
pub use error::{MediaError, MediaResult};
pub use probe::probe_duration;
pub use progress::EncodeProgress;
