//! The encoder seam the worker drives.
//!
//! `FfmpegEncoder` is the production implementation; tests substitute their
//! own `Encoder` to script outcomes without spawning processes.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use refx_models::Effect;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::effects::effect_graph;
use crate::error::{MediaError, MediaResult};
use crate::probe::probe_duration;

/// Progress sink for an encode attempt. Values are 0-99; reaching 100 is
/// the pipeline's call, made only after the artifact is published.
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// Encoder configuration.
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    /// FFmpeg binary name or path
    pub ffmpeg_path: String,
    /// FFprobe binary name or path
    pub ffprobe_path: String,
    /// Watermark overlay image
    pub watermark_path: PathBuf,
    /// Hard per-encode timeout in seconds
    pub timeout_secs: Option<u64>,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            watermark_path: PathBuf::from("watermark.png"),
            timeout_secs: Some(3600),
        }
    }
}

impl EncoderConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ffmpeg_path: std::env::var("FFMPEG_PATH").unwrap_or(defaults.ffmpeg_path),
            ffprobe_path: std::env::var("FFPROBE_PATH").unwrap_or(defaults.ffprobe_path),
            watermark_path: std::env::var("WATERMARK_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.watermark_path),
            timeout_secs: std::env::var("ENCODE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .or(defaults.timeout_secs),
        }
    }
}

/// One encode attempt: where to read, what to apply, where to write.
#[derive(Debug, Clone)]
pub struct EncodeRequest {
    /// Source path or URL
    pub input_url: String,
    /// Effects to apply
    pub effects: Vec<Effect>,
    /// Local output path
    pub output_path: PathBuf,
}

/// Transforms an input into a rendered artifact.
#[async_trait]
pub trait Encoder: Send + Sync {
    /// Run one encode attempt, reporting progress as it goes.
    async fn encode(&self, request: &EncodeRequest, on_progress: ProgressFn) -> MediaResult<()>;
}

/// Production encoder backed by the FFmpeg CLI.
#[derive(Debug)]
pub struct FfmpegEncoder {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    watermark: PathBuf,
    timeout_secs: Option<u64>,
}

impl FfmpegEncoder {
    /// Create an encoder, resolving both binaries up front so a bad
    /// deployment fails at startup instead of on the first job.
    pub fn new(config: EncoderConfig) -> MediaResult<Self> {
        let ffmpeg = which::which(&config.ffmpeg_path)
            .map_err(|_| MediaError::FfmpegNotFound(config.ffmpeg_path.clone()))?;
        let ffprobe = which::which(&config.ffprobe_path)
            .map_err(|_| MediaError::FfprobeNotFound(config.ffprobe_path.clone()))?;

        Ok(Self {
            ffmpeg,
            ffprobe,
            watermark: config.watermark_path,
            timeout_secs: config.timeout_secs,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> MediaResult<Self> {
        Self::new(EncoderConfig::from_env())
    }
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    async fn encode(&self, request: &EncodeRequest, on_progress: ProgressFn) -> MediaResult<()> {
        let graph = effect_graph(&request.effects, &self.watermark);

        // The overlay image is per-deployment config; a missing file fails
        // the attempt rather than producing an un-watermarked artifact.
        if graph.extra_input.is_some() && !self.watermark.exists() {
            return Err(MediaError::FileNotFound(self.watermark.clone()));
        }

        // Duration drives percentage math. Without it the encode still
        // runs, the job just shows no intermediate progress.
        let total_ms = match probe_duration(&self.ffprobe, &request.input_url).await {
            Ok(seconds) => Some((seconds * 1000.0) as i64),
            Err(err) => {
                warn!(input = %request.input_url, error = %err, "Duration probe failed, progress disabled");
                None
            }
        };

        let mut cmd = FfmpegCommand::new(&self.ffmpeg, request.input_url.clone(), &request.output_path)
            .video_codec("libx264")
            .preset("medium")
            .crf(23)
            .audio_codec("aac")
            .audio_bitrate("128k")
            .output_args(["-movflags", "+faststart"]);

        if let Some(extra) = &graph.extra_input {
            cmd = cmd.extra_input(extra);
        }
        if let Some(filter) = &graph.filter_complex {
            cmd = cmd.filter_complex(filter);
            for map in &graph.maps {
                cmd = cmd.map(map);
            }
        } else if let Some(filter) = &graph.video_filter {
            cmd = cmd.video_filter(filter);
        }

        let mut runner = FfmpegRunner::new();
        if let Some(secs) = self.timeout_secs {
            runner = runner.with_timeout(secs);
        }

        debug!(input = %request.input_url, effects = ?request.effects, "Starting encode");

        runner
            .run_with_progress(&cmd, move |progress| {
                if let Some(total_ms) = total_ms {
                    // Cap at 99 while the process is alive; 100 is reserved
                    // for the published artifact.
                    let pct = progress.percentage(total_ms).floor().clamp(0.0, 99.0) as u8;
                    on_progress(pct);
                }
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path_of(var: &str) -> Option<std::path::PathBuf> {
        which::which(var).ok()
    }

    #[test]
    fn test_missing_binary_is_a_startup_error() {
        let config = EncoderConfig {
            ffmpeg_path: "definitely-not-ffmpeg-9000".to_string(),
            ..Default::default()
        };
        let err = FfmpegEncoder::new(config).unwrap_err();
        assert!(matches!(err, MediaError::FfmpegNotFound(_)));
    }

    #[tokio::test]
    async fn test_missing_watermark_fails_the_attempt() {
        // Only runs where the binaries exist.
        let (Some(_), Some(_)) = (path_of("ffmpeg"), path_of("ffprobe")) else {
            return;
        };

        let encoder = FfmpegEncoder::new(EncoderConfig {
            watermark_path: PathBuf::from("/nonexistent/watermark.png"),
            ..Default::default()
        })
        .unwrap();

        let request = EncodeRequest {
            input_url: "input.mp4".to_string(),
            effects: vec![Effect::Watermark],
            output_path: PathBuf::from("out.mp4"),
        };
        let err = encoder
            .encode(&request, Arc::new(|_| {}))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
