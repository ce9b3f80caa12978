//! FFprobe duration probing.

use std::path::Path;
use std::process::Stdio;

use serde::Deserialize;
use tokio::process::Command;

use crate::error::{MediaError, MediaResult};

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

/// Probe an input for its duration in seconds.
///
/// `input` may be a local path or a URL; FFprobe handles both.
pub async fn probe_duration(ffprobe: impl AsRef<Path>, input: &str) -> MediaResult<f64> {
    let output = Command::new(ffprobe.as_ref())
        .args(["-v", "quiet", "-print_format", "json", "-show_format"])
        .arg(input)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: format!("FFprobe failed for {input}"),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    parse_duration(&output.stdout)
}

fn parse_duration(stdout: &[u8]) -> MediaResult<f64> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)?;

    probe
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| *d > 0.0)
        .ok_or_else(|| MediaError::InvalidMedia("no duration in probe output".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        let json = br#"{"format": {"duration": "12.340000", "size": "1024"}}"#;
        let duration = parse_duration(json).unwrap();
        assert!((duration - 12.34).abs() < 0.001);
    }

    #[test]
    fn test_missing_duration_is_invalid_media() {
        let json = br#"{"format": {}}"#;
        let err = parse_duration(json).unwrap_err();
        assert!(matches!(err, MediaError::InvalidMedia(_)));
    }

    #[test]
    fn test_zero_duration_is_invalid_media() {
        let json = br#"{"format": {"duration": "0.000000"}}"#;
        assert!(parse_duration(json).is_err());
    }
}
