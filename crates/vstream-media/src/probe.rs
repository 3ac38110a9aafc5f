//! FFprobe duration lookup, used to turn FFmpeg progress into percentages.

use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
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

/// Get the duration of a media file in milliseconds.
pub async fn probe_duration(ffprobe: &str, path: impl AsRef<Path>) -> MediaResult<i64> {
    let path = path.as_ref();

    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    which::which(ffprobe).map_err(|_| MediaError::FfprobeNotFound(ffprobe.to_string()))?;

    let output = Command::new(ffprobe)
        .args(["-v", "quiet", "-print_format", "json", "-show_format"])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: "FFprobe failed".to_string(),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    parse_duration_ms(&output.stdout)
}

fn parse_duration_ms(json: &[u8]) -> MediaResult<i64> {
    let probe: FfprobeOutput = serde_json::from_slice(json)?;

    probe
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .map(|secs| (secs * 1000.0) as i64)
        .ok_or_else(|| MediaError::FfprobeFailed {
            message: "No duration in FFprobe output".to_string(),
            stderr: None,
        })
}
