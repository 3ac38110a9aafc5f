//! FFmpeg progress parsing.

use serde::{Deserialize, Serialize};

/// Progress information from FFmpeg's `-progress` output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Current frame number
    pub frame: u64,
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Encoding speed (e.g., 1.5 = 1.5x realtime)
    pub speed: f64,
    /// Whether encoding is complete
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Whole percent complete given the input duration in milliseconds.
    pub fn percent(&self, total_duration_ms: i64) -> u8 {
        if self.is_complete {
            return 100;
        }
        if total_duration_ms <= 0 || self.out_time_ms <= 0 {
            return 0;
        }
        let pct = (self.out_time_ms as f64 / total_duration_ms as f64) * 100.0;
        pct.clamp(0.0, 100.0) as u8
    }
}

/// Feed one line of `-progress` output into `current`.
///
/// Returns a snapshot at the end of each progress block (the `progress=` key),
/// and `None` for every other line. Lines that are not `key=value` pairs are
/// not progress output; the caller keeps them as diagnostics.
pub(crate) fn parse_progress_line(line: &str, current: &mut FfmpegProgress) -> Option<FfmpegProgress> {
    let (key, value) = line.trim().split_once('=')?;

    match key {
        "out_time_ms" | "out_time_us" => {
            // Despite its name, out_time_ms is reported in microseconds too
            if let Ok(us) = value.parse::<i64>() {
                current.out_time_ms = us / 1000;
            }
        }
        "frame" => {
            if let Ok(frame) = value.parse() {
                current.frame = frame;
            }
        }
        "speed" => {
            if let Some(speed) = value.strip_suffix('x').and_then(|s| s.trim().parse().ok()) {
                current.speed = speed;
            }
        }
        "progress" => {
            if value == "end" {
                current.is_complete = true;
            }
            return Some(current.clone());
        }
        _ => {}
    }

    None
}

/// True if the line is a `key=value` progress record rather than a log line.
pub(crate) fn is_progress_line(line: &str) -> bool {
    match line.trim().split_once('=') {
        Some((key, _)) => !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'),
        None => false,
    }
}
