use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use vstream_models::{EncodeType, Rendition, VideoJob};

use super::EncodingStrategy;
use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::probe_duration;

/// Default H.264 encoder
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default CRF for HLS renditions
pub const DEFAULT_HLS_CRF: u8 = 22;
/// Default preset for HLS renditions
pub const DEFAULT_HLS_PRESET: &str = "slow";
/// Percent step between two observer updates
const PROGRESS_STEP: u8 = 2;

/// Configuration for the FFmpeg-backed strategy.
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    /// FFmpeg binary name or path
    pub ffmpeg_path: String,
    /// FFprobe binary name or path, used for progress percentages
    pub ffprobe_path: String,
    /// Video codec for every output
    pub video_codec: String,
    /// CRF for HLS renditions
    pub hls_crf: u8,
    /// Preset for HLS renditions
    pub hls_preset: String,
    /// Kill FFmpeg after this many seconds
    pub timeout_secs: Option<u64>,
    /// Probe input duration and push percent updates to the job observer
    pub report_progress: bool,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            video_codec: DEFAULT_VIDEO_CODEC.to_string(),
            hls_crf: DEFAULT_HLS_CRF,
            hls_preset: DEFAULT_HLS_PRESET.to_string(),
            timeout_secs: None,
            report_progress: true,
        }
    }
}

impl EncoderConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ffmpeg_path: std::env::var("VSTREAM_FFMPEG_PATH").unwrap_or(defaults.ffmpeg_path),
            ffprobe_path: std::env::var("VSTREAM_FFPROBE_PATH").unwrap_or(defaults.ffprobe_path),
            video_codec: std::env::var("VSTREAM_VIDEO_CODEC").unwrap_or(defaults.video_codec),
            hls_crf: std::env::var("VSTREAM_HLS_CRF")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.hls_crf),
            hls_preset: std::env::var("VSTREAM_HLS_PRESET").unwrap_or(defaults.hls_preset),
            timeout_secs: std::env::var("VSTREAM_FFMPEG_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok()),
            report_progress: std::env::var("VSTREAM_REPORT_PROGRESS")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(defaults.report_progress),
        }
    }
}

/// Production strategy: shells out to FFmpeg.
#[derive(Debug, Clone, Default)]
pub struct FfmpegEncoder {
    config: EncoderConfig,
}

impl FfmpegEncoder {
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    fn runner(&self) -> FfmpegRunner {
        let runner = FfmpegRunner::new().with_binary(self.config.ffmpeg_path.clone());
        match self.config.timeout_secs {
            Some(secs) => runner.with_timeout(secs),
            None => runner,
        }
    }

    /// Build the single-file MP4 invocation.
    pub fn mp4_command(&self, job: &VideoJob, base_name: &str) -> FfmpegCommand {
        let output = job.output_dir().join(EncodeType::Mp4.output_file_name(base_name));
        FfmpegCommand::new(job.input_path(), output).video_codec(self.config.video_codec.clone())
    }

    /// Build the three-rendition HLS invocation, optionally with segment encryption.
    pub fn hls_command(&self, job: &VideoJob, base_name: &str, key_info: Option<&Path>) -> FfmpegCommand {
        let output = job.output_dir().join(format!("{}-%v.m3u8", base_name));
        let mut cmd = FfmpegCommand::new(job.input_path(), output);

        // One video and one audio mapping per rendition
        for _ in Rendition::ALL {
            cmd = cmd.option("-map", "0:v:0").option("-map", "0:a:0");
        }

        cmd = cmd
            .video_codec(self.config.video_codec.clone())
            .crf(self.config.hls_crf)
            .audio_codec("aac")
            .option("-ar", "48000");

        let mut stream_map = Vec::with_capacity(Rendition::ALL.len());
        for (idx, rendition) in Rendition::ALL.iter().enumerate() {
            cmd = cmd
                .option(format!("-filter:v:{}", idx), format!("scale=-2:{}", rendition.height()))
                .option(format!("-maxrate:v:{}", idx), job.options.max_rate(*rendition))
                .option(format!("-b:a:{}", idx), rendition.audio_bitrate());
            stream_map.push(format!("v:{idx},a:{idx},name:{}", rendition.name()));
        }

        cmd = cmd
            .option("-var_stream_map", stream_map.join(" "))
            .preset(self.config.hls_preset.clone())
            .option("-hls_list_size", "0")
            .option("-threads", "0")
            .option("-f", "hls")
            .option("-hls_time", job.options.segment_duration.to_string())
            .option("-hls_flags", "independent_segments")
            .option("-hls_segment_type", "mpegts");

        if let Some(key_info) = key_info {
            cmd = cmd.option("-hls_key_info_file", key_info.to_string_lossy());
        }

        cmd.option("-hls_playlist_type", "vod")
            .option("-master_pl_name", EncodeType::Hls.output_file_name(base_name))
            // Baseline profile plays on the widest range of devices
            .option("-profile:v", "baseline")
            .option("-level", "3.0")
    }

    async fn run(&self, job: &VideoJob, encode_type: EncodeType, cmd: FfmpegCommand) -> MediaResult<()> {
        if !tokio::fs::try_exists(job.input_path()).await.unwrap_or(false) {
            return Err(MediaError::FileNotFound(job.input_path().to_path_buf()));
        }

        let started = Instant::now();
        let runner = self.runner();

        let duration_ms = if self.config.report_progress && job.observer().is_some() {
            match probe_duration(&self.config.ffprobe_path, job.input_path()).await {
                Ok(ms) => Some(ms),
                Err(e) => {
                    debug!(job_id = job.id, "Duration probe failed, progress disabled: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let result = match duration_ms {
            Some(total_ms) => {
                let observer_job = job.clone();
                let last_reported = AtomicU8::new(0);
                runner
                    .run_with_progress(&cmd, move |progress| {
                        let last = last_reported.load(Ordering::Relaxed);
                        if let Some(pct) = next_progress_step(last, progress.percent(total_ms)) {
                            last_reported.store(pct, Ordering::Relaxed);
                            observer_job.notify_progress(pct);
                        }
                    })
                    .await
            }
            None => runner.run(&cmd).await,
        };

        match &result {
            Ok(()) => info!(
                job_id = job.id,
                encode_type = %encode_type,
                "FFmpeg finished in {:.1}s",
                started.elapsed().as_secs_f64()
            ),
            Err(e) => warn!(job_id = job.id, encode_type = %encode_type, "FFmpeg failed: {}", e),
        }

        result
    }
}

/// Percent to report next, given the last reported one. Reports once progress
/// has moved a full step, and always reports completion.
fn next_progress_step(last: u8, pct: u8) -> Option<u8> {
    (pct >= last.saturating_add(PROGRESS_STEP) || (pct == 100 && last < 100)).then_some(pct)
}

#[async_trait]
impl EncodingStrategy for FfmpegEncoder {
    async fn encode_mp4(&self, job: &VideoJob, base_name: &str) -> MediaResult<()> {
        let cmd = self.mp4_command(job, base_name);
        self.run(job, EncodeType::Mp4, cmd).await
    }

    async fn encode_hls(&self, job: &VideoJob, base_name: &str) -> MediaResult<()> {
        let cmd = self.hls_command(job, base_name, None);
        self.run(job, EncodeType::Hls, cmd).await
    }

    async fn encode_hls_encrypted(&self, job: &VideoJob, base_name: &str) -> MediaResult<()> {
        let key_info = job
            .options
            .key_info
            .as_deref()
            .ok_or_else(|| MediaError::invalid_options("hls-encrypted requires a key info file"))?;

        let cmd = self.hls_command(job, base_name, Some(key_info));
        self.run(job, EncodeType::HlsEncrypted, cmd).await
    }

    fn name(&self) -> &'static str {
        "ffmpeg"
    }
}
