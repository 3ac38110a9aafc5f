//! Encoding strategies and FFmpeg CLI wrapper.
//!
//! This crate provides:
//! - The `EncodingStrategy` capability trait, one operation per encode type
//! - `FfmpegEncoder`, the production strategy that shells out to FFmpeg
//! - `NullEncoder`, a strategy whose every operation succeeds
//! - Type-safe FFmpeg command building and a runner that captures output
//! - Progress parsing from `-progress pipe:2`

pub mod command;
pub mod encoder;
pub mod error;
pub mod fs_utils;
pub mod probe;
pub mod progress;

pub use command::{check_ffmpeg, FfmpegCommand, FfmpegRunner};
pub use encoder::{EncoderConfig, EncodingStrategy, FfmpegEncoder, NullEncoder};
pub use error::{MediaError, MediaResult};
pub use fs_utils::ensure_dir;
pub use probe::probe_duration;
pub use progress::FfmpegProgress;
