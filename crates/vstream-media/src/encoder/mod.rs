//! Encoding strategies.
//!
//! A strategy offers one operation per supported output format. The pool
//! holds a single strategy behind an `Arc` and calls it from every worker, so
//! implementations must be safe for concurrent use; each call works on its
//! own input and output paths.

mod ffmpeg;
mod null;

use async_trait::async_trait;
use vstream_models::VideoJob;

use crate::error::MediaResult;

pub use ffmpeg::{EncoderConfig, FfmpegEncoder};
pub use null::NullEncoder;

/// Capability set for producing artifacts from a job.
///
/// Each operation resolves only once the outcome is fully known. Expected
/// failures (missing input, bad options, encoder errors) are returned as
/// errors, never panics.
#[async_trait]
pub trait EncodingStrategy: Send + Sync {
    /// Write `<output_dir>/<base_name>.mp4`.
    async fn encode_mp4(&self, job: &VideoJob, base_name: &str) -> MediaResult<()>;

    /// Write the master playlist `<output_dir>/<base_name>.m3u8` and one
    /// `<base_name>-<rendition>.m3u8` playlist per rendition.
    async fn encode_hls(&self, job: &VideoJob, base_name: &str) -> MediaResult<()>;

    /// Same layout as [`encode_hls`](Self::encode_hls), with encrypted segments.
    async fn encode_hls_encrypted(&self, job: &VideoJob, base_name: &str) -> MediaResult<()>;

    /// Name used in logs.
    fn name(&self) -> &'static str;
}
