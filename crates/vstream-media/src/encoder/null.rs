use async_trait::async_trait;
use vstream_models::VideoJob;

use super::EncodingStrategy;
use crate::error::MediaResult;

/// Strategy whose every operation succeeds without touching the filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEncoder;

impl NullEncoder {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EncodingStrategy for NullEncoder {
    async fn encode_mp4(&self, _job: &VideoJob, _base_name: &str) -> MediaResult<()> {
        Ok(())
    }

    async fn encode_hls(&self, _job: &VideoJob, _base_name: &str) -> MediaResult<()> {
        Ok(())
    }

    async fn encode_hls_encrypted(&self, _job: &VideoJob, _base_name: &str) -> MediaResult<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "null"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_null_encoder_always_succeeds() {
        let (tx, _rx) = mpsc::channel(1);
        let job = VideoJob::builder(1, "./missing.mp4", "./output", tx).build();
        let encoder = NullEncoder::new();

        assert!(encoder.encode_mp4(&job, "missing").await.is_ok());
        assert!(encoder.encode_hls(&job, "missing").await.is_ok());
        assert!(encoder.encode_hls_encrypted(&job, "missing").await.is_ok());
    }
}
