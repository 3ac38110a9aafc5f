//! Worker error types.

use std::time::Duration;

use thiserror::Error;
use vstream_models::VideoJob;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Job queue is closed")]
    QueueClosed,

    #[error("Timed out after {0:?} waiting for queue space")]
    SubmitTimeout(Duration),

    #[error("Job queue is full")]
    QueueFull,

    #[error("Workers did not stop within {0:?}")]
    ShutdownTimeout(Duration),

    #[error("Media error: {0}")]
    Media(#[from] vstream_media::MediaError),
}

impl WorkerError {
    /// Whether a later submission of the same job may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WorkerError::QueueFull | WorkerError::SubmitTimeout(_))
    }
}

/// A job the dispatcher refused to accept.
///
/// The job is handed back unprocessed; no result is written for it.
#[derive(Debug, Error)]
#[error("job {} not accepted: {reason}", .job.id)]
pub struct DispatchError {
    job: Box<VideoJob>,
    #[source]
    reason: WorkerError,
}

impl DispatchError {
    pub fn new(job: VideoJob, reason: WorkerError) -> Self {
        Self {
            job: Box::new(job),
            reason,
        }
    }

    pub fn reason(&self) -> &WorkerError {
        &self.reason
    }

    pub fn job(&self) -> &VideoJob {
        &self.job
    }

    /// Take the rejected job back.
    pub fn into_job(self) -> VideoJob {
        *self.job
    }
}
