//! Progress messages pushed to an optional observer.
//!
//! The observer is a push-only sink. Its absence, or a receiver that has gone
//! away, never affects the outcome of a job.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Observer message envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressMessage {
    /// Free-text status line
    Log {
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Percent complete (0-100)
    Progress { value: u8 },

    /// Failure notice
    Error {
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Encode finished
    Done { output_file: String },
}

impl ProgressMessage {
    pub fn log(message: impl Into<String>) -> Self {
        Self::Log {
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn progress(value: u8) -> Self {
        Self::Progress {
            value: value.min(100),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn done(output_file: impl Into<String>) -> Self {
        Self::Done {
            output_file: output_file.into(),
        }
    }
}

/// A message tagged with the job it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProgressEvent {
    pub job_id: i64,
    pub message: ProgressMessage,
}

/// Sending half of an observer channel.
#[derive(Debug, Clone)]
pub struct ProgressObserver {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ProgressObserver {
    /// Create an observer and the receiver that reads its events.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn new(tx: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        Self { tx }
    }

    /// Push a message. Returns false if nobody is listening anymore.
    pub fn send(&self, job_id: i64, message: ProgressMessage) -> bool {
        self.tx.send(ProgressEvent { job_id, message }).is_ok()
    }

    pub fn log(&self, job_id: i64, message: impl Into<String>) -> bool {
        self.send(job_id, ProgressMessage::log(message))
    }

    pub fn progress(&self, job_id: i64, value: u8) -> bool {
        self.send(job_id, ProgressMessage::progress(value))
    }

    pub fn error(&self, job_id: i64, message: impl Into<String>) -> bool {
        self.send(job_id, ProgressMessage::error(message))
    }

    pub fn done(&self, job_id: i64, output_file: impl Into<String>) -> bool {
        self.send(job_id, ProgressMessage::done(output_file))
    }
}
