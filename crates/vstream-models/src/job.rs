//! Video job definitions.

use std::path::{Path, PathBuf};

use tokio::sync::mpsc;

use crate::encoding::{EncodeOptions, EncodeType, DEFAULT_ENCODE_TYPE};
use crate::error::ModelResult;
use crate::progress::ProgressObserver;
use crate::result::ProcessingResult;

/// Channel the submitter reads results from.
pub type ResultSender = mpsc::Sender<ProcessingResult>;

/// One unit of transcoding work.
///
/// The job is owned by the pool while it is processed. The submitter keeps the
/// receiving half of `result_tx`; the pool only drops its own sender clone once
/// the single result has been written.
#[derive(Debug, Clone)]
pub struct VideoJob {
    /// Caller-supplied ID. Uniqueness is the caller's concern.
    pub id: i64,
    /// Path to the source file
    pub input_path: PathBuf,
    /// Directory the artifacts are written to, created if missing
    pub output_dir: PathBuf,
    /// Requested encode type as given by the caller
    pub encode_type: String,
    /// Format-specific options, defaults already applied
    pub options: EncodeOptions,
    result_tx: ResultSender,
    observer: Option<ProgressObserver>,
}

impl VideoJob {
    /// Start building a job.
    pub fn builder(
        id: i64,
        input_path: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        result_tx: ResultSender,
    ) -> VideoJobBuilder {
        VideoJobBuilder {
            id,
            input_path: input_path.into(),
            output_dir: output_dir.into(),
            encode_type: String::new(),
            options: EncodeOptions::default(),
            result_tx,
            observer: None,
        }
    }

    /// Resolve the requested encode type against the supported set.
    pub fn encode_type(&self) -> ModelResult<EncodeType> {
        self.encode_type.parse()
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn observer(&self) -> Option<&ProgressObserver> {
        self.observer.as_ref()
    }

    /// Push a status line to the observer, if any.
    pub fn notify_log(&self, message: impl Into<String>) {
        if let Some(observer) = &self.observer {
            observer.log(self.id, message);
        }
    }

    /// Push a percent-complete update to the observer, if any.
    pub fn notify_progress(&self, value: u8) {
        if let Some(observer) = &self.observer {
            observer.progress(self.id, value);
        }
    }

    /// Deliver the job's result. Returns false if the submitter dropped the receiver.
    pub async fn send_result(&self, result: ProcessingResult) -> bool {
        if let Some(observer) = &self.observer {
            if result.successful {
                observer.done(self.id, result.output_file.clone());
            } else {
                observer.error(self.id, result.message.clone());
            }
        }
        self.result_tx.send(result).await.is_ok()
    }
}

/// Builder for [`VideoJob`]. Defaults are applied once, in [`build`](Self::build).
#[derive(Debug)]
pub struct VideoJobBuilder {
    id: i64,
    input_path: PathBuf,
    output_dir: PathBuf,
    encode_type: String,
    options: EncodeOptions,
    result_tx: ResultSender,
    observer: Option<ProgressObserver>,
}

impl VideoJobBuilder {
    /// Requested encode type. Unrecognized values are kept and fail at encode time.
    pub fn encode_type(mut self, encode_type: impl Into<String>) -> Self {
        self.encode_type = encode_type.into();
        self
    }

    pub fn options(mut self, options: EncodeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn observer(mut self, observer: ProgressObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn build(self) -> VideoJob {
        let encode_type = if self.encode_type.trim().is_empty() {
            DEFAULT_ENCODE_TYPE.to_string()
        } else {
            self.encode_type
        };

        VideoJob {
            id: self.id,
            input_path: self.input_path,
            output_dir: self.output_dir,
            encode_type,
            options: self.options.with_defaults(),
            result_tx: self.result_tx,
            observer: self.observer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use crate::progress::ProgressMessage;

    #[test]
    fn test_builder_defaults() {
        let (tx, _rx) = mpsc::channel(1);
        let job = VideoJob::builder(1, "./a/b.mp4", "./output", tx).build();

        assert_eq!(job.encode_type, "mp4");
        assert_eq!(job.encode_type().unwrap(), EncodeType::Mp4);
        assert_eq!(job.options.max_rate_1080p, "1200k");
        assert_eq!(job.options.max_rate_720p, "600k");
        assert_eq!(job.options.max_rate_480p, "400k");
        assert!(!job.options.rename_output);
    }

    #[test]
    fn test_builder_keeps_options() {
        let (tx, _rx) = mpsc::channel(1);
        let job = VideoJob::builder(1, "./a/b.mp4", "./output", tx)
            .encode_type("hls")
            .options(EncodeOptions::new().with_rename_output(true))
            .build();

        assert!(job.options.rename_output);
        assert_eq!(job.encode_type().unwrap(), EncodeType::Hls);
    }

    #[test]
    fn test_unknown_encode_type_is_kept() {
        let (tx, _rx) = mpsc::channel(1);
        let job = VideoJob::builder(4, "./a/b.mp4", "./output", tx)
            .encode_type("unsupported")
            .build();

        assert_eq!(job.encode_type, "unsupported");
        assert_eq!(
            job.encode_type().unwrap_err(),
            ModelError::InvalidEncodeType("unsupported".to_string())
        );
    }

    #[tokio::test]
    async fn test_send_result_reaches_submitter_and_observer() {
        let (tx, mut rx) = mpsc::channel(1);
        let (observer, mut events) = ProgressObserver::channel();
        let job = VideoJob::builder(9, "./a/b.mp4", "./output", tx)
            .observer(observer)
            .build();

        assert!(job.send_result(ProcessingResult::success(9, "b.mp4", "ok")).await);

        let result = rx.recv().await.unwrap();
        assert_eq!(result.output_file, "b.mp4");
        let event = events.recv().await.unwrap();
        assert_eq!(event.message, ProgressMessage::done("b.mp4"));
    }

    #[tokio::test]
    async fn test_send_result_without_receiver() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let job = VideoJob::builder(1, "./a/b.mp4", "./output", tx).build();
        assert!(!job.send_result(ProcessingResult::failure(1, "x")).await);
    }
}
