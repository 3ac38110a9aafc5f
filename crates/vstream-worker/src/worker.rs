//! Worker tasks and the per-job encode state machine.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, info, warn, Instrument};
use vstream_media::{ensure_dir, EncodingStrategy, MediaError};
use vstream_models::{EncodeType, ProcessingResult, VideoJob};

use crate::logging::JobLogger;
use crate::metrics;
use crate::naming::resolve_base_name;

/// Intake receiver shared by all workers of a dispatcher.
pub(crate) type SharedQueue = Arc<Mutex<mpsc::Receiver<VideoJob>>>;

/// Why a strategy call did not run to completion.
enum Interrupted {
    Cancelled,
    TimedOut(Duration),
}

/// Run one job through the encode state machine and return its outcome.
///
/// Never fails: every error becomes a failed [`ProcessingResult`]. The result
/// is returned, not sent; the worker loop owns delivery.
pub async fn encode(strategy: &dyn EncodingStrategy, job: &VideoJob) -> ProcessingResult {
    encode_until(strategy, job, None, std::future::pending(), 0).await
}

/// [`encode`] with a per-job timeout and a cancellation future raced against
/// the strategy call.
pub(crate) async fn encode_until<C>(
    strategy: &dyn EncodingStrategy,
    job: &VideoJob,
    job_timeout: Option<Duration>,
    cancel: C,
    worker_id: usize,
) -> ProcessingResult
where
    C: Future<Output = ()>,
{
    let logger = JobLogger::new(job.id, worker_id, &job.encode_type);
    job.notify_log(format!("Processing started for {}", job.id));
    logger.log_start(&format!("{} -> {}", job.input_path().display(), job.output_dir().display()));

    let base_name = resolve_base_name(job);

    if let Err(e) = ensure_dir(job.output_dir()).await {
        let message = e.to_string();
        logger.log_error(&format!("cannot create output directory: {}", message));
        metrics::record_job_failed(&job.encode_type, "output_dir");
        job.notify_log(format!("Processing failed for id {}: {}", job.id, message));
        return ProcessingResult::failure(job.id, message);
    }

    let encode_type = match job.encode_type() {
        Ok(t) => t,
        Err(e) => {
            logger.log_warning(&format!("rejecting encode type {:?}", job.encode_type));
            metrics::record_job_failed("invalid", "encode_type");
            job.notify_log(format!("error processing for {}: {}", job.id, e));
            return ProcessingResult::failure(job.id, e.to_string());
        }
    };

    metrics::record_job_started(encode_type.as_str());
    let started = Instant::now();

    let call = async {
        match encode_type {
            EncodeType::Mp4 => strategy.encode_mp4(job, &base_name).await,
            EncodeType::Hls => strategy.encode_hls(job, &base_name).await,
            EncodeType::HlsEncrypted => strategy.encode_hls_encrypted(job, &base_name).await,
        }
    };
    let limited = async {
        match job_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| Interrupted::TimedOut(limit)),
            None => Ok(call.await),
        }
    };
    let outcome = tokio::select! {
        outcome = limited => outcome,
        _ = cancel => Err(Interrupted::Cancelled),
    };

    metrics::record_encode_duration(encode_type.as_str(), started.elapsed().as_secs_f64());

    let failure = match outcome {
        Ok(Ok(())) => {
            let output_file = encode_type.output_file_name(&base_name);
            let message = format!("Processing complete for id {}", job.id);
            logger.log_completion(&format!("{} in {:.1}s", output_file, started.elapsed().as_secs_f64()));
            metrics::record_job_completed(encode_type.as_str());
            job.notify_log(message.clone());
            return ProcessingResult::success(job.id, output_file, message);
        }
        Ok(Err(e)) => (e.to_string(), failure_reason(&e)),
        Err(Interrupted::Cancelled) => ("encoding cancelled".to_string(), "cancelled"),
        Err(Interrupted::TimedOut(limit)) => {
            (format!("encoding timed out after {}s", limit.as_secs()), "timeout")
        }
    };

    let (message, reason) = failure;
    logger.log_error(&message);
    metrics::record_job_failed(encode_type.as_str(), reason);
    job.notify_log(format!("Processing failed for id {}: {}", job.id, message));
    ProcessingResult::failure(job.id, message)
}

fn failure_reason(err: &MediaError) -> &'static str {
    match err {
        MediaError::FfmpegNotFound(_) | MediaError::FfprobeNotFound(_) => "missing_binary",
        MediaError::InvalidOptions(_) => "invalid_options",
        MediaError::FileNotFound(_) => "missing_input",
        MediaError::Timeout(_) => "timeout",
        MediaError::Cancelled => "cancelled",
        _ => "encoder",
    }
}

/// Resolve once the flag is raised. A dropped sender never raises it.
async fn raised(flag: &mut watch::Receiver<bool>) {
    if flag.wait_for(|raised| *raised).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// One pool slot: Idle, then waiting on the shared queue, then Busy with one
/// job, then back.
pub(crate) struct Worker {
    pub(crate) id: usize,
    pub(crate) strategy: Arc<dyn EncodingStrategy>,
    pub(crate) queue: SharedQueue,
    pub(crate) job_timeout: Option<Duration>,
    pub(crate) busy: Arc<AtomicUsize>,
    /// Raised when the dispatcher stops accepting jobs
    pub(crate) closing: watch::Receiver<bool>,
    /// Raised to cancel in-flight encodes and stop
    pub(crate) stop: watch::Receiver<bool>,
}

impl Worker {
    pub(crate) async fn run(mut self) {
        debug!(worker_id = self.id, "Worker started");

        while let Some(job) = self.next_job().await {
            let busy = self.busy.fetch_add(1, Ordering::SeqCst) + 1;
            metrics::set_workers_busy(busy);

            let span = JobLogger::new(job.id, self.id, &job.encode_type).create_span();
            let mut stop = self.stop.clone();
            let result = encode_until(
                self.strategy.as_ref(),
                &job,
                self.job_timeout,
                async move { raised(&mut stop).await },
                self.id,
            )
            .instrument(span)
            .await;

            self.deliver(&job, result).await;

            let busy = self.busy.fetch_sub(1, Ordering::SeqCst) - 1;
            metrics::set_workers_busy(busy);
        }

        if *self.stop.borrow() {
            self.cancel_queued().await;
        }

        info!(worker_id = self.id, "Worker stopped");
    }

    /// Fail every job still queued when the stop signal fires, so each one
    /// still gets its single result.
    async fn cancel_queued(&self) {
        let mut rx = self.queue.lock().await;
        rx.close();
        while let Ok(job) = rx.try_recv() {
            warn!(job_id = job.id, worker_id = self.id, "Cancelling queued job");
            metrics::record_job_failed(&job.encode_type, "cancelled");
            job.notify_log(format!("Processing failed for id {}: encoding cancelled", job.id));
            self.deliver(&job, ProcessingResult::failure(job.id, "encoding cancelled"))
                .await;
        }
    }

    /// Send the job's result. Once the stop signal is raised, a result that
    /// does not fit in the receiver's channel is dropped.
    async fn deliver(&self, job: &VideoJob, result: ProcessingResult) {
        let successful = result.successful;
        let mut stop = self.stop.clone();
        tokio::select! {
            biased;
            // Unconstrained, so a channel with room always wins the race
            delivered = tokio::task::unconstrained(job.send_result(result)) => {
                if delivered {
                    debug!(job_id = job.id, worker_id = self.id, successful, "Result delivered");
                } else {
                    warn!(job_id = job.id, worker_id = self.id, "Result receiver dropped");
                }
            }
            _ = raised(&mut stop) => {
                warn!(job_id = job.id, worker_id = self.id, "Result channel full at stop, result dropped");
            }
        }
    }

    /// Wait for the next job. `None` once the queue is closed and drained, or
    /// when the stop signal is raised.
    async fn next_job(&mut self) -> Option<VideoJob> {
        if *self.stop.borrow() {
            return None;
        }

        let mut rx = tokio::select! {
            biased;
            _ = raised(&mut self.stop) => return None,
            rx = self.queue.lock() => rx,
        };

        let mut close_requested = false;
        loop {
            tokio::select! {
                biased;
                _ = raised(&mut self.stop) => return None,
                _ = raised(&mut self.closing), if !close_requested => {
                    // Refuse new jobs; what is already queued is still handed out
                    rx.close();
                    close_requested = true;
                }
                job = rx.recv() => return job,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use vstream_media::{MediaResult, NullEncoder};
    use vstream_models::{EncodeOptions, ProgressMessage, ProgressObserver};

    /// Counts calls; optionally fails or sleeps.
    #[derive(Default)]
    struct FakeEncoder {
        calls: AtomicUsize,
        fail_with: Option<String>,
        delay: Option<Duration>,
    }

    impl FakeEncoder {
        fn failing(msg: &str) -> Self {
            Self {
                fail_with: Some(msg.to_string()),
                ..Self::default()
            }
        }

        fn slow(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::default()
            }
        }

        async fn call(&self) -> MediaResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match &self.fail_with {
                Some(msg) => Err(MediaError::other(msg.clone())),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl EncodingStrategy for FakeEncoder {
        async fn encode_mp4(&self, _job: &VideoJob, _base_name: &str) -> MediaResult<()> {
            self.call().await
        }

        async fn encode_hls(&self, _job: &VideoJob, _base_name: &str) -> MediaResult<()> {
            self.call().await
        }

        async fn encode_hls_encrypted(&self, _job: &VideoJob, _base_name: &str) -> MediaResult<()> {
            self.call().await
        }

        fn name(&self) -> &'static str {
            "fake"
        }
    }

    fn job(encode_type: &str, output_dir: &std::path::Path) -> VideoJob {
        let (tx, _rx) = mpsc::channel(1);
        VideoJob::builder(1, "./testdata/i.mp4", output_dir, tx)
            .encode_type(encode_type)
            .build()
    }

    #[tokio::test]
    async fn test_success_names_output_after_input() {
        let tmp = tempfile::tempdir().unwrap();

        let result = encode(&NullEncoder, &job("mp4", tmp.path())).await;
        assert!(result.successful);
        assert_eq!(result.output_file, "i.mp4");
        assert_eq!(result.message, "Processing complete for id 1");

        let result = encode(&NullEncoder, &job("hls-encrypted", tmp.path())).await;
        assert_eq!(result.output_file, "i.m3u8");
    }

    #[tokio::test]
    async fn test_invalid_type_skips_strategy() {
        let tmp = tempfile::tempdir().unwrap();
        let strategy = FakeEncoder::default();

        for encode_type in ["unsupported", "MP4", "webm"] {
            let result = encode(&strategy, &job(encode_type, tmp.path())).await;
            assert!(!result.successful);
            assert_eq!(result.message, "invalid encoding type");
            assert!(result.output_file.is_empty());
        }
        assert_eq!(strategy.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_strategy_error_text_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let strategy = FakeEncoder::failing("encoder exploded");

        for encode_type in ["mp4", "hls", "hls-encrypted"] {
            let result = encode(&strategy, &job(encode_type, tmp.path())).await;
            assert!(!result.successful);
            assert!(result.message.contains("encoder exploded"), "{}", result.message);
            assert!(result.output_file.is_empty());
        }
        assert_eq!(strategy.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_output_dir_failure_skips_strategy() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let strategy = FakeEncoder::default();

        // A directory cannot be created beneath a regular file
        let result = encode(&strategy, &job("mp4", &file.path().join("out"))).await;
        assert!(!result.successful);
        assert!(!result.message.is_empty());
        assert_eq!(strategy.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_output_dir_is_created() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a").join("b");

        let result = encode(&NullEncoder, &job("hls", &nested)).await;
        assert!(result.successful);
        assert!(nested.is_dir());
    }

    #[tokio::test]
    async fn test_job_timeout_yields_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let strategy = FakeEncoder::slow(Duration::from_secs(30));

        let result = encode_until(
            &strategy,
            &job("mp4", tmp.path()),
            Some(Duration::from_millis(20)),
            std::future::pending(),
            0,
        )
        .await;

        assert!(!result.successful);
        assert!(result.message.starts_with("encoding timed out after"), "{}", result.message);
        assert_eq!(strategy.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_yields_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let strategy = FakeEncoder::slow(Duration::from_secs(30));

        let result = encode_until(&strategy, &job("hls", tmp.path()), None, async {}, 0).await;

        assert!(!result.successful);
        assert_eq!(result.message, "encoding cancelled");
        assert!(result.output_file.is_empty());
    }

    #[tokio::test]
    async fn test_observer_sees_lifecycle() {
        let tmp = tempfile::tempdir().unwrap();
        let (tx, _rx) = mpsc::channel(1);
        let (observer, mut events) = ProgressObserver::channel();
        let job = VideoJob::builder(5, "./testdata/i.mp4", tmp.path(), tx)
            .encode_type("hls")
            .options(EncodeOptions::new().with_rename_output(true))
            .observer(observer)
            .build();

        let result = encode(&NullEncoder, &job).await;
        assert!(result.successful);
        drop(job);

        let mut logs = Vec::new();
        while let Some(event) = events.recv().await {
            assert_eq!(event.job_id, 5);
            if let ProgressMessage::Log { message, .. } = event.message {
                logs.push(message);
            }
        }
        assert_eq!(logs, vec!["Processing started for 5", "Processing complete for id 5"]);
    }
}
