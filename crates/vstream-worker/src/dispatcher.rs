//! Job dispatcher.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::error::{SendTimeoutError, TrySendError};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error, info, warn};
use vstream_media::{check_ffmpeg, EncodingStrategy, FfmpegEncoder};
use vstream_models::VideoJob;

use crate::config::DispatcherConfig;
use crate::error::{DispatchError, WorkerError, WorkerResult};
use crate::worker::Worker;

/// Fixed-size pool of workers sharing one bounded intake queue.
pub struct Dispatcher {
    config: DispatcherConfig,
    strategy: Arc<dyn EncodingStrategy>,
}

impl Dispatcher {
    /// Create a dispatcher that encodes with `strategy`.
    pub fn new(config: DispatcherConfig, strategy: Arc<dyn EncodingStrategy>) -> Self {
        Self {
            config: config.normalized(),
            strategy,
        }
    }

    /// Create a dispatcher backed by FFmpeg, configured from `config.encoder`.
    ///
    /// Fails if the configured FFmpeg binary cannot be found.
    pub fn with_ffmpeg(config: DispatcherConfig) -> WorkerResult<Self> {
        let binary = check_ffmpeg(&config.encoder.ffmpeg_path)?;
        debug!("Using FFmpeg at {}", binary.display());

        let strategy = Arc::new(FfmpegEncoder::new(config.encoder.clone()));
        Ok(Self::new(config, strategy))
    }

    pub fn max_workers(&self) -> usize {
        self.config.max_workers
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Spawn the workers. Must be called from within a Tokio runtime.
    pub fn run(self) -> DispatcherHandle {
        info!(
            "Starting dispatcher with {} workers, queue capacity {}, strategy '{}'",
            self.config.max_workers,
            self.config.queue_capacity,
            self.strategy.name()
        );

        let (intake, rx) = mpsc::channel(self.config.queue_capacity);
        let queue = Arc::new(Mutex::new(rx));
        let (closing, closing_rx) = watch::channel(false);
        let (stop, stop_rx) = watch::channel(false);
        let busy = Arc::new(AtomicUsize::new(0));

        let workers: Vec<JoinHandle<()>> = (0..self.config.max_workers)
            .map(|id| {
                let worker = Worker {
                    id,
                    strategy: Arc::clone(&self.strategy),
                    queue: Arc::clone(&queue),
                    job_timeout: self.config.job_timeout,
                    busy: Arc::clone(&busy),
                    closing: closing_rx.clone(),
                    stop: stop_rx.clone(),
                };
                tokio::spawn(worker.run())
            })
            .collect();
        let workers_abort: Vec<AbortHandle> = workers.iter().map(JoinHandle::abort_handle).collect();

        // A single join point, so shutdown can wait on it more than once
        let joined = tokio::spawn(async move {
            for (id, handle) in workers.into_iter().enumerate() {
                if let Err(e) = handle.await {
                    error!(worker_id = id, "Worker task failed: {}", e);
                }
            }
        });

        DispatcherHandle {
            intake,
            closing,
            stop,
            busy,
            joined,
            workers_abort,
            max_workers: self.config.max_workers,
            shutdown_timeout: self.config.shutdown_timeout,
        }
    }
}

/// Handle to a running dispatcher.
///
/// Dropping the handle without calling [`shutdown`](Self::shutdown) leaves the
/// workers running until every intake sender is gone and the queue is drained.
pub struct DispatcherHandle {
    intake: mpsc::Sender<VideoJob>,
    closing: watch::Sender<bool>,
    stop: watch::Sender<bool>,
    busy: Arc<AtomicUsize>,
    joined: JoinHandle<()>,
    workers_abort: Vec<AbortHandle>,
    max_workers: usize,
    shutdown_timeout: Duration,
}

impl DispatcherHandle {
    /// Queue a job, waiting for space.
    ///
    /// On error the job is handed back and no result will be written for it.
    pub async fn submit(&self, job: VideoJob) -> Result<(), DispatchError> {
        self.intake
            .send(job)
            .await
            .map_err(|e| DispatchError::new(e.0, WorkerError::QueueClosed))
    }

    /// Queue a job, waiting at most `timeout` for space.
    pub async fn submit_timeout(&self, job: VideoJob, timeout: Duration) -> Result<(), DispatchError> {
        self.intake.send_timeout(job, timeout).await.map_err(|e| match e {
            SendTimeoutError::Timeout(job) => DispatchError::new(job, WorkerError::SubmitTimeout(timeout)),
            SendTimeoutError::Closed(job) => DispatchError::new(job, WorkerError::QueueClosed),
        })
    }

    /// Queue a job only if there is space right now.
    pub fn try_submit(&self, job: VideoJob) -> Result<(), DispatchError> {
        self.intake.try_send(job).map_err(|e| match e {
            TrySendError::Full(job) => DispatchError::new(job, WorkerError::QueueFull),
            TrySendError::Closed(job) => DispatchError::new(job, WorkerError::QueueClosed),
        })
    }

    /// Intake sender for producers that submit directly.
    pub fn sender(&self) -> mpsc::Sender<VideoJob> {
        self.intake.clone()
    }

    /// Number of workers currently running a job.
    pub fn busy_workers(&self) -> usize {
        self.busy.load(Ordering::SeqCst)
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Stop accepting jobs, drain the queue, then stop the workers.
    ///
    /// Accepted jobs get up to `shutdown_timeout` to finish. After that the
    /// remaining encodes are cancelled; each still delivers a failed result.
    pub async fn shutdown(self) -> WorkerResult<()> {
        let DispatcherHandle {
            intake,
            closing,
            stop,
            busy,
            mut joined,
            workers_abort,
            shutdown_timeout,
            ..
        } = self;

        info!("Dispatcher shutting down, draining accepted jobs");
        let _ = closing.send(true);
        drop(intake);

        if tokio::time::timeout(shutdown_timeout, &mut joined).await.is_ok() {
            info!("Dispatcher stopped");
            return Ok(());
        }

        warn!(
            busy = busy.load(Ordering::SeqCst),
            "Jobs still running after {:?}, cancelling",
            shutdown_timeout
        );
        let _ = stop.send(true);

        match tokio::time::timeout(shutdown_timeout, &mut joined).await {
            Ok(_) => {
                info!("Dispatcher stopped");
                Ok(())
            }
            Err(_) => {
                error!("Workers did not stop after cancellation, aborting them");
                for worker in &workers_abort {
                    worker.abort();
                }
                joined.abort();
                Err(WorkerError::ShutdownTimeout(shutdown_timeout))
            }
        }
    }
}
