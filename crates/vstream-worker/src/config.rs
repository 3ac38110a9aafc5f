//! Dispatcher configuration.

use std::time::Duration;

use tracing::warn;
use vstream_media::EncoderConfig;

/// Queue slots per worker when no capacity is configured.
const QUEUE_SLOTS_PER_WORKER: usize = 4;

/// Dispatcher configuration.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Number of worker tasks, and so the maximum number of concurrent encodes
    pub max_workers: usize,
    /// Capacity of the shared intake queue
    pub queue_capacity: usize,
    /// Per-job encode timeout, `None` to let encodes run unbounded
    pub job_timeout: Option<Duration>,
    /// How long shutdown waits for accepted jobs before cancelling them
    pub shutdown_timeout: Duration,
    /// Settings for the FFmpeg strategy
    pub encoder: EncoderConfig,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_workers: 2,
            queue_capacity: 2 * QUEUE_SLOTS_PER_WORKER,
            job_timeout: Some(Duration::from_secs(3600)), // 1 hour
            shutdown_timeout: Duration::from_secs(30),
            encoder: EncoderConfig::default(),
        }
    }
}

impl DispatcherConfig {
    /// Config for `max_workers` workers with a proportional queue.
    pub fn with_workers(max_workers: usize) -> Self {
        Self {
            max_workers,
            queue_capacity: max_workers.saturating_mul(QUEUE_SLOTS_PER_WORKER),
            ..Self::default()
        }
    }

    /// Create config from environment variables, loading `.env` first.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let max_workers = std::env::var("VSTREAM_MAX_WORKERS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(2);

        Self {
            max_workers,
            queue_capacity: std::env::var("VSTREAM_QUEUE_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(|| max_workers.saturating_mul(QUEUE_SLOTS_PER_WORKER)),
            job_timeout: std::env::var("VSTREAM_JOB_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .map_or(Some(Duration::from_secs(3600)), |secs| {
                    (secs > 0).then(|| Duration::from_secs(secs))
                }),
            shutdown_timeout: Duration::from_secs(
                std::env::var("VSTREAM_SHUTDOWN_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            encoder: EncoderConfig::from_env(),
        }
    }

    /// Clamp values the pool cannot run with.
    pub fn normalized(mut self) -> Self {
        if self.max_workers == 0 {
            warn!("max_workers is 0, using a single worker");
            self.max_workers = 1;
        }
        if self.queue_capacity == 0 {
            warn!("queue_capacity is 0, using a single slot");
            self.queue_capacity = 1;
        }
        self
    }
}
