//! Bounded transcoding worker pool.
//!
//! A [`Dispatcher`] owns a fixed number of worker tasks that pull
//! [`VideoJob`](vstream_models::VideoJob)s from one shared bounded queue. Each
//! worker runs the per-job encode state machine against an injected
//! [`EncodingStrategy`](vstream_media::EncodingStrategy) and writes exactly one
//! [`ProcessingResult`](vstream_models::ProcessingResult) to the job's result
//! channel.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod naming;
pub mod worker;

pub use config::DispatcherConfig;
pub use dispatcher::{Dispatcher, DispatcherHandle};
pub use error::{DispatchError, WorkerError, WorkerResult};
pub use logging::{init_tracing, JobLogger};
pub use naming::{random_base_name, resolve_base_name, RANDOM_NAME_LEN};
pub use worker::encode;
