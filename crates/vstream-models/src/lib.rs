//! Shared data models for the VStream transcoding pool.
//!
//! This crate provides:
//! - Video jobs and their encode options
//! - The closed set of supported encode types
//! - Processing results delivered on a job's result channel
//! - Progress messages pushed to an optional observer

pub mod encoding;
pub mod error;
pub mod job;
pub mod progress;
pub mod result;

// Re-export common types
pub use encoding::{EncodeOptions, EncodeType, Rendition};
pub use error::{ModelError, ModelResult};
pub use job::{ResultSender, VideoJob, VideoJobBuilder};
pub use progress::{ProgressEvent, ProgressMessage, ProgressObserver};
pub use result::ProcessingResult;
