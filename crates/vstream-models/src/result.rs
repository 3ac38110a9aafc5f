//! Processing results sent back to the job submitter.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Outcome of one job. Exactly one is delivered per submitted job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ProcessingResult {
    /// The job ID, echoed back
    pub id: i64,
    /// True if the encode succeeded
    pub successful: bool,
    /// Human-readable diagnostic or success note
    pub message: String,
    /// Basename of the produced artifact, empty on failure
    pub output_file: String,
}

impl ProcessingResult {
    pub fn success(id: i64, output_file: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id,
            successful: true,
            message: message.into(),
            output_file: output_file.into(),
        }
    }

    pub fn failure(id: i64, message: impl Into<String>) -> Self {
        Self {
            id,
            successful: false,
            message: message.into(),
            output_file: String::new(),
        }
    }

    /// Serialize to JSON bytes.
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}
