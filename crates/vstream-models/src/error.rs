//! Model error types.

use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// The requested encode type is not one of `mp4`, `hls`, `hls-encrypted`.
    #[error("invalid encoding type")]
    InvalidEncodeType(String),
}

impl ModelError {
    pub fn invalid_encode_type(value: impl Into<String>) -> Self {
        Self::InvalidEncodeType(value.into())
    }
}
