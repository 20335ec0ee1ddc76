//! Pipeline error types.
//!
//! `ClientFailure` describes why a remote inference call produced nothing
//! usable. It never leaves the pipeline: the moderation gate and the
//! summarizer turn it into a local fallback. `PipelineError` is the only
//! error callers see.

use std::time::Duration;
use thiserror::Error;

/// Why a remote inference call could not be used.
#[derive(Debug, Error)]
pub enum ClientFailure {
    /// Connection, DNS, or transport failure
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// Non-2xx response
    #[error("service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body did not match the expected schema
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Call exceeded its deadline
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

impl ClientFailure {
    /// Short tag for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "unavailable",
            Self::Status { .. } => "status",
            Self::Malformed(_) => "malformed",
            Self::Timeout(_) => "timeout",
        }
    }
}

impl From<reqwest::Error> for ClientFailure {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Malformed(e.to_string())
        } else {
            Self::Unavailable(e.to_string())
        }
    }
}

/// Errors surfaced to callers of the pipeline.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    /// Caller supplied unusable input (empty text, bad length bounds)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Caller cancelled the operation before it finished
    #[error("operation cancelled")]
    Cancelled,
}

impl From<PipelineError> for civic_common::Error {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::InvalidInput(msg) => civic_common::Error::InvalidInput(msg),
            PipelineError::Cancelled => civic_common::Error::Cancelled,
        }
    }
}
