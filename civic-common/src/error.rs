//! Error types shared by civic services.

use thiserror::Error;

use crate::validation::ValidationError;

/// Unified error type for civic services.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration failed to load or validate
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input or request
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Operation cancelled before it completed
    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidInput(_) => 400,
            Self::Cancelled => 503,
            Self::Config(_) => 500,
        }
    }
}

impl From<ValidationError> for Error {
    fn from(e: ValidationError) -> Self {
        Self::Config(e.to_string())
    }
}
