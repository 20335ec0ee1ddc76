//! Civic Common - Shared configuration, errors, and logging for civic services.
//!
//! This crate provides:
//! - Configuration types and loading (`config.json` + `secrets.json`)
//! - Configuration validation
//! - Error types and handling utilities
//! - Logging setup
//! - String helpers used across services

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod config_loader;
pub mod error;
pub mod logging;
pub mod util;
pub mod validation;

pub use config::{
    Config, DigestConfig, ModerationConfig, ObservabilityConfig, SecretsConfig, ServerConfig,
    SummarizerConfig,
};
pub use error::Error;
pub use validation::{Validate, ValidationError, ValidationResult};
