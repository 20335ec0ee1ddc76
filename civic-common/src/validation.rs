//! Configuration validation.
//!
//! Checks that endpoints, deadlines, length bounds, and policy lists are
//! usable before the service starts.

use thiserror::Error;

use crate::config::{
    Config, DigestConfig, ModerationConfig, ObservabilityConfig, ServerConfig, SummarizerConfig,
};

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid port {port}: must be between 1 and 65535")]
    InvalidPort { port: u16, field: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

impl Config {
    /// Validate the entire configuration.
    pub fn validate(&self) -> ValidationResult<()> {
        let sections: [&dyn Validate; 5] = [
            &self.server,
            &self.moderation,
            &self.summarizer,
            &self.digest,
            &self.observability,
        ];

        let mut errors: Vec<ValidationError> = sections
            .iter()
            .filter_map(|section| section.validate().err())
            .collect();

        if errors.is_empty() {
            Ok(())
        } else if errors.len() == 1 {
            Err(errors.remove(0))
        } else {
            Err(ValidationError::Multiple(errors))
        }
    }

    /// Load, apply environment overrides, and validate configuration.
    pub fn load_and_validate() -> anyhow::Result<Self> {
        let config = Self::load_with_env()?;
        config.validate().map_err(crate::Error::from)?;
        Ok(config)
    }
}

fn validate_endpoint(field: &str, endpoint: &str) -> ValidationResult<()> {
    if endpoint.trim().is_empty() {
        return Err(ValidationError::MissingField { field: field.into() });
    }

    match url::Url::parse(endpoint) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        Ok(url) => Err(ValidationError::InvalidValue {
            field: field.into(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        }),
        Err(e) => Err(ValidationError::InvalidValue {
            field: field.into(),
            reason: e.to_string(),
        }),
    }
}

fn validate_positive(field: &str, value: u64) -> ValidationResult<()> {
    if value == 0 {
        return Err(ValidationError::InvalidValue {
            field: field.into(),
            reason: "must be greater than 0".into(),
        });
    }
    Ok(())
}

impl Validate for ServerConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort {
                port: self.port,
                field: "server.port".into(),
            });
        }
        if self.host.parse::<std::net::IpAddr>().is_err() {
            return Err(ValidationError::InvalidValue {
                field: "server.host".into(),
                reason: format!("'{}' is not an IP address", self.host),
            });
        }
        Ok(())
    }
}

impl Validate for ModerationConfig {
    fn validate(&self) -> ValidationResult<()> {
        validate_endpoint("moderation.endpoint", &self.endpoint)?;
        validate_positive("moderation.timeout_ms", self.timeout_ms)?;

        if self.violation_labels.iter().all(|l| l.trim().is_empty()) {
            return Err(ValidationError::MissingField {
                field: "moderation.violation_labels".into(),
            });
        }

        if self.deny_list.iter().all(|t| t.trim().is_empty()) {
            return Err(ValidationError::MissingField {
                field: "moderation.deny_list".into(),
            });
        }

        if self.max_retries > 0 {
            validate_positive("moderation.retry_backoff_ms", self.retry_backoff_ms)?;
        }

        Ok(())
    }
}

impl Validate for SummarizerConfig {
    fn validate(&self) -> ValidationResult<()> {
        validate_endpoint("summarizer.endpoint", &self.endpoint)?;
        validate_positive("summarizer.timeout_ms", self.timeout_ms)
    }
}

impl Validate for DigestConfig {
    fn validate(&self) -> ValidationResult<()> {
        validate_positive("digest.max_concurrency", self.max_concurrency as u64)?;
        validate_positive("digest.min_length", self.min_length as u64)?;

        if self.min_length > self.max_length {
            return Err(ValidationError::InvalidValue {
                field: "digest.min_length".into(),
                reason: format!(
                    "must not exceed digest.max_length ({} > {})",
                    self.min_length, self.max_length
                ),
            });
        }

        Ok(())
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_level".into(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            });
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.log_format.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_format".into(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            });
        }

        Ok(())
    }
}
