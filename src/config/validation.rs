//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, pool size > 0)
//! - Check addresses and URLs parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BridgeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::BridgeConfig;

/// One failed check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted config key (e.g., "upstream.base_url").
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Check a loaded configuration.
pub fn validate_config(config: &BridgeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    match url::Url::parse(&config.upstream.base_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => errors.push(ValidationError::new(
            "upstream.base_url",
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new("upstream.base_url", e.to_string())),
    }

    for (field, path) in [
        ("upstream.fetch_model_path", &config.upstream.fetch_model_path),
        ("upstream.model_path", &config.upstream.model_path),
        ("upstream.attributes_path", &config.upstream.attributes_path),
        ("upstream.update_attributes_path", &config.upstream.update_attributes_path),
    ] {
        if !path.starts_with('/') {
            errors.push(ValidationError::new(field, "must start with '/'"));
        }
    }

    for (field, secs) in [
        ("upstream.timeout_secs", config.upstream.timeout_secs),
        ("upstream.connect_timeout_secs", config.upstream.connect_timeout_secs),
        ("upstream.attributes_timeout_secs", config.upstream.attributes_timeout_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
    ] {
        if secs == 0 {
            errors.push(ValidationError::new(field, "must be greater than 0"));
        }
    }

    if config.timeouts.request_secs <= config.upstream.timeout_secs {
        errors.push(ValidationError::new(
            "timeouts.request_secs",
            "must exceed upstream.timeout_secs",
        ));
    }

    if config.pipeline.max_concurrent_jobs == 0 {
        errors.push(ValidationError::new(
            "pipeline.max_concurrent_jobs",
            "must be greater than 0",
        ));
    }

    if config.storage.tmp_root.trim().is_empty() {
        errors.push(ValidationError::new("storage.tmp_root", "must not be empty"));
    }

    if config.uploads.max_upload_bytes == 0 {
        errors.push(ValidationError::new(
            "uploads.max_upload_bytes",
            "must be greater than 0",
        ));
    }
    for ext in &config.uploads.allowed_extensions {
        if !ext.starts_with('.') || ext.len() < 2 {
            errors.push(ValidationError::new(
                "uploads.allowed_extensions",
                format!("'{ext}' must look like '.stl'"),
            ));
        }
    }

    for origin in &config.cors.allowed_origins {
        if axum::http::HeaderValue::from_str(origin).is_err() {
            errors.push(ValidationError::new(
                "cors.allowed_origins",
                format!("'{origin}' is not a valid header value"),
            ));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
