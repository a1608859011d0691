//! Configuration validation.
//!
//! Serde handles syntax; this module checks semantics. Validation is a pure
//! function over `ProxyConfig` and reports every problem found, not just the
//! first.

use std::net::SocketAddr;

use crate::config::schema::ProxyConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("upstream credential is missing (set GEMINI_API_KEY or upstream.api_key)")]
    MissingCredential,

    #[error("upstream.base_url {0:?} is not a valid http(s) URL")]
    InvalidBaseUrl(String),

    #[error("upstream.credential_param must not be empty")]
    EmptyCredentialParam,

    #[error("listener.bind_address {0:?} is not a socket address")]
    InvalidBindAddress(String),

    #[error("observability.metrics_address {0:?} is not a socket address")]
    InvalidMetricsAddress(String),

    #[error("timeouts.{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("retries.max_attempts must be at least 1")]
    ZeroAttempts,

    #[error("retries.retryable_statuses contains invalid status {0}")]
    InvalidStatus(u16),

    #[error("retries.multiplier must be at least 1")]
    InvalidMultiplier,

    #[error("retries.jitter_ratio must be within [0, 1]")]
    InvalidJitter,

    #[error("retries.initial_delay_ms exceeds retries.max_delay_ms")]
    DelayOrdering,

    #[error("limits.max_body_bytes must be greater than zero")]
    ZeroBodyLimit,
}

/// Validate the full configuration, collecting all errors.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.credential().is_none() {
        errors.push(ValidationError::MissingCredential);
    }

    let base_ok = url::Url::parse(&config.upstream.base_url)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
        .unwrap_or(false);
    if !base_ok {
        errors.push(ValidationError::InvalidBaseUrl(config.upstream.base_url.clone()));
    }

    if config.upstream.credential_param.trim().is_empty() {
        errors.push(ValidationError::EmptyCredentialParam);
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    let timeouts = &config.timeouts;
    for (name, value) in [
        ("connect_secs", timeouts.connect_secs),
        ("read_secs", timeouts.read_secs),
        ("write_secs", timeouts.write_secs),
        ("pool_secs", timeouts.pool_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::ZeroTimeout(name));
        }
    }

    let retries = &config.retries;
    if retries.max_attempts == 0 {
        errors.push(ValidationError::ZeroAttempts);
    }
    for &status in &retries.retryable_statuses {
        if !(100..=599).contains(&status) {
            errors.push(ValidationError::InvalidStatus(status));
        }
    }
    if retries.multiplier == 0 {
        errors.push(ValidationError::InvalidMultiplier);
    }
    if !(0.0..=1.0).contains(&retries.jitter_ratio) {
        errors.push(ValidationError::InvalidJitter);
    }
    if retries.initial_delay_ms > retries.max_delay_ms {
        errors.push(ValidationError::DelayOrdering);
    }

    if config.limits.max_body_bytes == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
