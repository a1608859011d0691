//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::secret::Credential;

/// Default upstream API host.
pub const DEFAULT_UPSTREAM_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Upstream target and injected credential.
    pub upstream: UpstreamConfig,

    /// Per-phase upstream timeouts.
    pub timeouts: TimeoutConfig,

    /// Retry policy.
    pub retries: RetryConfig,

    /// Inbound request limits.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl ProxyConfig {
    /// The injected credential. Validation guarantees it is present.
    pub fn credential(&self) -> Option<&Credential> {
        self.upstream.api_key.as_ref().filter(|key| !key.is_empty())
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// The single upstream API this proxy fronts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL, without trailing slash (e.g., "https://generativelanguage.googleapis.com").
    pub base_url: String,

    /// Server-side API key. Usually supplied through `GEMINI_API_KEY`.
    pub api_key: Option<Credential>,

    /// Query parameter name carrying the credential.
    pub credential_param: String,

    /// Honour HTTP(S)_PROXY / NO_PROXY from the environment for upstream calls.
    pub use_system_proxy: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_UPSTREAM_BASE_URL.to_string(),
            api_key: None,
            credential_param: "key".to_string(),
            use_system_proxy: true,
        }
    }
}

/// Per-phase timeouts for upstream calls, in seconds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout.
    pub connect_secs: u64,

    /// Read timeout. Generous because the upstream may generate slowly.
    pub read_secs: u64,

    /// Write timeout for sending the request.
    pub write_secs: u64,

    /// Wait for a free pooled connection.
    pub pool_secs: u64,
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn read(&self) -> Duration {
        Duration::from_secs(self.read_secs)
    }

    /// Upper bound for a single attempt: every phase at its budget.
    pub fn attempt_deadline(&self) -> Duration {
        Duration::from_secs(
            self.connect_secs
                .saturating_add(self.pool_secs)
                .saturating_add(self.write_secs)
                .saturating_add(self.read_secs),
        )
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 15,
            read_secs: 150,
            write_secs: 60,
            pool_secs: 15,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per request, including the first.
    pub max_attempts: u32,

    /// Upstream statuses that trigger a retry.
    pub retryable_statuses: Vec<u16>,

    /// Delay after the first failed attempt in milliseconds.
    pub initial_delay_ms: u64,

    /// Growth factor between consecutive delays.
    pub multiplier: u32,

    /// Cap for a single delay in milliseconds.
    pub max_delay_ms: u64,

    /// Random extra delay as a fraction of the computed delay (0.0 disables jitter).
    pub jitter_ratio: f64,
}

impl RetryConfig {
    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_statuses.contains(&status)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retryable_statuses: vec![429, 500, 502, 503, 504],
            initial_delay_ms: 2000,
            multiplier: 2,
            max_delay_ms: 60_000,
            jitter_ratio: 0.0,
        }
    }
}

/// Inbound request limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum inbound body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 32 * 1024 * 1024, // 32MB, inline media uploads
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
