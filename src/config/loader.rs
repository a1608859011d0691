//! Configuration loading from disk and environment.
//!
//! Layers, lowest precedence first: built-in defaults, optional TOML file,
//! environment overrides. Command-line overrides are applied by the binary
//! before validation runs.

use std::fs;
use std::path::Path;

use crate::config::schema::ProxyConfig;
use crate::config::secret::Credential;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable holding the upstream credential.
pub const ENV_API_KEY: &str = "GEMINI_API_KEY";
/// Environment variable overriding the listener bind address.
pub const ENV_BIND: &str = "GEMINI_PROXY_BIND";
/// Environment variable pointing at a TOML config file.
pub const ENV_CONFIG_PATH: &str = "GEMINI_PROXY_CONFIG";

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Read the optional TOML file and apply environment overrides from `env`.
///
/// The result is not validated; call [`finalize`] once all overrides are in.
pub fn load_layers<F>(path: Option<&Path>, env: F) -> Result<ProxyConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            let config: ProxyConfig = toml::from_str(&content)?;
            tracing::debug!(path = %path.display(), "Configuration file read");
            config
        }
        None => ProxyConfig::default(),
    };

    if let Some(key) = env(ENV_API_KEY).filter(|v| !v.trim().is_empty()) {
        config.upstream.api_key = Some(Credential::new(key.trim()));
    }
    if let Some(bind) = env(ENV_BIND).filter(|v| !v.trim().is_empty()) {
        config.listener.bind_address = bind.trim().to_string();
    }

    Ok(config)
}

/// Validate a fully layered configuration.
pub fn finalize(mut config: ProxyConfig) -> Result<ProxyConfig, ConfigError> {
    while config.upstream.base_url.ends_with('/') {
        config.upstream.base_url.pop();
    }
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from an optional TOML file plus the process environment.
pub fn load_config(path: Option<&Path>) -> Result<ProxyConfig, ConfigError> {
    finalize(load_layers(path, |name| std::env::var(name).ok())?)
}
