//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults
//!     → loader.rs (optional TOML file, environment overrides)
//!     → binary applies command-line overrides
//!     → validation.rs (semantic checks, all errors reported)
//!     → ProxyConfig (validated, immutable)
//!     → shared via Arc with every request handler
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no runtime reload
//! - All fields have defaults to allow minimal configs
//! - The credential lives in `secret.rs` and never formats as plain text
//! - A missing credential stops startup instead of producing broken URLs

pub mod loader;
pub mod schema;
pub mod secret;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    ListenerConfig, LimitsConfig, LogFormat, ObservabilityConfig, ProxyConfig, RetryConfig,
    TimeoutConfig, UpstreamConfig,
};
pub use secret::Credential;
pub use validation::ValidationError;
