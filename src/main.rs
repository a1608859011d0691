//! gemini-proxy
//!
//! Transparent reverse proxy that forwards every request to one upstream API
//! and injects a server-side API key the client never sees.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server ──▶ http::request ──▶ upstream::target
//!                                     (strip headers)    (base/path?key=…&query)
//!                                                               │
//!                                                               ▼
//!                                                     resilience::retries ◀──▶ upstream::client ◀──▶ Upstream API
//!                                                     (attempt, backoff)       (pooled reqwest)
//!                                                               │
//!     Client Response                                           ▼
//!     ◀────────────── http::response ◀──────────────────────────┘
//!                     (strip framing headers)
//! ```

use std::path::PathBuf;

use clap::Parser;

use gemini_proxy::config::loader::{self, ENV_CONFIG_PATH};
use gemini_proxy::lifecycle::{startup, Shutdown};
use gemini_proxy::observability::logging;

#[derive(Parser)]
#[command(name = "gemini-proxy")]
#[command(about = "Reverse proxy that injects a server-side API key", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long, env = ENV_CONFIG_PATH)]
    config: Option<PathBuf>,

    /// Listen address, overrides the file and environment.
    #[arg(short, long)]
    bind: Option<String>,

    /// Log level, overrides the file.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = loader::load_layers(cli.config.as_deref(), |name| std::env::var(name).ok())?;
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }

    logging::init_logging(&config.observability)?;
    tracing::info!("gemini-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    let config = match loader::finalize(config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Refusing to start");
            return Err(e.into());
        }
    };

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();

    startup::start(config, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
