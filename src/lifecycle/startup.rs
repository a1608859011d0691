//! Startup orchestration.
//!
//! Takes a validated configuration and brings the proxy up in dependency
//! order: upstream client, metrics exporter, listener. Any failure is fatal.

use tokio::net::TcpListener;

use crate::config::ProxyConfig;
use crate::error::{ProxyError, Result};
use crate::http::HttpServer;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;

/// Serve until `shutdown` fires.
pub async fn start(config: ProxyConfig, shutdown: &Shutdown) -> Result<()> {
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.base_url,
        credential = %config.upstream.api_key.as_ref().map(|_| "***").unwrap_or("<missing>"),
        connect_timeout_secs = config.timeouts.connect_secs,
        read_timeout_secs = config.timeouts.read_secs,
        write_timeout_secs = config.timeouts.write_secs,
        pool_timeout_secs = config.timeouts.pool_secs,
        max_attempts = config.retries.max_attempts,
        retryable_statuses = ?config.retries.retryable_statuses,
        "Configuration loaded"
    );

    let server = HttpServer::new(config)?;

    let observability = &server.config().observability;
    if observability.metrics_enabled {
        match observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let bind_address = server.config().listener.bind_address.clone();
    let listener = TcpListener::bind(&bind_address)
        .await
        .map_err(|source| ProxyError::Bind {
            addr: bind_address.clone(),
            source,
        })?;

    tracing::info!(address = %bind_address, "Listening for connections");

    server.run(listener, shutdown.subscribe()).await
}
