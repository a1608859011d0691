//! Upstream HTTP client.
//!
//! One `reqwest::Client` (and its connection pool) lives for the whole process.
//! Each call is a single attempt; retry decisions belong to
//! `resilience::retries`.

use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{HeaderMap, Method, StatusCode};

use crate::config::{Credential, TimeoutConfig, UpstreamConfig};

/// Request prepared for the upstream.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Fully buffered upstream response.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Which phase ran out of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    Connect,
    Read,
    /// The per-attempt deadline covering every phase.
    Attempt,
}

impl fmt::Display for TimeoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutKind::Connect => f.write_str("connect timeout"),
            TimeoutKind::Read => f.write_str("read timeout"),
            TimeoutKind::Attempt => f.write_str("attempt timeout"),
        }
    }
}

/// Transport failure classes that are worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Connect,
    Request,
    Body,
    Decode,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Connect => f.write_str("connect error"),
            TransportKind::Request => f.write_str("request error"),
            TransportKind::Body => f.write_str("body error"),
            TransportKind::Decode => f.write_str("decode error"),
        }
    }
}

/// Failure of a single upstream attempt. Messages are credential-free.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamError {
    #[error("upstream {0}")]
    Timeout(TimeoutKind),

    #[error("upstream {kind}: {message}")]
    Transport { kind: TransportKind, message: String },

    /// Not a transport problem: misconfiguration or a bug. Never retried.
    #[error("unexpected error: {0}")]
    Fatal(String),
}

/// A single upstream call.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn send(&self, request: &UpstreamRequest) -> Result<UpstreamResponse, UpstreamError>;
}

/// `Upstream` backed by a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
    attempt_deadline: Duration,
    credential: Credential,
}

impl HttpUpstream {
    /// Build the process-wide client.
    ///
    /// Redirects are not followed and bodies are never decompressed, so the
    /// client sees exactly what the upstream sent.
    pub fn new(
        upstream: &UpstreamConfig,
        timeouts: &TimeoutConfig,
        credential: Credential,
    ) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(timeouts.connect())
            .read_timeout(timeouts.read())
            .pool_idle_timeout(Duration::from_secs(90))
            .redirect(reqwest::redirect::Policy::none());
        if !upstream.use_system_proxy {
            builder = builder.no_proxy();
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            attempt_deadline: timeouts.attempt_deadline(),
            credential,
        })
    }

    async fn execute(&self, request: &UpstreamRequest) -> Result<UpstreamResponse, reqwest::Error> {
        let response = self
            .client
            .request(request.method.clone(), request.url.as_str())
            .headers(request.headers.clone())
            .body(request.body.clone())
            .send()
            .await?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }

    fn classify(&self, err: reqwest::Error) -> UpstreamError {
        let err = err.without_url();
        let message = self.credential.redact(&error_chain(&err));

        if err.is_timeout() {
            let kind = if err.is_connect() {
                TimeoutKind::Connect
            } else {
                TimeoutKind::Read
            };
            return UpstreamError::Timeout(kind);
        }

        let kind = if err.is_builder() {
            None
        } else if err.is_connect() {
            Some(TransportKind::Connect)
        } else if err.is_body() {
            Some(TransportKind::Body)
        } else if err.is_decode() {
            Some(TransportKind::Decode)
        } else if err.is_request() {
            Some(TransportKind::Request)
        } else {
            None
        };

        match kind {
            Some(kind) => UpstreamError::Transport { kind, message },
            None => UpstreamError::Fatal(message),
        }
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn send(&self, request: &UpstreamRequest) -> Result<UpstreamResponse, UpstreamError> {
        match tokio::time::timeout(self.attempt_deadline, self.execute(request)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(err)) => Err(self.classify(err)),
            Err(_) => Err(UpstreamError::Timeout(TimeoutKind::Attempt)),
        }
    }
}

/// Render an error with its sources, `outer: inner: root`.
fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
