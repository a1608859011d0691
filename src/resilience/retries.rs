//! Retry executor.
//!
//! Drives one request through up to `max_attempts` upstream calls.
//!
//! # States
//! ```text
//! Attempting(n) → Succeeded          status not in retryable set (any status)
//! Attempting(n) → Attempting(n+1)    retryable status / timeout / transport error, n < max
//! Attempting(n) → ExhaustedRetries   retryable status or timeout, n == max
//! Attempting(n) → FatalAbort         transport error at n == max, or unexpected error at any n
//! ```
//!
//! Attempts within one request are strictly sequential. Dropping the future
//! (client went away) cancels the in-flight call or the pending sleep.

use std::sync::Arc;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;
use crate::upstream::{
    TimeoutKind, TransportKind, Upstream, UpstreamError, UpstreamRequest, UpstreamResponse,
};

/// Classified result of a single upstream attempt.
#[derive(Debug, Clone)]
pub enum AttemptOutcome {
    Success(UpstreamResponse),
    RetryableFailure(UpstreamResponse),
    Timeout(TimeoutKind),
    Transport { kind: TransportKind, message: String },
    Fatal(String),
}

impl AttemptOutcome {
    /// Label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            AttemptOutcome::Success(_) => "success",
            AttemptOutcome::RetryableFailure(_) => "retryable_status",
            AttemptOutcome::Timeout(_) => "timeout",
            AttemptOutcome::Transport { .. } => "transport",
            AttemptOutcome::Fatal(_) => "fatal",
        }
    }
}

/// Sort a raw attempt result into an outcome under `policy`.
pub fn classify(
    result: Result<UpstreamResponse, UpstreamError>,
    policy: &RetryConfig,
) -> AttemptOutcome {
    match result {
        Ok(response) if policy.is_retryable_status(response.status.as_u16()) => {
            AttemptOutcome::RetryableFailure(response)
        }
        Ok(response) => AttemptOutcome::Success(response),
        Err(UpstreamError::Timeout(kind)) => AttemptOutcome::Timeout(kind),
        Err(UpstreamError::Transport { kind, message }) => {
            AttemptOutcome::Transport { kind, message }
        }
        Err(UpstreamError::Fatal(message)) => AttemptOutcome::Fatal(message),
    }
}

/// Most recent failure seen while retrying.
#[derive(Debug, Clone)]
pub enum LastKnown {
    /// Upstream answered with a retryable status.
    Response(UpstreamResponse),
    /// No usable response; synthetic description of the failure.
    Failure(String),
}

/// Where a request ended up.
#[derive(Debug, Clone)]
pub enum Terminal {
    Succeeded(UpstreamResponse),
    ExhaustedRetries(LastKnown),
    FatalAbort(String),
}

/// Next move after one attempt.
#[derive(Debug, Clone)]
pub enum Step {
    Retry(LastKnown),
    Finish(Terminal),
}

/// Pure transition function of the retry state machine.
pub fn next_step(attempt: u32, max_attempts: u32, outcome: AttemptOutcome) -> Step {
    let has_budget = attempt < max_attempts;
    match outcome {
        AttemptOutcome::Success(response) => Step::Finish(Terminal::Succeeded(response)),
        AttemptOutcome::RetryableFailure(response) => {
            let last = LastKnown::Response(response);
            if has_budget {
                Step::Retry(last)
            } else {
                Step::Finish(Terminal::ExhaustedRetries(last))
            }
        }
        AttemptOutcome::Timeout(kind) => {
            let last = LastKnown::Failure(format!("Proxy error: upstream {}", kind));
            if has_budget {
                Step::Retry(last)
            } else {
                Step::Finish(Terminal::ExhaustedRetries(last))
            }
        }
        AttemptOutcome::Transport { kind, message } => {
            let description = format!("Proxy error: upstream {}: {}", kind, message);
            if has_budget {
                Step::Retry(LastKnown::Failure(description))
            } else {
                Step::Finish(Terminal::FatalAbort(description))
            }
        }
        AttemptOutcome::Fatal(message) => {
            Step::Finish(Terminal::FatalAbort(format!("Proxy error: {}", message)))
        }
    }
}

/// Terminal outcome plus bookkeeping for logs and tests.
#[derive(Debug, Clone)]
pub struct RetryReport {
    pub terminal: Terminal,
    pub attempts: u32,
    pub delays: Vec<Duration>,
}

/// Issues upstream calls under a retry policy.
#[derive(Clone)]
pub struct RetryExecutor {
    upstream: Arc<dyn Upstream>,
    policy: RetryConfig,
}

impl RetryExecutor {
    pub fn new(upstream: Arc<dyn Upstream>, policy: RetryConfig) -> Self {
        Self { upstream, policy }
    }

    /// Run the state machine until it reaches a terminal state.
    pub async fn execute(&self, request: &UpstreamRequest) -> RetryReport {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut delays = Vec::new();
        let mut attempt = 1;

        loop {
            let outcome = classify(self.upstream.send(request).await, &self.policy);
            let label = outcome.label();
            metrics::record_attempt(label);
            log_attempt(attempt, &outcome);

            match next_step(attempt, max_attempts, outcome) {
                Step::Finish(terminal) => {
                    log_terminal(attempt, &terminal);
                    return RetryReport {
                        terminal,
                        attempts: attempt,
                        delays,
                    };
                }
                Step::Retry(last) => {
                    let delay = calculate_backoff(attempt, &self.policy);
                    let reason = match &last {
                        LastKnown::Response(response) => response.status.as_str().to_string(),
                        LastKnown::Failure(_) => label.to_string(),
                    };
                    metrics::record_retry(&reason);
                    tracing::info!(
                        attempt,
                        max_attempts,
                        delay = ?delay,
                        reason = %reason,
                        "Retrying upstream request"
                    );
                    tokio::time::sleep(delay).await;
                    delays.push(delay);
                    attempt += 1;
                }
            }
        }
    }
}

fn log_attempt(attempt: u32, outcome: &AttemptOutcome) {
    match outcome {
        AttemptOutcome::Success(response) | AttemptOutcome::RetryableFailure(response) => {
            tracing::info!(
                attempt,
                status = response.status.as_u16(),
                outcome = outcome.label(),
                "Upstream responded"
            );
        }
        AttemptOutcome::Timeout(kind) => {
            tracing::warn!(attempt, kind = %kind, "Upstream timed out");
        }
        AttemptOutcome::Transport { kind, message } => {
            tracing::warn!(attempt, kind = %kind, error = %message, "Upstream transport error");
        }
        AttemptOutcome::Fatal(message) => {
            tracing::error!(attempt, error = %message, "Unexpected upstream error");
        }
    }
}

fn log_terminal(attempt: u32, terminal: &Terminal) {
    match terminal {
        Terminal::Succeeded(_) => {}
        Terminal::ExhaustedRetries(LastKnown::Response(response)) => {
            tracing::error!(
                attempts = attempt,
                status = response.status.as_u16(),
                "Retries exhausted"
            );
        }
        Terminal::ExhaustedRetries(LastKnown::Failure(description)) => {
            tracing::error!(attempts = attempt, error = %description, "Retries exhausted");
        }
        Terminal::FatalAbort(description) => {
            tracing::error!(attempts = attempt, error = %description, "Aborting request");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Bytes;
    use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    type Scripted = Result<UpstreamResponse, UpstreamError>;

    /// Upstream that replays a fixed script and counts calls.
    struct ScriptedUpstream {
        script: Mutex<VecDeque<Scripted>>,
        calls: Mutex<u32>,
    }

    impl ScriptedUpstream {
        fn new(script: Vec<Scripted>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl Upstream for ScriptedUpstream {
        async fn send(&self, _request: &UpstreamRequest) -> Result<UpstreamResponse, UpstreamError> {
            *self.calls.lock().unwrap() += 1;
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .expect("upstream called more often than scripted")
        }
    }

    fn response(status: u16, body: &'static str) -> Scripted {
        let mut headers = HeaderMap::new();
        headers.insert("x-attempt-body", HeaderValue::from_static(body));
        Ok(UpstreamResponse {
            status: StatusCode::from_u16(status).unwrap(),
            headers,
            body: Bytes::from_static(body.as_bytes()),
        })
    }

    fn request() -> UpstreamRequest {
        UpstreamRequest {
            method: Method::POST,
            url: "http://upstream.test/v1/models?key=k".into(),
            headers: HeaderMap::new(),
            body: Bytes::from_static(b"{}"),
        }
    }

    fn executor(upstream: Arc<ScriptedUpstream>) -> RetryExecutor {
        RetryExecutor::new(upstream, RetryConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_two_unavailable() {
        let upstream = ScriptedUpstream::new(vec![
            response(503, "first"),
            response(503, "second"),
            response(200, "third"),
        ]);
        let start = tokio::time::Instant::now();

        let report = executor(upstream.clone()).execute(&request()).await;

        assert_eq!(start.elapsed(), Duration::from_secs(6));
        assert_eq!(report.attempts, 3);
        assert_eq!(report.delays, vec![Duration::from_secs(2), Duration::from_secs(4)]);
        match report.terminal {
            Terminal::Succeeded(resp) => {
                assert_eq!(resp.status, StatusCode::OK);
                assert_eq!(resp.body, Bytes::from_static(b"third"));
                assert_eq!(resp.headers["x-attempt-body"], "third");
            }
            other => panic!("expected success, got {:?}", other),
        }
        assert_eq!(upstream.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_surfaces_last_response() {
        let upstream = ScriptedUpstream::new(vec![
            response(503, "one"),
            response(503, "two"),
            response(503, "three"),
        ]);

        let report = executor(upstream.clone()).execute(&request()).await;

        assert_eq!(report.attempts, 3);
        assert_eq!(report.delays.len(), 2);
        match report.terminal {
            Terminal::ExhaustedRetries(LastKnown::Response(resp)) => {
                assert_eq!(resp.status, StatusCode::SERVICE_UNAVAILABLE);
                assert_eq!(resp.body, Bytes::from_static(b"three"));
            }
            other => panic!("expected exhausted response, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_status_returns_immediately() {
        let upstream = ScriptedUpstream::new(vec![response(404, "missing")]);
        let start = tokio::time::Instant::now();

        let report = executor(upstream.clone()).execute(&request()).await;

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(report.attempts, 1);
        assert!(report.delays.is_empty());
        assert!(matches!(
            report.terminal,
            Terminal::Succeeded(ref resp) if resp.status == StatusCode::NOT_FOUND
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn redirect_is_not_retried() {
        let upstream = ScriptedUpstream::new(vec![response(302, "moved")]);
        let report = executor(upstream).execute(&request()).await;
        assert!(matches!(
            report.terminal,
            Terminal::Succeeded(ref resp) if resp.status == StatusCode::FOUND
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn read_timeouts_exhaust_with_description() {
        let upstream = ScriptedUpstream::new(vec![
            Err(UpstreamError::Timeout(TimeoutKind::Read)),
            Err(UpstreamError::Timeout(TimeoutKind::Read)),
            Err(UpstreamError::Timeout(TimeoutKind::Read)),
        ]);

        let report = executor(upstream.clone()).execute(&request()).await;

        assert_eq!(upstream.calls(), 3);
        assert_eq!(report.delays.len(), 2);
        match report.terminal {
            Terminal::ExhaustedRetries(LastKnown::Failure(description)) => {
                assert!(description.contains("read timeout"));
            }
            other => panic!("expected exhausted failure, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transport_error_then_success() {
        let upstream = ScriptedUpstream::new(vec![
            Err(UpstreamError::Transport {
                kind: TransportKind::Connect,
                message: "connection reset".into(),
            }),
            response(200, "ok"),
        ]);

        let report = executor(upstream).execute(&request()).await;

        assert_eq!(report.attempts, 2);
        assert_eq!(report.delays, vec![Duration::from_secs(2)]);
        assert!(matches!(report.terminal, Terminal::Succeeded(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn transport_error_on_last_attempt_aborts() {
        let transport = || -> Scripted {
            Err(UpstreamError::Transport {
                kind: TransportKind::Request,
                message: "broken pipe".into(),
            })
        };
        let upstream = ScriptedUpstream::new(vec![transport(), transport(), transport()]);

        let report = executor(upstream).execute(&request()).await;

        match report.terminal {
            Terminal::FatalAbort(description) => assert!(description.contains("broken pipe")),
            other => panic!("expected fatal abort, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unexpected_error_aborts_without_retry() {
        let upstream = ScriptedUpstream::new(vec![Err(UpstreamError::Fatal(
            "builder error".into(),
        ))]);
        let start = tokio::time::Instant::now();

        let report = executor(upstream.clone()).execute(&request()).await;

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(upstream.calls(), 1);
        assert!(report.delays.is_empty());
        assert!(matches!(report.terminal, Terminal::FatalAbort(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn single_attempt_policy_never_sleeps() {
        let upstream = ScriptedUpstream::new(vec![response(429, "slow down")]);
        let policy = RetryConfig {
            max_attempts: 1,
            ..RetryConfig::default()
        };

        let report = RetryExecutor::new(upstream, policy).execute(&request()).await;

        assert!(report.delays.is_empty());
        assert!(matches!(
            report.terminal,
            Terminal::ExhaustedRetries(LastKnown::Response(ref resp))
                if resp.status == StatusCode::TOO_MANY_REQUESTS
        ));
    }

    #[test]
    fn classify_respects_configured_set() {
        let policy = RetryConfig {
            retryable_statuses: vec![418],
            ..RetryConfig::default()
        };
        assert!(matches!(
            classify(response(418, "teapot"), &policy),
            AttemptOutcome::RetryableFailure(_)
        ));
        assert!(matches!(
            classify(response(503, "down"), &policy),
            AttemptOutcome::Success(_)
        ));
    }
}
