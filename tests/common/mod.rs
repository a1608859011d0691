//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use gemini_proxy::config::Credential;
use gemini_proxy::{HttpServer, ProxyConfig, Shutdown};
use tokio::net::TcpListener;

pub const TEST_KEY: &str = "test-secret-key-123";

/// What the mock upstream saw for one call.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Canned reply from the mock upstream.
pub struct Reply {
    pub status: u16,
    pub headers: Vec<(&'static str, String)>,
    pub body: String,
    pub delay: Duration,
}

impl Reply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

type BoxReply = Pin<Box<dyn Future<Output = Reply> + Send>>;
type Handler = Arc<dyn Fn(usize, Recorded) -> BoxReply + Send + Sync>;

#[derive(Clone)]
struct BackendState {
    handler: Handler,
    calls: Arc<Mutex<Vec<Recorded>>>,
}

/// Handle on a running mock upstream.
#[derive(Clone)]
pub struct MockBackend {
    pub addr: SocketAddr,
    calls: Arc<Mutex<Vec<Recorded>>>,
}

impl MockBackend {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn calls(&self) -> Vec<Recorded> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

/// Start a programmable mock upstream. `f` receives the 0-based call index.
pub async fn start_programmable_backend<F, Fut>(f: F) -> MockBackend
where
    F: Fn(usize, Recorded) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Reply> + Send + 'static,
{
    let handler: Handler =
        Arc::new(move |n: usize, recorded: Recorded| -> BoxReply { Box::pin(f(n, recorded)) });
    let calls = Arc::new(Mutex::new(Vec::new()));
    let state = BackendState {
        handler,
        calls: calls.clone(),
    };

    let app = Router::new().fallback(backend_handler).with_state(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockBackend { addr, calls }
}

/// Mock upstream that answers every call with the same status and body.
pub async fn start_mock_backend(status: u16, body: &'static str) -> MockBackend {
    start_programmable_backend(move |_, _| async move { Reply::new(status, body) }).await
}

async fn backend_handler(
    State(state): State<BackendState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let recorded = Recorded {
        method,
        uri,
        headers,
        body,
    };
    let index = {
        let mut calls = state.calls.lock().unwrap();
        calls.push(recorded.clone());
        calls.len() - 1
    };

    let reply = (state.handler)(index, recorded).await;
    if !reply.delay.is_zero() {
        tokio::time::sleep(reply.delay).await;
    }

    let mut response = (
        StatusCode::from_u16(reply.status).unwrap(),
        reply.body,
    )
        .into_response();
    for (name, value) in reply.headers {
        response
            .headers_mut()
            .insert(name, value.parse().unwrap());
    }
    response
}

/// Config pointing at `base_url` with fast retries.
pub fn proxy_config(base_url: &str) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.upstream.base_url = base_url.to_string();
    config.upstream.api_key = Some(Credential::new(TEST_KEY));
    config.upstream.use_system_proxy = false;
    config.retries.initial_delay_ms = 10;
    config.retries.max_delay_ms = 100;
    config
}

/// Start the proxy on an ephemeral port.
pub async fn start_proxy(config: ProxyConfig) -> (SocketAddr, Shutdown) {
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    (addr, shutdown)
}

/// Client that neither follows redirects nor uses a system proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}
