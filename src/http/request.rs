//! Inbound request handling.
//!
//! # Responsibilities
//! - Generate a request ID (UUID v4) when the client sent none
//! - Strip hop-by-hop and framing headers before forwarding
//! - Force identity encoding toward the upstream
//!
//! # Design Decisions
//! - The proxy never decompresses, so the upstream must never compress
//! - `HeaderMap` names are case-insensitive; repeated names collapse to the
//!   last value seen

use axum::http::{
    header::{ACCEPT_ENCODING, CONNECTION, CONTENT_LENGTH, HOST, TRANSFER_ENCODING},
    HeaderMap, HeaderName, HeaderValue, Method, Request,
};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Request headers never forwarded upstream.
pub const EXCLUDED_REQUEST_HEADERS: [HeaderName; 5] = [
    HOST,
    CONTENT_LENGTH,
    ACCEPT_ENCODING,
    TRANSFER_ENCODING,
    CONNECTION,
];

/// Generates UUID v4 request IDs for `SetRequestIdLayer`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Request ID set by the middleware stack, or `"unknown"`.
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

/// Build upstream headers from the inbound ones.
pub fn normalize_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(inbound.len() + 1);
    for (name, value) in inbound {
        if EXCLUDED_REQUEST_HEADERS.contains(name) {
            continue;
        }
        headers.insert(name.clone(), value.clone());
    }
    headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));
    headers
}

/// Diagnostic record for a received request.
pub fn log_inbound(method: &Method, path: &str, headers: &HeaderMap) {
    let content_length = headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");
    tracing::info!(
        method = %method,
        path = %path,
        content_length = %content_length,
        "Request received"
    );
    tracing::debug!(header_count = headers.len(), "Inbound headers");
}
