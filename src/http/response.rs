//! Response reconstruction.
//!
//! # Responsibilities
//! - Turn the retry executor's terminal state into the client response
//! - Drop framing headers that describe the upstream's wire encoding
//! - Map aborted and exhausted-without-response states to 500
//!
//! # Design Decisions
//! - Bodies are fully buffered; hyper recomputes the length on the way out
//! - Status and body pass through verbatim

use axum::{
    body::{Body, Bytes},
    http::{
        header::{CONTENT_ENCODING, CONTENT_LENGTH, TRANSFER_ENCODING},
        HeaderMap, HeaderName, HeaderValue, StatusCode,
    },
    response::Response,
};

use crate::config::Credential;
use crate::resilience::retries::{LastKnown, Terminal};
use crate::upstream::UpstreamResponse;

/// Response headers never forwarded to the client.
pub const EXCLUDED_RESPONSE_HEADERS: [HeaderName; 3] =
    [CONTENT_ENCODING, CONTENT_LENGTH, TRANSFER_ENCODING];

/// Copy upstream headers minus the excluded set. Repeated headers
/// (e.g. `set-cookie`) are kept; values echoing the credential are masked.
pub fn strip_framing_headers(upstream: &HeaderMap, credential: &Credential) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(upstream.len());
    for (name, value) in upstream {
        if EXCLUDED_RESPONSE_HEADERS.contains(name) {
            continue;
        }
        headers.append(name.clone(), mask_value(value, credential));
    }
    headers
}

fn mask_value(value: &HeaderValue, credential: &Credential) -> HeaderValue {
    match value.to_str() {
        Ok(text) => {
            let masked = credential.redact(text);
            if masked == text {
                value.clone()
            } else {
                HeaderValue::from_str(&masked).unwrap_or_else(|_| value.clone())
            }
        }
        Err(_) => value.clone(),
    }
}

/// Build the outbound response from a terminal retry state.
pub fn reconstruct(terminal: Terminal, credential: &Credential) -> Response {
    match terminal {
        Terminal::Succeeded(upstream)
        | Terminal::ExhaustedRetries(LastKnown::Response(upstream)) => {
            from_upstream(upstream, credential)
        }
        Terminal::ExhaustedRetries(LastKnown::Failure(description))
        | Terminal::FatalAbort(description) => failure(&credential.redact(&description)),
    }
}

fn from_upstream(upstream: UpstreamResponse, credential: &Credential) -> Response {
    let mut response = Response::new(Body::from(upstream.body));
    *response.status_mut() = upstream.status;
    *response.headers_mut() = strip_framing_headers(&upstream.headers, credential);
    response
}

fn failure(description: &str) -> Response {
    let mut response = Response::new(Body::from(Bytes::from(description.to_string())));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}
