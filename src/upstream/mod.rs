//! Upstream subsystem.
//!
//! # Data Flow
//! ```text
//! normalized request
//!     → target.rs (base + path + credential + client query)
//!     → client.rs (single attempt, buffered response or classified error)
//!     → resilience::retries decides what happens next
//! ```
//!
//! # Design Decisions
//! - Exactly one upstream host per process
//! - The credential travels only in the query string of outgoing requests
//! - `Upstream` is a trait so the retry loop can be driven without a network

pub mod client;
pub mod target;

pub use client::{
    HttpUpstream, TimeoutKind, TransportKind, Upstream, UpstreamError, UpstreamRequest,
    UpstreamResponse,
};
pub use target::UpstreamTarget;
