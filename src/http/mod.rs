//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace span, body limit)
//!     → request.rs (strip hop-by-hop headers, force identity encoding)
//!     → upstream::target (compose URL with credential)
//!     → resilience::retries (attempt loop)
//!     → response.rs (strip framing headers, map failures)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{UuidRequestId, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
