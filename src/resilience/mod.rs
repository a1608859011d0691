//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to upstream:
//!     → retries.rs (attempt, classify outcome, decide)
//!     → backoff.rs (delay before the next attempt)
//!     → per-phase timeouts are enforced by upstream::client
//! ```
//!
//! # Design Decisions
//! - Retries are bounded by `max_attempts`; backoff grows exponentially
//! - Only statuses in the configured set are retried; everything else is final
//! - Transport errors retry, unexpected errors abort at once
//! - Attempts are sequential, never speculative

pub mod backoff;
pub mod retries;

pub use retries::{RetryExecutor, RetryReport, Terminal};
