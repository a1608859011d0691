//! Exponential backoff with optional jitter.

use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;

/// Delay to wait after failed attempt number `attempt` (1-based).
///
/// `initial * multiplier^(attempt - 1)`, capped at `max_delay_ms`. With the
/// defaults this is 2s after the first attempt and 4s after the second.
pub fn calculate_backoff(attempt: u32, policy: &RetryConfig) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let factor = u64::from(policy.multiplier.max(1)).saturating_pow(attempt - 1);
    let delay_ms = policy.initial_delay_ms.saturating_mul(factor);
    let capped_delay = delay_ms.min(policy.max_delay_ms);

    let jitter_range = (capped_delay as f64 * policy.jitter_ratio.clamp(0.0, 1.0)) as u64;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay.saturating_add(jitter).min(policy.max_delay_ms))
}
