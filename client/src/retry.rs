//! Reconnect delay schedules.
//!
//! A policy maps the number of reconnect attempts already made to the delay
//! before the next one, or to `None` once it is time to give up.

use rand::Rng;
use std::time::Duration;

pub trait RetryPolicy: Send + Sync {
    /// Delay before reconnect attempt `attempt` (zero-based), or `None` to
    /// stop retrying.
    fn next_delay(&self, attempt: u32) -> Option<Duration>;
}

/// The production schedule: one immediate retry, then fixed steps that bound
/// the total backoff well under three minutes before giving up.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepRetryPolicy;

impl RetryPolicy for StepRetryPolicy {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        let ms = match attempt {
            0 => 0,
            1..=9 => 1_000,
            10..=19 => 2_000,
            20..=29 => 5_000,
            _ => return None,
        };
        Some(Duration::from_millis(ms))
    }
}

/// Exponential backoff with jitter, capped at `max_delay`. Not used by
/// default; kept for deployments that prefer a gentler ramp against servers
/// behind slow failover.
#[derive(Debug, Clone)]
pub struct BackoffRetryPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
    pub jitter_ms: u64,
}

impl Default for BackoffRetryPolicy {
    fn default() -> Self {
        BackoffRetryPolicy {
            initial_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_millis(30_000),
            max_attempts: 30,
            jitter_ms: 100,
        }
    }
}

impl RetryPolicy for BackoffRetryPolicy {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        if attempt == 0 {
            return Some(Duration::ZERO);
        }
        let base = self.initial_delay.as_millis() as u64;
        let factor = 1u64.checked_shl(attempt - 1).unwrap_or(u64::MAX);
        let jitter = rand::thread_rng().gen_range(0..=self.jitter_ms);
        let ms = base
            .saturating_mul(factor)
            .saturating_add(jitter)
            .min(self.max_delay.as_millis() as u64);
        Some(Duration::from_millis(ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_policy_boundaries() {
        let policy = StepRetryPolicy;
        assert_eq!(policy.next_delay(0), Some(Duration::ZERO));
        assert_eq!(policy.next_delay(1), Some(Duration::from_millis(1_000)));
        assert_eq!(policy.next_delay(9), Some(Duration::from_millis(1_000)));
        assert_eq!(policy.next_delay(10), Some(Duration::from_millis(2_000)));
        assert_eq!(policy.next_delay(19), Some(Duration::from_millis(2_000)));
        assert_eq!(policy.next_delay(20), Some(Duration::from_millis(5_000)));
        assert_eq!(policy.next_delay(29), Some(Duration::from_millis(5_000)));
        assert_eq!(policy.next_delay(30), None);
        assert_eq!(policy.next_delay(1_000), None);
    }

    #[test]
    fn backoff_policy_respects_cap_and_limit() {
        let policy = BackoffRetryPolicy {
            jitter_ms: 0,
            ..BackoffRetryPolicy::default()
        };
        assert_eq!(policy.next_delay(0), Some(Duration::ZERO));
        assert_eq!(policy.next_delay(1), Some(Duration::from_millis(1_000)));
        assert_eq!(policy.next_delay(3), Some(Duration::from_millis(4_000)));
        // Deep attempts hit the cap instead of overflowing.
        assert_eq!(policy.next_delay(29), Some(Duration::from_millis(30_000)));
        assert_eq!(policy.next_delay(30), None);
    }

    #[test]
    fn backoff_jitter_stays_bounded() {
        let policy = BackoffRetryPolicy::default();
        for _ in 0..50 {
            let delay = policy.next_delay(2).unwrap();
            let ms = delay.as_millis() as u64;
            assert!((2_000..=2_100).contains(&ms), "delay {ms}ms out of range");
        }
    }
}
