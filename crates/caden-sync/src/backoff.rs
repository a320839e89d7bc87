//! Per-stream rate-limit backoff.
//!
//! Each stream keeps its own delay so one throttled stream never slows
//! the others down.

use std::time::Duration;

use caden_core::StreamKey;
use dashmap::DashMap;

/// Exponential backoff policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10000),
        }
    }
}

impl BackoffPolicy {
    /// Delay after `failures` consecutive rate limits: base * 2^(failures-1),
    /// capped at `max_delay`.
    ///
    /// failures=0 or 1 -> base, 2 -> 2*base, 3 -> 4*base, ...
    pub fn delay_for(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(10);
        let base = self.base_delay.as_millis() as u64;
        let delay = base.saturating_mul(1u64 << exponent);
        Duration::from_millis(delay).min(self.max_delay)
    }
}

/// Backoff state of one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffState {
    pub current_delay: Duration,
    pub consecutive_failures: u32,
}

pub struct BackoffController {
    policy: BackoffPolicy,
    states: DashMap<StreamKey, BackoffState>,
}

impl BackoffController {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            states: DashMap::new(),
        }
    }

    pub fn policy(&self) -> BackoffPolicy {
        self.policy
    }

    fn initial(&self) -> BackoffState {
        BackoffState {
            current_delay: self.policy.base_delay,
            consecutive_failures: 0,
        }
    }

    pub fn state(&self, key: &StreamKey) -> BackoffState {
        self.states.get(key).map_or_else(|| self.initial(), |s| *s)
    }

    /// Delay before the next retry of `key`.
    pub fn next_delay(&self, key: &StreamKey) -> Duration {
        self.state(key).current_delay
    }

    pub fn on_success(&self, key: &StreamKey) {
        self.states.insert(key.clone(), self.initial());
    }

    /// Record a rate limit; returns the updated state.
    pub fn on_rate_limited(&self, key: &StreamKey) -> BackoffState {
        let mut state = self
            .states
            .entry(key.clone())
            .or_insert_with(|| self.initial());
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        state.current_delay = self.policy.delay_for(state.consecutive_failures);
        *state
    }

    /// Non-rate-limit failures leave backoff untouched.
    pub fn on_other_error(&self, _key: &StreamKey) {}
}

impl Default for BackoffController {
    fn default() -> Self {
        Self::new(BackoffPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> StreamKey {
        StreamKey::new("holdings:owner")
    }

    #[test]
    fn test_delay_sequence_caps_at_ceiling() {
        let backoff = BackoffController::default();
        let delays: Vec<u64> = (0..7)
            .map(|_| backoff.on_rate_limited(&key()).current_delay.as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 10000, 10000, 10000]);
        assert_eq!(backoff.state(&key()).consecutive_failures, 7);
    }

    #[test]
    fn test_success_resets_to_base() {
        let backoff = BackoffController::default();
        for _ in 0..4 {
            backoff.on_rate_limited(&key());
        }
        assert_eq!(backoff.next_delay(&key()), Duration::from_millis(8000));

        backoff.on_success(&key());
        assert_eq!(backoff.next_delay(&key()), Duration::from_millis(1000));
        assert_eq!(backoff.state(&key()).consecutive_failures, 0);
        assert_eq!(
            backoff.on_rate_limited(&key()).current_delay,
            Duration::from_millis(1000)
        );
    }

    #[test]
    fn test_other_error_does_not_mutate() {
        let backoff = BackoffController::default();
        backoff.on_rate_limited(&key());
        backoff.on_rate_limited(&key());
        let before = backoff.state(&key());

        backoff.on_other_error(&key());
        assert_eq!(backoff.state(&key()), before);
    }

    #[test]
    fn test_streams_are_independent() {
        let backoff = BackoffController::default();
        let other = StreamKey::new("market");
        backoff.on_rate_limited(&key());
        backoff.on_rate_limited(&key());

        assert_eq!(backoff.next_delay(&key()), Duration::from_millis(2000));
        assert_eq!(backoff.next_delay(&other), Duration::from_millis(1000));
    }

    #[test]
    fn test_huge_failure_count_saturates() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_millis(10000));
        assert_eq!(policy.delay_for(0), Duration::from_millis(1000));
    }
}
