use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Retry schedule applied while connecting to a backend endpoint.
///
/// Each failed attempt doubles the delay before the next one, capped at
/// [`RetryPolicy::max_delay`]. Exhausting every attempt surfaces the last
/// underlying failure to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct RetryPolicy {
    /// Maximum number of connection attempts before giving up.
    pub max_attempts: u32,
    /// Delay before the second attempt, in milliseconds.
    pub initial_delay_ms: u64,
    /// Upper bound on the delay between attempts, in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay_ms: 500,
            max_delay_ms: 8_000,
        }
    }
}

impl RetryPolicy {
    /// Delay before the second connection attempt.
    #[must_use]
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// Computes the delay following `current`, doubling up to the cap.
    #[must_use]
    pub fn next_delay(&self, current: Duration) -> Duration {
        let doubled = current.saturating_mul(2);
        doubled.min(Duration::from_millis(self.max_delay_ms))
    }
}

/// Quiet periods applied by the debounced notifiers before an outbound send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct DebounceSettings {
    /// Quiet period after a file save before notifying the backend.
    pub file_saved_ms: u64,
    /// Quiet period after an active-file change before notifying the backend.
    pub active_file_ms: u64,
}

impl Default for DebounceSettings {
    fn default() -> Self {
        Self {
            file_saved_ms: 500,
            active_file_ms: 300,
        }
    }
}

impl DebounceSettings {
    /// Quiet period for the file-saved notifier.
    #[must_use]
    pub fn file_saved(&self) -> Duration {
        Duration::from_millis(self.file_saved_ms)
    }

    /// Quiet period for the active-file notifier.
    #[must_use]
    pub fn active_file(&self) -> Duration {
        Duration::from_millis(self.active_file_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_delay_doubles_until_cap() {
        let policy = RetryPolicy::default();
        let first = policy.initial_delay();
        assert_eq!(first, Duration::from_millis(500));
        let second = policy.next_delay(first);
        assert_eq!(second, Duration::from_millis(1_000));

        let mut delay = first;
        for _ in 0..10 {
            delay = policy.next_delay(delay);
        }
        assert_eq!(delay, Duration::from_millis(8_000));
    }

    #[test]
    fn debounce_defaults_match_notifier_contracts() {
        let settings = DebounceSettings::default();
        assert_eq!(settings.file_saved(), Duration::from_millis(500));
        assert_eq!(settings.active_file(), Duration::from_millis(300));
    }
}
