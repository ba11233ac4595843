//! Linear backoff between failed status polls.
//!
//! After the n-th consecutive failure the session waits
//! `poll_interval * n`, clamped to `max_backoff`: with the defaults that is
//! 3 s, 6 s, 9 s, ... up to 30 s.

use std::time::Duration;

use crate::config::TrackerConfig;

/// Delay before the next poll after `consecutive_errors` failures in a row.
///
/// Zero errors means the previous poll succeeded and the regular interval
/// applies.
pub fn retry_delay(consecutive_errors: u32, config: &TrackerConfig) -> Duration {
    config
        .poll_interval
        .saturating_mul(consecutive_errors.max(1))
        .min(config.max_backoff)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_errors_uses_poll_interval() {
        let config = TrackerConfig::default();
        assert_eq!(retry_delay(0, &config), Duration::from_secs(3));
    }

    #[test]
    fn grows_linearly() {
        let config = TrackerConfig::default();
        assert_eq!(retry_delay(1, &config), Duration::from_secs(3));
        assert_eq!(retry_delay(2, &config), Duration::from_secs(6));
        assert_eq!(retry_delay(5, &config), Duration::from_secs(15));
    }

    #[test]
    fn full_backoff_sequence() {
        let config = TrackerConfig::default();
        let expected_ms = [
            3_000, 6_000, 9_000, 12_000, 15_000, 18_000, 21_000, 24_000, 27_000, 30_000, 30_000,
        ];

        for (errors, &ms) in (1u32..).zip(expected_ms.iter()) {
            assert_eq!(retry_delay(errors, &config), Duration::from_millis(ms));
        }
    }

    #[test]
    fn clamps_at_max_even_for_huge_counts() {
        let config = TrackerConfig {
            max_backoff: Duration::from_secs(10),
            ..Default::default()
        };
        assert_eq!(retry_delay(u32::MAX, &config), Duration::from_secs(10));
    }
}
