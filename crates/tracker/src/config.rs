use std::time::Duration;

const DEFAULT_POLL_INTERVAL_MS: u64 = 3_000;
const DEFAULT_MAX_BACKOFF_MS: u64 = 30_000;
const DEFAULT_MAX_CONSECUTIVE_ERRORS: u32 = 10;
const DEFAULT_MAX_TRACKING_SECS: u64 = 24 * 60 * 60;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Tunable parameters of a polling session.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Delay between successful polls, and the backoff step on errors.
    pub poll_interval: Duration,
    /// Upper bound on the delay after a failed poll.
    pub max_backoff: Duration,
    /// Consecutive failed polls after which the session gives up.
    pub max_consecutive_errors: u32,
    /// Absolute ceiling on how long a single job is tracked.
    pub max_tracking_duration: Duration,
    /// Bound on each status query and refund call.
    pub request_timeout: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            max_backoff: Duration::from_millis(DEFAULT_MAX_BACKOFF_MS),
            max_consecutive_errors: DEFAULT_MAX_CONSECUTIVE_ERRORS,
            max_tracking_duration: Duration::from_secs(DEFAULT_MAX_TRACKING_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl TrackerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default  |
    /// |--------------------------|----------|
    /// | `POLL_INTERVAL_MS`       | `3000`   |
    /// | `MAX_BACKOFF_MS`         | `30000`  |
    /// | `MAX_CONSECUTIVE_ERRORS` | `10`     |
    /// | `MAX_TRACKING_SECS`      | `86400`  |
    /// | `REQUEST_TIMEOUT_SECS`   | `30`     |
    ///
    /// Unparseable or zero values fall back to their defaults.
    pub fn from_env() -> Self {
        Self {
            poll_interval: Duration::from_millis(env_u64("POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS)),
            max_backoff: Duration::from_millis(env_u64("MAX_BACKOFF_MS", DEFAULT_MAX_BACKOFF_MS)),
            max_consecutive_errors: env_u64(
                "MAX_CONSECUTIVE_ERRORS",
                u64::from(DEFAULT_MAX_CONSECUTIVE_ERRORS),
            )
            .try_into()
            .unwrap_or(DEFAULT_MAX_CONSECUTIVE_ERRORS),
            max_tracking_duration: Duration::from_secs(env_u64(
                "MAX_TRACKING_SECS",
                DEFAULT_MAX_TRACKING_SECS,
            )),
            request_timeout: Duration::from_secs(env_u64(
                "REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )),
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = TrackerConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(3));
        assert_eq!(config.max_backoff, Duration::from_secs(30));
        assert_eq!(config.max_consecutive_errors, 10);
        assert_eq!(config.max_tracking_duration, Duration::from_secs(86_400));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }
}
