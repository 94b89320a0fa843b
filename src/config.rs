//! Configuration types.

use std::time::Duration;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct OnboardConfig {
    /// Completeness score at which a session may complete (0-100).
    pub completion_threshold: u8,
    /// Timeout for a single conversation-turn inference round-trip.
    pub turn_timeout: Duration,
    /// Timeout for a single orchestration node execution.
    pub node_timeout: Duration,
    /// Extra attempts after the first failure of an orchestration node.
    pub node_retries: u32,
    /// Backoff schedule between node retries.
    pub retry_backoff: Vec<Duration>,
    /// Sessions with no turns for this long transition to Abandoned.
    pub idle_window: Duration,
    /// Terminal sessions are evicted after this retention window.
    pub retention_window: Duration,
}

impl Default for OnboardConfig {
    fn default() -> Self {
        Self {
            completion_threshold: 90,
            turn_timeout: Duration::from_secs(30),
            node_timeout: Duration::from_secs(60),
            node_retries: 2,
            retry_backoff: vec![Duration::from_secs(1), Duration::from_secs(3)],
            idle_window: Duration::from_secs(30 * 60),
            retention_window: Duration::from_secs(15 * 60),
        }
    }
}

impl OnboardConfig {
    /// Build a config from environment variables, falling back to defaults.
    ///
    /// Recognized: `ONBOARD_COMPLETION_THRESHOLD`, `ONBOARD_TURN_TIMEOUT_SECS`,
    /// `ONBOARD_NODE_TIMEOUT_SECS`, `ONBOARD_IDLE_WINDOW_SECS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(v) = env_parse::<u8>("ONBOARD_COMPLETION_THRESHOLD") {
            config.completion_threshold = v.min(100);
        }
        if let Some(v) = env_parse::<u64>("ONBOARD_TURN_TIMEOUT_SECS") {
            config.turn_timeout = Duration::from_secs(v);
        }
        if let Some(v) = env_parse::<u64>("ONBOARD_NODE_TIMEOUT_SECS") {
            config.node_timeout = Duration::from_secs(v);
        }
        if let Some(v) = env_parse::<u64>("ONBOARD_IDLE_WINDOW_SECS") {
            config.idle_window = Duration::from_secs(v);
        }
        config
    }

    /// Backoff before retry attempt `n` (0-based). Falls back to the last
    /// entry when the schedule is shorter than the retry count.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.retry_backoff
            .get(attempt as usize)
            .or_else(|| self.retry_backoff.last())
            .copied()
            .unwrap_or(Duration::from_secs(1))
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = OnboardConfig::default();
        assert_eq!(config.completion_threshold, 90);
        assert_eq!(config.turn_timeout, Duration::from_secs(30));
        assert_eq!(config.node_timeout, Duration::from_secs(60));
        assert_eq!(config.node_retries, 2);
        assert_eq!(config.idle_window, Duration::from_secs(1800));
    }

    #[test]
    fn backoff_schedule() {
        let config = OnboardConfig::default();
        assert_eq!(config.backoff_for(0), Duration::from_secs(1));
        assert_eq!(config.backoff_for(1), Duration::from_secs(3));
        // Past the schedule end, the last entry repeats
        assert_eq!(config.backoff_for(5), Duration::from_secs(3));
    }
}
