//! Correlation client settings.

use std::time::Duration;

/// Default time a request waits for its reply.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone)]
pub struct CorrelationConfig {
    /// Applied when a request does not carry its own timeout.
    pub default_timeout: Duration,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl CorrelationConfig {
    #[must_use]
    pub fn default_timeout_ms(&self) -> u64 {
        u64::try_from(self.default_timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timeout_is_three_seconds() {
        let config = CorrelationConfig::default();
        assert_eq!(config.default_timeout, Duration::from_secs(3));
        assert_eq!(config.default_timeout_ms(), 3000);
    }
}
