use std::time::Duration;

/// Dispatch router settings.
///
/// Controls handler concurrency and how long `drain()` waits for in-flight
/// handlers.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Maximum number of concurrent handlers before load shedding.
    pub max_concurrent_handlers: u32,
    /// Upper bound on how long `drain()` waits for in-flight handlers.
    pub drain_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_handlers: 1000,
            drain_timeout: Duration::from_secs(30),
        }
    }
}
