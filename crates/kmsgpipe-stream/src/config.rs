//! Configuration for async pipe behavior.

use std::time::Duration;

/// Configuration for async pipe behavior.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Poll interval for the hybrid wait strategy.
    ///
    /// Waiters are woken by `Notify` when another `AsyncPipe` call frees
    /// space or delivers data. Threads using the inner blocking `Pipe`
    /// directly do not signal the `Notify`, so waiters also retry at this
    /// interval.
    ///
    /// Default: 10ms
    pub poll_interval: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
        }
    }
}

impl StreamConfig {
    /// Shorter poll interval for pipes shared with blocking threads.
    pub fn low_latency() -> Self {
        Self {
            poll_interval: Duration::from_millis(1),
        }
    }

    /// Sets the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}
