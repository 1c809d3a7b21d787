use std::time::Duration;

/// Timing and crash-recovery knobs shared by every tile supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorSettings {
    pub poll_interval: Duration,
    pub startup_grace: Duration,
    pub shutdown_grace: Duration,
    /// Crashes tolerated in a row before the tile stays `Crashed`.
    pub max_auto_restarts: u32,
    /// Running this long clears the consecutive crash count.
    pub crash_reset_after: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl SupervisorSettings {
    /// Delay before the automatic restart that follows crash number `crashes`.
    pub fn backoff(&self, crashes: u32) -> Duration {
        let exponent = crashes.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            startup_grace: Duration::from_secs(10),
            shutdown_grace: Duration::from_secs(30),
            max_auto_restarts: 5,
            crash_reset_after: Duration::from_secs(300),
            initial_backoff: Duration::from_secs(5),
            max_backoff: Duration::from_secs(120),
        }
    }
}
