//! Adaptive poll interval
//!
//! Doubles on every throttled status call up to a cap, and snaps back to the
//! base interval on the first call that gets through.

use std::time::Duration;

use crate::config::RunnerConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollTimer {
    base: Duration,
    max: Duration,
    current: Duration,
}

impl PollTimer {
    /// Creates a timer starting at `base`; `max` is raised to `base` if smaller
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            current: base,
        }
    }

    pub fn from_config(config: &RunnerConfig) -> Self {
        Self::new(config.poll_interval, config.max_poll_interval)
    }

    /// Interval to wait before the next status call
    pub fn duration(&self) -> Duration {
        self.current
    }

    /// Backs off after a throttled call
    pub fn increase(&mut self) {
        let doubled = self
            .current
            .saturating_mul(2)
            .max(self.current.saturating_add(Duration::from_millis(1)));
        self.current = doubled.min(self.max);
    }

    /// Returns to the base interval after a successful call
    pub fn reset(&mut self) {
        self.current = self.base;
    }
}

impl Default for PollTimer {
    fn default() -> Self {
        Self::from_config(&RunnerConfig::default())
    }
}
