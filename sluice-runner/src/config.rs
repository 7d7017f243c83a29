//! Runner configuration
//!
//! Tuning knobs for supervision: poll interval bounds, cleanup and cancel
//! timeouts, and optional endpoint overrides for local emulators.

use std::time::Duration;

use anyhow::Result;

/// Runner configuration
///
/// Intervals and timeouts are configurable to allow tuning for different
/// deployment scenarios (busy shared accounts vs quiet dev accounts).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Initial poll interval, restored after every successful status call
    pub poll_interval: Duration,

    /// Upper bound for the poll interval while the control plane throttles
    pub max_poll_interval: Duration,

    /// Bound on workspace destruction after a run
    pub cleanup_timeout: Duration,

    /// Bound on the best-effort remote cancel
    pub cancel_timeout: Duration,

    /// Control-plane endpoint override (e.g., "http://localhost:4566")
    pub control_plane_endpoint: Option<String>,

    /// Object-store endpoint override
    pub object_store_endpoint: Option<String>,
}

impl RunnerConfig {
    /// Creates a new configuration with defaults
    pub fn new() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            max_poll_interval: Duration::from_secs(60),
            cleanup_timeout: Duration::from_secs(120),
            cancel_timeout: Duration::from_secs(30),
            control_plane_endpoint: None,
            object_store_endpoint: None,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables (all optional):
    /// - SLUICE_POLL_INTERVAL_MS (default: 2000)
    /// - SLUICE_POLL_MAX_INTERVAL_MS (default: 60000)
    /// - SLUICE_CLEANUP_TIMEOUT (seconds, default: 120)
    /// - SLUICE_CANCEL_TIMEOUT (seconds, default: 30)
    /// - SLUICE_CONTROL_PLANE_ENDPOINT
    /// - SLUICE_OBJECT_STORE_ENDPOINT
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`RunnerConfig::from_env`] but reading from `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::new();

        let number = |name: &str| -> Result<Option<u64>> {
            match lookup(name).map(|raw| raw.trim().to_string()) {
                Some(raw) if !raw.is_empty() => raw
                    .parse::<u64>()
                    .map(Some)
                    .map_err(|e| anyhow::anyhow!("{} must be a whole number: {}", name, e)),
                _ => Ok(None),
            }
        };
        let endpoint = |name: &str| {
            lookup(name)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };

        Ok(Self {
            poll_interval: number("SLUICE_POLL_INTERVAL_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            max_poll_interval: number("SLUICE_POLL_MAX_INTERVAL_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.max_poll_interval),
            cleanup_timeout: number("SLUICE_CLEANUP_TIMEOUT")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.cleanup_timeout),
            cancel_timeout: number("SLUICE_CANCEL_TIMEOUT")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.cancel_timeout),
            control_plane_endpoint: endpoint("SLUICE_CONTROL_PLANE_ENDPOINT"),
            object_store_endpoint: endpoint("SLUICE_OBJECT_STORE_ENDPOINT"),
        })
    }

    /// Overrides the poll interval bounds
    pub fn with_poll_interval(mut self, base: Duration, max: Duration) -> Self {
        self.poll_interval = base;
        self.max_poll_interval = max;
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            anyhow::bail!("poll_interval must be greater than 0");
        }

        if self.max_poll_interval < self.poll_interval {
            anyhow::bail!("max_poll_interval must not be smaller than poll_interval");
        }

        if self.cleanup_timeout.is_zero() {
            anyhow::bail!("cleanup_timeout must be greater than 0");
        }

        if self.cancel_timeout.is_zero() {
            anyhow::bail!("cancel_timeout must be greater than 0");
        }

        for endpoint in [&self.control_plane_endpoint, &self.object_store_endpoint]
            .into_iter()
            .flatten()
        {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                anyhow::bail!("endpoint {} must start with http:// or https://", endpoint);
            }
        }

        Ok(())
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::new()
    }
}
