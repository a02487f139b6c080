//! Coordinator configuration.

use crate::error::{CoordinatorError, CoordinatorResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration for a [`crate::ViewStateCoordinator`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Name of the event delivery thread.
    pub notifier_thread_name: String,

    /// Deliver already queued events when the coordinator is deactivated.
    /// When false, queued events are discarded.
    pub drain_on_shutdown: bool,

    /// Poll granularity of `wait_for_async_events` while a debounce timer
    /// is armed, in milliseconds.
    pub wait_poll_interval_ms: u64,

    /// Minimum quiet period between CHANGING and the following announcement,
    /// in seconds. Zero disables debouncing.
    pub min_event_delay_secs: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            notifier_thread_name: "viewstate-notifier".to_string(),
            drain_on_shutdown: true,
            wait_poll_interval_ms: 50,
            min_event_delay_secs: 0,
        }
    }
}

impl CoordinatorConfig {
    /// Create a new configuration builder.
    pub fn builder() -> CoordinatorConfigBuilder {
        CoordinatorConfigBuilder::default()
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> CoordinatorResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate().map_err(CoordinatorError::Config)?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> CoordinatorResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Get the wait poll interval as a Duration.
    pub fn wait_poll_interval(&self) -> Duration {
        Duration::from_millis(self.wait_poll_interval_ms)
    }

    /// Get the debounce delay as a Duration, if debouncing is enabled.
    pub fn min_event_delay(&self) -> Option<Duration> {
        (self.min_event_delay_secs > 0).then(|| Duration::from_secs(self.min_event_delay_secs))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.notifier_thread_name.trim().is_empty() {
            return Err("notifier_thread_name is required".to_string());
        }

        if self.wait_poll_interval_ms == 0 {
            return Err("wait_poll_interval_ms must be > 0".to_string());
        }

        Ok(())
    }
}

/// Builder for CoordinatorConfig.
#[derive(Debug, Default)]
pub struct CoordinatorConfigBuilder {
    config: CoordinatorConfig,
}

impl CoordinatorConfigBuilder {
    /// Set the notifier thread name.
    pub fn notifier_thread_name(mut self, name: impl Into<String>) -> Self {
        self.config.notifier_thread_name = name.into();
        self
    }

    /// Deliver (true) or discard (false) queued events on deactivation.
    pub fn drain_on_shutdown(mut self, drain: bool) -> Self {
        self.config.drain_on_shutdown = drain;
        self
    }

    /// Set the wait poll interval in milliseconds.
    pub fn wait_poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.wait_poll_interval_ms = ms;
        self
    }

    /// Set the minimum event delay in seconds.
    pub fn min_event_delay_secs(mut self, secs: u64) -> Self {
        self.config.min_event_delay_secs = secs;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> CoordinatorResult<CoordinatorConfig> {
        self.config.validate().map_err(CoordinatorError::Config)?;
        Ok(self.config)
    }
}
