//! Error types for coordinator setup.
//!
//! Steady-state anomalies (a sync that never completes, a rejected timer,
//! a panicking observer) are absorbed and logged. Only construction-time
//! problems are returned through these types.

use thiserror::Error;
use viewstate_core::ViewError;

/// Result type for coordinator operations.
pub type CoordinatorResult<T> = std::result::Result<T, CoordinatorError>;

/// Errors that can occur while configuring or activating a coordinator.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration could not be parsed.
    #[error("Configuration parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// IO error, e.g. reading a config file or spawning the notifier thread.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid topology view.
    #[error("View error: {0}")]
    View(#[from] ViewError),
}

/// Errors reported by a [`crate::Scheduler`] when a delayed task cannot be
/// scheduled.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// The scheduler refused the task.
    #[error("Task rejected: {0}")]
    Rejected(String),

    /// The scheduler has been shut down.
    #[error("Scheduler is shut down")]
    Shutdown,
}
