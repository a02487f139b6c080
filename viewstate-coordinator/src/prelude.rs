//! Prelude for convenient imports.

// Coordinator
pub use crate::config::CoordinatorConfig;
pub use crate::coordinator::{CoordinatorPhase, ViewStateCoordinator};
pub use crate::error::{CoordinatorError, CoordinatorResult, SchedulerError};

// Observers
pub use crate::observer::{FnObserver, ObserverId, TopologyObserver};

// External seams and adapters
pub use crate::debounce::TopologySource;
pub use crate::scheduler::{ScheduledTask, Scheduler, TokioScheduler};
pub use crate::sync::{ClusterSyncService, ImmediateSync, SyncCallback};
