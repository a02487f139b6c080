//! Cluster topology view-state coordination.
//!
//! This crate decides when a change in cluster membership is stable enough
//! to announce, and delivers the resulting topology events to observers.
//!
//! # Architecture
//!
//! ```text
//!  topology source ──► ViewStateCoordinator ──► [DebounceGate] ──► ClusterSyncService
//!                              │                                         │
//!                              │◄──────────────── callback ──────────────┘
//!                              ▼
//!                        AsyncNotifier ──► observers (INIT, CHANGING, CHANGED,
//!                                                     PROPERTIES_CHANGED)
//! ```
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use viewstate_coordinator::prelude::*;
//! use viewstate_core::{Instance, View};
//!
//! let coordinator = ViewStateCoordinator::with_config(
//!     CoordinatorConfig::builder().notifier_thread_name("topology-events").build()?,
//!     Arc::new(ImmediateSync),
//! )?;
//! coordinator.handle_activated()?;
//! coordinator.bind(FnObserver::shared(|event| println!("{event}")));
//!
//! coordinator.handle_new_view(
//!     View::builder()
//!         .sync_token("t1")
//!         .instance(Instance::new("node-a", "cluster-1").with_local(true))
//!         .build()?,
//! );
//! assert_eq!(coordinator.phase(), CoordinatorPhase::ActiveStable);
//! assert_eq!(coordinator.wait_for_async_events(Duration::from_secs(1)), 0);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod coordinator;
pub mod debounce;
pub mod error;
pub mod logging;
pub mod notifier;
pub mod observer;
pub mod prelude;
pub mod scheduler;
pub mod sync;

pub use config::{CoordinatorConfig, CoordinatorConfigBuilder};
pub use coordinator::{CoordinatorPhase, ViewStateCoordinator};
pub use debounce::{DebounceGate, TopologySource};
pub use error::{CoordinatorError, CoordinatorResult, SchedulerError};
pub use logging::{LogFormat, TracingConfig, init_tracing};
pub use notifier::AsyncNotifier;
pub use observer::{FnObserver, ObserverId, TopologyObserver};
pub use scheduler::{DelayedTask, ScheduledTask, Scheduler, TokioScheduler};
pub use sync::{ClusterSyncService, ImmediateSync, SyncCallback};
