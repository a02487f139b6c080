//! Viewstate Core Library
//!
//! Topology view model shared by the view-state coordinator and its
//! collaborators.
//!
//! # Key Components
//!
//! - **View**: immutable snapshot of cluster membership and instance properties
//! - **TopologyEvent**: INIT, CHANGING, CHANGED and PROPERTIES_CHANGED notifications
//! - **InstancesDiff**: added/removed/retained partitions between two views
//!
//! # Example
//!
//! ```
//! use viewstate_core::prelude::*;
//!
//! let view = View::builder()
//!     .sync_token("t1")
//!     .instance(Instance::new("node-a", "cluster-1").with_local(true).with_leader(true))
//!     .instance(Instance::new("node-b", "cluster-1"))
//!     .build()?;
//!
//! let updated = view
//!     .to_builder()
//!     .set_property(&InstanceId::new("node-b"), "role", "worker")?
//!     .build()?;
//!
//! assert_eq!(view.compare(&updated), ViewDelta::PropertiesChanged);
//! # Ok::<(), ViewError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod diff;
pub mod error;
pub mod event;
pub mod ids;
pub mod instance;
pub mod prelude;
pub mod view;

pub use diff::{InstanceCollection, InstancesDiff};
pub use error::{Result, ViewError};
pub use event::{EventKind, TopologyEvent};
pub use ids::{ClusterId, InstanceId};
pub use instance::{Cluster, Instance};
pub use view::{View, ViewBuilder, ViewDelta};
