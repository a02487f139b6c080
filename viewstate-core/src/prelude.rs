//! Prelude for convenient imports.
//!
//! ```
//! use viewstate_core::prelude::*;
//! ```

// Identifiers
pub use crate::ids::{ClusterId, InstanceId};

// Error handling
pub use crate::error::{Result, ViewError};

// View model
pub use crate::instance::{Cluster, Instance};
pub use crate::view::{View, ViewBuilder, ViewDelta};

// Events and diffs
pub use crate::diff::{InstanceCollection, InstancesDiff};
pub use crate::event::{EventKind, TopologyEvent};
