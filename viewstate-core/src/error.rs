//! Error types for the topology view model.
//!
//! Every variant carries the identifiers needed to locate the offending
//! instance or cluster. Codes are stable and can be grepped in logs.

use crate::ids::{ClusterId, InstanceId};
use thiserror::Error;

/// Result type for view model operations.
pub type Result<T> = std::result::Result<T, ViewError>;

/// Errors raised while building or comparing topology views.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ViewError {
    /// The same instance ID appears more than once.
    #[error("V001: Duplicate instance {instance_id} in view")]
    DuplicateInstance {
        /// The repeated instance ID.
        instance_id: InstanceId,
    },

    /// No instance is flagged as local.
    #[error("V002: View has no local instance")]
    MissingLocalInstance,

    /// More than one instance is flagged as local.
    #[error("V003: View has more than one local instance: {first} and {second}")]
    MultipleLocalInstances {
        /// The first local instance encountered.
        first: InstanceId,
        /// The second local instance encountered.
        second: InstanceId,
    },

    /// More than one instance is flagged as leader inside one cluster.
    #[error("V004: Cluster {cluster_id} has more than one leader: {first} and {second}")]
    MultipleLeaders {
        /// The cluster with conflicting leaders.
        cluster_id: ClusterId,
        /// The first leader encountered.
        first: InstanceId,
        /// The second leader encountered.
        second: InstanceId,
    },

    /// An edit referred to an instance the builder does not contain.
    #[error("V005: Instance {instance_id} not found in view")]
    UnknownInstance {
        /// The missing instance ID.
        instance_id: InstanceId,
    },
}
