//! Instances and the clusters that group them.

use crate::ids::{ClusterId, InstanceId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Description of one instance as seen in a topology view.
///
/// The cluster back-reference is kept as a [`ClusterId`] rather than a
/// pointer; resolve it through [`crate::View::cluster`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    /// Unique identifier of the instance.
    id: InstanceId,
    /// Cluster this instance belongs to.
    cluster_id: ClusterId,
    /// Whether this instance is its cluster's leader.
    leader: bool,
    /// Whether this is the instance the view was produced on.
    local: bool,
    /// Free-form instance properties.
    properties: BTreeMap<String, String>,
}

impl Instance {
    /// Create a non-leader, non-local instance without properties.
    pub fn new(id: impl Into<InstanceId>, cluster_id: impl Into<ClusterId>) -> Self {
        Self {
            id: id.into(),
            cluster_id: cluster_id.into(),
            leader: false,
            local: false,
            properties: BTreeMap::new(),
        }
    }

    /// Set the leader flag.
    pub fn with_leader(mut self, leader: bool) -> Self {
        self.leader = leader;
        self
    }

    /// Set the local flag.
    pub fn with_local(mut self, local: bool) -> Self {
        self.local = local;
        self
    }

    /// Add or replace a property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Replace all properties.
    pub fn with_properties(mut self, properties: BTreeMap<String, String>) -> Self {
        self.properties = properties;
        self
    }

    pub(crate) fn set_property(&mut self, key: String, value: String) {
        self.properties.insert(key, value);
    }

    pub(crate) fn remove_property(&mut self, key: &str) -> Option<String> {
        self.properties.remove(key)
    }

    /// Instance identifier.
    pub fn id(&self) -> &InstanceId {
        &self.id
    }

    /// Identifier of the owning cluster.
    pub fn cluster_id(&self) -> &ClusterId {
        &self.cluster_id
    }

    /// Whether this instance leads its cluster.
    pub fn is_leader(&self) -> bool {
        self.leader
    }

    /// Whether this is the local instance.
    pub fn is_local(&self) -> bool {
        self.local
    }

    /// Property value by key.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// All properties, ordered by key.
    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// True when id, cluster, leader and local flags match `other`.
    ///
    /// Properties are ignored.
    pub fn same_membership(&self, other: &Instance) -> bool {
        self.id == other.id
            && self.cluster_id == other.cluster_id
            && self.leader == other.leader
            && self.local == other.local
    }
}

/// A cluster and its instances, ordered by instance ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    id: ClusterId,
    instances: Vec<Instance>,
}

impl Cluster {
    pub(crate) fn new(id: ClusterId, mut instances: Vec<Instance>) -> Self {
        instances.sort_by(|a, b| a.id.cmp(&b.id));
        Self { id, instances }
    }

    /// Cluster identifier.
    pub fn id(&self) -> &ClusterId {
        &self.id
    }

    /// Instances of this cluster, ordered by ID.
    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    /// The cluster's leader, if one is flagged.
    pub fn leader(&self) -> Option<&Instance> {
        self.instances.iter().find(|i| i.leader)
    }

    /// Look up an instance of this cluster.
    pub fn instance(&self, id: &InstanceId) -> Option<&Instance> {
        self.instances
            .binary_search_by(|i| i.id.cmp(id))
            .ok()
            .map(|idx| &self.instances[idx])
    }
}
