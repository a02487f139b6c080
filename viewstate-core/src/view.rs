//! Immutable topology view snapshots.
//!
//! A [`View`] is produced by a topology source, handed to the coordinator by
//! value and never mutated afterwards. Cloning is cheap: the membership data
//! is shared, only the `current` flag is per-copy, which is how derived
//! "not current" copies are made.

use crate::error::{Result, ViewError};
use crate::ids::{ClusterId, InstanceId};
use crate::instance::{Cluster, Instance};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// How a newer view relates to an older one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewDelta {
    /// Structurally equal: same instances, flags, clusters and properties.
    Unchanged,
    /// Same membership, only property values differ.
    PropertiesChanged,
    /// Instances, leader/local flags or clusters differ.
    MembershipChanged,
}

#[derive(Debug)]
struct ViewData {
    sync_token: Option<String>,
    clusters: Vec<Cluster>,
    /// Position of the local instance as (cluster index, instance index).
    local: (usize, usize),
}

/// Immutable snapshot of cluster membership plus per-instance properties.
///
/// Equality is structural: two views are equal when their instance sets,
/// leader/local flags, cluster assignment and property maps are equal. The
/// sync token and the `current` flag do not take part in equality.
#[derive(Clone)]
pub struct View {
    data: Arc<ViewData>,
    current: bool,
}

impl View {
    /// Create a new view builder.
    pub fn builder() -> ViewBuilder {
        ViewBuilder::default()
    }

    /// Synchronization token of the local cluster, if the source set one.
    pub fn sync_token(&self) -> Option<&str> {
        self.data.sync_token.as_deref()
    }

    /// Whether this view is current (false while a new view is negotiated).
    pub fn is_current(&self) -> bool {
        self.current
    }

    /// A copy of this view with the `current` flag set as given.
    #[must_use]
    pub fn with_current(&self, current: bool) -> View {
        View {
            data: Arc::clone(&self.data),
            current,
        }
    }

    /// A copy of this view marked not current.
    #[must_use]
    pub fn not_current(&self) -> View {
        self.with_current(false)
    }

    /// Clusters ordered by ID.
    pub fn clusters(&self) -> &[Cluster] {
        &self.data.clusters
    }

    /// Look up a cluster by ID.
    pub fn cluster(&self, id: &ClusterId) -> Option<&Cluster> {
        self.data.clusters.iter().find(|c| c.id() == id)
    }

    /// All instances across all clusters, cluster by cluster.
    pub fn instances(&self) -> impl Iterator<Item = &Instance> {
        self.data.clusters.iter().flat_map(|c| c.instances().iter())
    }

    /// Number of instances in the view.
    pub fn len(&self) -> usize {
        self.data.clusters.iter().map(|c| c.instances().len()).sum()
    }

    /// A built view always holds the local instance, so this is never true.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up an instance by ID.
    pub fn instance(&self, id: &InstanceId) -> Option<&Instance> {
        self.data.clusters.iter().find_map(|c| c.instance(id))
    }

    /// The instance this view was produced on.
    pub fn local_instance(&self) -> &Instance {
        let (cluster, instance) = self.data.local;
        &self.data.clusters[cluster].instances()[instance]
    }

    /// The cluster containing the local instance.
    pub fn local_cluster(&self) -> &Cluster {
        &self.data.clusters[self.data.local.0]
    }

    /// Instances ordered by ID, independent of cluster grouping.
    fn sorted_instances(&self) -> Vec<&Instance> {
        let mut all: Vec<&Instance> = self.instances().collect();
        all.sort_by(|a, b| a.id().cmp(b.id()));
        all
    }

    /// True when both views hold the same instances with the same
    /// cluster, leader and local flags. Properties are ignored.
    pub fn same_membership(&self, other: &View) -> bool {
        let mine = self.sorted_instances();
        let theirs = other.sorted_instances();
        mine.len() == theirs.len()
            && mine
                .iter()
                .zip(theirs.iter())
                .all(|(a, b)| a.same_membership(b))
    }

    /// Classify how `newer` differs from this view. Sync tokens are ignored.
    pub fn compare(&self, newer: &View) -> ViewDelta {
        if self == newer {
            return ViewDelta::Unchanged;
        }
        if self.same_membership(newer) {
            ViewDelta::PropertiesChanged
        } else {
            ViewDelta::MembershipChanged
        }
    }

    /// True when `newer` has the same sync token and membership as this view
    /// but at least one property value differs.
    pub fn only_differs_in_properties(&self, newer: &View) -> bool {
        self.sync_token() == newer.sync_token()
            && self.compare(newer) == ViewDelta::PropertiesChanged
    }

    /// A builder pre-populated with this view's content.
    pub fn to_builder(&self) -> ViewBuilder {
        ViewBuilder {
            sync_token: self.data.sync_token.clone(),
            current: self.current,
            instances: self.instances().cloned().collect(),
        }
    }
}

impl PartialEq for View {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.data, &other.data) {
            return true;
        }
        let mine = self.sorted_instances();
        let theirs = other.sorted_instances();
        mine.len() == theirs.len() && mine.iter().zip(theirs.iter()).all(|(a, b)| a == b)
    }
}

impl Eq for View {}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("sync_token", &self.data.sync_token)
            .field("current", &self.current)
            .field("local", self.local_instance().id())
            .field("clusters", &self.data.clusters)
            .finish()
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "view[token={}, instances={}, current={}]",
            self.sync_token().unwrap_or("-"),
            self.len(),
            self.current
        )
    }
}

/// Builder for [`View`].
///
/// Validation happens in [`ViewBuilder::build`]: instance IDs must be
/// unique, exactly one instance must be local and each cluster may have at
/// most one leader.
#[derive(Debug, Clone)]
pub struct ViewBuilder {
    sync_token: Option<String>,
    current: bool,
    instances: Vec<Instance>,
}

impl Default for ViewBuilder {
    fn default() -> Self {
        Self {
            sync_token: None,
            current: true,
            instances: Vec::new(),
        }
    }
}

impl ViewBuilder {
    /// Set the sync token.
    pub fn sync_token(mut self, token: impl Into<String>) -> Self {
        self.sync_token = Some(token.into());
        self
    }

    /// Clear the sync token.
    pub fn without_sync_token(mut self) -> Self {
        self.sync_token = None;
        self
    }

    /// Set the `current` flag (defaults to true).
    pub fn current(mut self, current: bool) -> Self {
        self.current = current;
        self
    }

    /// Add an instance.
    pub fn instance(mut self, instance: Instance) -> Self {
        self.instances.push(instance);
        self
    }

    /// Remove an instance.
    pub fn remove_instance(mut self, id: &InstanceId) -> Result<Self> {
        let before = self.instances.len();
        self.instances.retain(|i| i.id() != id);
        if self.instances.len() == before {
            return Err(ViewError::UnknownInstance {
                instance_id: id.clone(),
            });
        }
        Ok(self)
    }

    /// Set a property on an instance already added to the builder.
    pub fn set_property(
        mut self,
        id: &InstanceId,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self> {
        self.instance_mut(id)?.set_property(key.into(), value.into());
        Ok(self)
    }

    /// Remove a property from an instance already added to the builder.
    pub fn remove_property(mut self, id: &InstanceId, key: &str) -> Result<Self> {
        self.instance_mut(id)?.remove_property(key);
        Ok(self)
    }

    fn instance_mut(&mut self, id: &InstanceId) -> Result<&mut Instance> {
        self.instances
            .iter_mut()
            .find(|i| i.id() == id)
            .ok_or_else(|| ViewError::UnknownInstance {
                instance_id: id.clone(),
            })
    }

    /// Validate and build the view.
    pub fn build(mut self) -> Result<View> {
        self.instances.sort_by(|a, b| a.id().cmp(b.id()));

        for pair in self.instances.windows(2) {
            if pair[0].id() == pair[1].id() {
                return Err(ViewError::DuplicateInstance {
                    instance_id: pair[0].id().clone(),
                });
            }
        }

        let mut local: Option<&InstanceId> = None;
        let mut leaders: BTreeMap<&ClusterId, &InstanceId> = BTreeMap::new();
        for instance in &self.instances {
            if instance.is_local() {
                if let Some(first) = local {
                    return Err(ViewError::MultipleLocalInstances {
                        first: first.clone(),
                        second: instance.id().clone(),
                    });
                }
                local = Some(instance.id());
            }
            if instance.is_leader() {
                if let Some(first) = leaders.insert(instance.cluster_id(), instance.id()) {
                    return Err(ViewError::MultipleLeaders {
                        cluster_id: instance.cluster_id().clone(),
                        first: first.clone(),
                        second: instance.id().clone(),
                    });
                }
            }
        }
        if local.is_none() {
            return Err(ViewError::MissingLocalInstance);
        }

        let mut grouped: BTreeMap<ClusterId, Vec<Instance>> = BTreeMap::new();
        for instance in self.instances {
            grouped
                .entry(instance.cluster_id().clone())
                .or_default()
                .push(instance);
        }
        let clusters: Vec<Cluster> = grouped
            .into_iter()
            .map(|(id, instances)| Cluster::new(id, instances))
            .collect();
        let local = clusters
            .iter()
            .enumerate()
            .find_map(|(ci, cluster)| {
                cluster
                    .instances()
                    .iter()
                    .position(Instance::is_local)
                    .map(|ii| (ci, ii))
            })
            .ok_or(ViewError::MissingLocalInstance)?;

        Ok(View {
            data: Arc::new(ViewData {
                sync_token: self.sync_token,
                clusters,
                local,
            }),
            current: self.current,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_node_view(token: &str) -> View {
        View::builder()
            .sync_token(token)
            .instance(Instance::new("a", "c1").with_leader(true).with_local(true))
            .instance(Instance::new("b", "c1"))
            .build()
            .unwrap()
    }

    #[test]
    fn build_groups_instances_by_cluster() {
        let view = View::builder()
            .instance(Instance::new("a", "c1").with_local(true))
            .instance(Instance::new("x", "c2").with_leader(true))
            .instance(Instance::new("b", "c1").with_leader(true))
            .build()
            .unwrap();

        assert_eq!(view.clusters().len(), 2);
        assert_eq!(view.len(), 3);
        assert_eq!(view.local_instance().id().as_str(), "a");
        assert_eq!(view.local_cluster().id().as_str(), "c1");
        assert_eq!(
            view.cluster(&ClusterId::new("c1"))
                .and_then(|c| c.leader())
                .map(|i| i.id().as_str()),
            Some("b")
        );
        assert!(view.is_current());
    }

    #[test]
    fn build_rejects_missing_local() {
        let err = View::builder()
            .instance(Instance::new("a", "c1"))
            .build()
            .unwrap_err();
        assert_eq!(err, ViewError::MissingLocalInstance);
    }

    #[test]
    fn build_rejects_two_locals() {
        let err = View::builder()
            .instance(Instance::new("a", "c1").with_local(true))
            .instance(Instance::new("b", "c1").with_local(true))
            .build()
            .unwrap_err();
        assert!(matches!(err, ViewError::MultipleLocalInstances { .. }));
    }

    #[test]
    fn build_rejects_duplicate_ids() {
        let err = View::builder()
            .instance(Instance::new("a", "c1").with_local(true))
            .instance(Instance::new("a", "c2"))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            ViewError::DuplicateInstance {
                instance_id: InstanceId::new("a")
            }
        );
    }

    #[test]
    fn build_rejects_two_leaders_in_one_cluster() {
        let err = View::builder()
            .instance(Instance::new("a", "c1").with_local(true).with_leader(true))
            .instance(Instance::new("b", "c1").with_leader(true))
            .build()
            .unwrap_err();
        assert!(matches!(err, ViewError::MultipleLeaders { .. }));
    }

    #[test]
    fn equality_ignores_token_and_current_flag() {
        let v1 = two_node_view("t1");
        let v2 = two_node_view("t2");
        assert_eq!(v1, v2);
        assert_eq!(v1, v1.not_current());
        assert!(!v1.not_current().is_current());
        assert!(v1.is_current());
    }

    #[test]
    fn compare_classifies_changes() {
        let v1 = two_node_view("t1");
        let same = two_node_view("t1");
        let props = v1
            .to_builder()
            .set_property(&InstanceId::new("b"), "k", "v")
            .unwrap()
            .build()
            .unwrap();
        let shrunk = v1
            .to_builder()
            .remove_instance(&InstanceId::new("b"))
            .unwrap()
            .build()
            .unwrap();
        let props_new_token = props.to_builder().sync_token("t2").build().unwrap();

        assert_eq!(v1.compare(&same), ViewDelta::Unchanged);
        assert_eq!(v1.compare(&props), ViewDelta::PropertiesChanged);
        assert!(v1.only_differs_in_properties(&props));
        assert_eq!(v1.compare(&shrunk), ViewDelta::MembershipChanged);
        assert!(!v1.only_differs_in_properties(&same));
    }

    #[test]
    fn sync_token_does_not_affect_classification() {
        let v1 = two_node_view("t1");
        let props_new_token = v1
            .to_builder()
            .set_property(&InstanceId::new("b"), "k", "v")
            .unwrap()
            .sync_token("t2")
            .build()
            .unwrap();
        let same_new_token = two_node_view("t2");

        assert_eq!(v1.compare(&props_new_token), ViewDelta::PropertiesChanged);
        assert!(!v1.only_differs_in_properties(&props_new_token));
        assert_eq!(v1.compare(&same_new_token), ViewDelta::Unchanged);
    }

    #[test]
    fn leader_flip_is_a_membership_change() {
        let v1 = two_node_view("t1");
        let flipped = View::builder()
            .sync_token("t1")
            .instance(Instance::new("a", "c1").with_local(true))
            .instance(Instance::new("b", "c1").with_leader(true))
            .build()
            .unwrap();
        assert_eq!(v1.compare(&flipped), ViewDelta::MembershipChanged);
    }

    #[test]
    fn cluster_move_is_a_membership_change() {
        let v1 = two_node_view("t1");
        let moved = View::builder()
            .sync_token("t1")
            .instance(Instance::new("a", "c1").with_leader(true).with_local(true))
            .instance(Instance::new("b", "c9"))
            .build()
            .unwrap();
        assert!(!v1.same_membership(&moved));
    }

    #[test]
    fn builder_edits_unknown_instance_fail() {
        let err = two_node_view("t1")
            .to_builder()
            .remove_instance(&InstanceId::new("zz"))
            .unwrap_err();
        assert!(matches!(err, ViewError::UnknownInstance { .. }));
    }

    #[test]
    fn display_is_short() {
        let view = two_node_view("t1");
        assert_eq!(view.to_string(), "view[token=t1, instances=2, current=true]");
    }
}
