//! Instance-level differences between two views.
//!
//! [`InstancesDiff`] partitions the instances of an old and a new view into
//! added, removed and retained sets. Each partition is returned as an
//! [`InstanceCollection`] that can be narrowed with chainable filters before
//! the matching instances are collected.
//!
//! # Example
//!
//! ```
//! use viewstate_core::{Instance, InstancesDiff, View};
//!
//! let old = View::builder()
//!     .instance(Instance::new("a", "c1").with_local(true).with_leader(true))
//!     .build()
//!     .unwrap();
//! let new = old
//!     .to_builder()
//!     .instance(Instance::new("b", "c1"))
//!     .build()
//!     .unwrap();
//!
//! let diff = InstancesDiff::between(&old, &new);
//! let added: Vec<&str> = diff.added().get().iter().map(|i| i.id().as_str()).collect();
//! assert_eq!(added, vec!["b"]);
//! ```

use crate::error::{Result, ViewError};
use crate::event::TopologyEvent;
use crate::ids::{ClusterId, InstanceId};
use crate::instance::{Cluster, Instance};
use crate::view::View;
use std::collections::BTreeMap;
use std::fmt;

type InstanceMap<'a> = BTreeMap<&'a InstanceId, &'a Instance>;

/// Differences between the instances of two views.
#[derive(Debug, Clone)]
pub struct InstancesDiff<'a> {
    old: InstanceMap<'a>,
    new: InstanceMap<'a>,
}

impl<'a> InstancesDiff<'a> {
    /// Diff two views.
    pub fn between(old: &'a View, new: &'a View) -> Self {
        Self {
            old: index_unique(old.instances()),
            new: index_unique(new.instances()),
        }
    }

    /// Diff two clusters.
    pub fn between_clusters(old: &'a Cluster, new: &'a Cluster) -> Self {
        Self {
            old: index_unique(old.instances().iter()),
            new: index_unique(new.instances().iter()),
        }
    }

    /// Diff the old and new views carried by an event.
    ///
    /// A missing side is treated as an empty view, so INIT reports every
    /// instance as added and CHANGING reports every instance as removed.
    pub fn from_event(event: &'a TopologyEvent) -> Self {
        Self {
            old: event
                .old_view()
                .map(|v| index_unique(v.instances()))
                .unwrap_or_default(),
            new: event
                .new_view()
                .map(|v| index_unique(v.instances()))
                .unwrap_or_default(),
        }
    }

    /// Diff two arbitrary instance collections.
    ///
    /// Fails if either side contains the same instance ID twice.
    pub fn from_instances<O, N>(old: O, new: N) -> Result<Self>
    where
        O: IntoIterator<Item = &'a Instance>,
        N: IntoIterator<Item = &'a Instance>,
    {
        Ok(Self {
            old: index(old)?,
            new: index(new)?,
        })
    }

    /// Every instance of either side. For instances present on both sides
    /// the new description is kept when `retain_from_new` is set.
    pub fn all(&self, retain_from_new: bool) -> InstanceCollection<'a> {
        let (first, second) = if retain_from_new {
            (&self.old, &self.new)
        } else {
            (&self.new, &self.old)
        };
        let mut partition = first.clone();
        partition.extend(second.iter().map(|(k, v)| (*k, *v)));
        InstanceCollection::new(partition)
    }

    /// Instances only present in the new side.
    pub fn added(&self) -> InstanceCollection<'a> {
        InstanceCollection::new(subtract(&self.new, &self.old))
    }

    /// Instances only present in the old side.
    pub fn removed(&self) -> InstanceCollection<'a> {
        InstanceCollection::new(subtract(&self.old, &self.new))
    }

    /// Instances present on both sides.
    pub fn retained(&self, retain_from_new: bool) -> InstanceCollection<'a> {
        let (keep, other) = if retain_from_new {
            (&self.new, &self.old)
        } else {
            (&self.old, &self.new)
        };
        let partition = keep
            .iter()
            .filter(|(id, _)| other.contains_key(*id))
            .map(|(k, v)| (*k, *v))
            .collect();
        InstanceCollection::new(partition)
    }

    /// Instances present on both sides whose properties changed
    /// (`property_changed = true`) or stayed the same (`false`).
    pub fn retained_with_properties(
        &self,
        retain_from_new: bool,
        property_changed: bool,
    ) -> InstanceCollection<'a> {
        let partition = self
            .old
            .iter()
            .filter_map(|(id, old)| {
                let new = self.new.get(*id)?;
                let same = old.properties() == new.properties();
                (same != property_changed)
                    .then(|| (*id, if retain_from_new { *new } else { *old }))
            })
            .collect();
        InstanceCollection::new(partition)
    }
}

fn index_unique<'a>(instances: impl Iterator<Item = &'a Instance>) -> InstanceMap<'a> {
    instances.map(|i| (i.id(), i)).collect()
}

fn index<'a>(instances: impl IntoIterator<Item = &'a Instance>) -> Result<InstanceMap<'a>> {
    let mut map = InstanceMap::new();
    for instance in instances {
        if map.insert(instance.id(), instance).is_some() {
            return Err(ViewError::DuplicateInstance {
                instance_id: instance.id().clone(),
            });
        }
    }
    Ok(map)
}

fn subtract<'a>(from: &InstanceMap<'a>, other: &InstanceMap<'a>) -> InstanceMap<'a> {
    from.iter()
        .filter(|(id, _)| !other.contains_key(*id))
        .map(|(k, v)| (*k, *v))
        .collect()
}

enum InstanceFilter<'a> {
    Local(bool),
    Leader(bool),
    InCluster(ClusterId, bool),
    Custom(Box<dyn Fn(&Instance) -> bool + 'a>),
}

impl InstanceFilter<'_> {
    fn accept(&self, instance: &Instance) -> bool {
        match self {
            Self::Local(expected) => instance.is_local() == *expected,
            Self::Leader(expected) => instance.is_leader() == *expected,
            Self::InCluster(id, expected) => (instance.cluster_id() == id) == *expected,
            Self::Custom(filter) => filter(instance),
        }
    }
}

/// One partition of an [`InstancesDiff`], narrowed by filters.
///
/// Filters are combined with logical AND and applied when the collection is
/// read.
pub struct InstanceCollection<'a> {
    instances: InstanceMap<'a>,
    filters: Vec<InstanceFilter<'a>>,
}

impl<'a> InstanceCollection<'a> {
    fn new(instances: InstanceMap<'a>) -> Self {
        Self {
            instances,
            filters: Vec::new(),
        }
    }

    /// Keep instances accepted by `filter`.
    pub fn filter_with<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Instance) -> bool + 'a,
    {
        self.filters.push(InstanceFilter::Custom(Box::new(filter)));
        self
    }

    /// Keep the local instance.
    pub fn local(mut self) -> Self {
        self.filters.push(InstanceFilter::Local(true));
        self
    }

    /// Keep non-local instances.
    pub fn not_local(mut self) -> Self {
        self.filters.push(InstanceFilter::Local(false));
        self
    }

    /// Keep leaders.
    pub fn leader(mut self) -> Self {
        self.filters.push(InstanceFilter::Leader(true));
        self
    }

    /// Keep non-leaders.
    pub fn not_leader(mut self) -> Self {
        self.filters.push(InstanceFilter::Leader(false));
        self
    }

    /// Keep instances belonging to `cluster`.
    pub fn in_cluster(mut self, cluster: &Cluster) -> Self {
        self.filters
            .push(InstanceFilter::InCluster(cluster.id().clone(), true));
        self
    }

    /// Keep instances not belonging to `cluster`.
    pub fn not_in_cluster(mut self, cluster: &Cluster) -> Self {
        self.filters
            .push(InstanceFilter::InCluster(cluster.id().clone(), false));
        self
    }

    /// Matching instances in instance-ID order.
    pub fn get(&self) -> Vec<&'a Instance> {
        self.instances
            .values()
            .copied()
            .filter(|i| self.filters.iter().all(|f| f.accept(i)))
            .collect()
    }

    /// IDs of the matching instances, in order.
    pub fn ids(&self) -> Vec<&'a InstanceId> {
        self.get().into_iter().map(Instance::id).collect()
    }

    /// Number of matching instances.
    pub fn len(&self) -> usize {
        self.get().len()
    }

    /// Whether no instance matches.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for InstanceCollection<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceCollection")
            .field("instances", &self.ids())
            .field("filters", &self.filters.len())
            .finish()
    }
}
