//! Topology events delivered to observers.

use crate::view::View;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a topology event, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// First stable view seen by an observer.
    Init,
    /// The current view has been invalidated; a new one is being negotiated.
    Changing,
    /// A new view with different membership has been established.
    Changed,
    /// A new view that differs from the previous one only in properties.
    PropertiesChanged,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "INIT",
            Self::Changing => "CHANGING",
            Self::Changed => "CHANGED",
            Self::PropertiesChanged => "PROPERTIES_CHANGED",
        };
        f.write_str(name)
    }
}

/// A notification about the cluster topology.
///
/// Which views are carried depends on the kind: INIT carries only the new
/// view, CHANGING only the old one, and the two change kinds carry both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopologyEvent {
    /// First stable view for this observer.
    Init {
        /// The established view.
        new_view: View,
    },
    /// The current view is no longer valid.
    Changing {
        /// The invalidated view, marked not current.
        old_view: View,
    },
    /// Membership changed.
    Changed {
        /// The previously announced view.
        old_view: View,
        /// The newly established view.
        new_view: View,
    },
    /// Only instance properties changed.
    PropertiesChanged {
        /// The previously announced view.
        old_view: View,
        /// The newly established view.
        new_view: View,
    },
}

impl TopologyEvent {
    /// Event kind.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Init { .. } => EventKind::Init,
            Self::Changing { .. } => EventKind::Changing,
            Self::Changed { .. } => EventKind::Changed,
            Self::PropertiesChanged { .. } => EventKind::PropertiesChanged,
        }
    }

    /// The view before the change, if this kind carries one.
    pub fn old_view(&self) -> Option<&View> {
        match self {
            Self::Init { .. } => None,
            Self::Changing { old_view }
            | Self::Changed { old_view, .. }
            | Self::PropertiesChanged { old_view, .. } => Some(old_view),
        }
    }

    /// The view after the change, if this kind carries one.
    pub fn new_view(&self) -> Option<&View> {
        match self {
            Self::Changing { .. } => None,
            Self::Init { new_view }
            | Self::Changed { new_view, .. }
            | Self::PropertiesChanged { new_view, .. } => Some(new_view),
        }
    }
}

impl fmt::Display for TopologyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.old_view(), self.new_view()) {
            (Some(old), Some(new)) => write!(f, "{}({old} -> {new})", self.kind()),
            (Some(view), None) | (None, Some(view)) => write!(f, "{}({view})", self.kind()),
            (None, None) => write!(f, "{}", self.kind()),
        }
    }
}
