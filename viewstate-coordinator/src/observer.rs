//! Observer capability for topology events.

use std::fmt;
use std::sync::Arc;
use viewstate_core::TopologyEvent;

/// Receives topology events from a coordinator.
///
/// Events are delivered on the coordinator's notifier thread, one at a time
/// and in order. A panicking observer is isolated: the panic is logged and
/// delivery continues with the next observer.
pub trait TopologyObserver: Send + Sync {
    /// Handle one event.
    fn on_event(&self, event: &TopologyEvent);
}

/// Identity of a bound observer.
///
/// Derived from the address of the shared observer allocation, so binding
/// clones of the same `Arc` yields the same ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(usize);

impl ObserverId {
    /// Identity of `observer`.
    pub fn of(observer: &Arc<dyn TopologyObserver>) -> Self {
        Self(Arc::as_ptr(observer).cast::<()>() as usize)
    }

    /// Get the raw ID value.
    pub fn as_usize(&self) -> usize {
        self.0
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer_{:x}", self.0)
    }
}

/// A closure wrapped as a [`TopologyObserver`].
pub struct FnObserver {
    callback: Box<dyn Fn(&TopologyEvent) + Send + Sync>,
}

impl FnObserver {
    /// Wrap `callback`.
    pub fn new(callback: impl Fn(&TopologyEvent) + Send + Sync + 'static) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }

    /// Wrap `callback` into a shared observer ready to bind.
    pub fn shared(
        callback: impl Fn(&TopologyEvent) + Send + Sync + 'static,
    ) -> Arc<dyn TopologyObserver> {
        Arc::new(Self::new(callback))
    }
}

impl TopologyObserver for FnObserver {
    fn on_event(&self, event: &TopologyEvent) {
        (self.callback)(event);
    }
}

impl fmt::Debug for FnObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnObserver").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use viewstate_core::{Instance, View};

    #[test]
    fn observer_id_follows_allocation() {
        let a = FnObserver::shared(|_| {});
        let b = FnObserver::shared(|_| {});

        assert_eq!(ObserverId::of(&a), ObserverId::of(&Arc::clone(&a)));
        assert_ne!(ObserverId::of(&a), ObserverId::of(&b));
    }

    #[test]
    fn fn_observer_callback() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = Arc::clone(&counter);
        let observer = FnObserver::new(move |_event| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });

        let view = View::builder()
            .instance(Instance::new("a", "c1").with_local(true))
            .build()
            .unwrap();
        let event = TopologyEvent::Init { new_view: view };
        observer.on_event(&event);
        observer.on_event(&event);

        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
