//! Cluster synchronization barrier seam.

use std::fmt;
use viewstate_core::View;

/// Completion handle passed to [`ClusterSyncService::sync`].
///
/// Running it re-enters the coordinator, so it must not be run while the
/// sync service holds a lock the coordinator may also wait on. Dropping it
/// without running is how a sync "fails": the coordinator stays syncing
/// until a later view or a deactivation supersedes the request.
pub struct SyncCallback {
    inner: Box<dyn FnOnce() + Send>,
}

impl SyncCallback {
    /// Wrap a completion closure.
    pub fn new(f: impl FnOnce() + Send + 'static) -> Self {
        Self { inner: Box::new(f) }
    }

    /// Signal that the cluster agreed on the view.
    pub fn run(self) {
        (self.inner)();
    }
}

impl fmt::Debug for SyncCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncCallback").finish_non_exhaustive()
    }
}

/// A cluster-wide barrier that must agree before a view is announced.
///
/// `sync` is always called without the coordinator's state lock held and at
/// most one request is outstanding at a time: before issuing a new request
/// the coordinator calls `cancel_sync` for the previous one.
pub trait ClusterSyncService: Send + Sync {
    /// Start synchronizing on `view`. `callback` must be run exactly once
    /// when the barrier completes, unless the request is cancelled first.
    fn sync(&self, view: &View, callback: SyncCallback);

    /// Cancel the outstanding request, if any. A cancelled request must not
    /// run its callback afterwards.
    fn cancel_sync(&self);
}

/// A sync service that completes immediately, on the calling thread.
///
/// Suitable for single-node setups and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImmediateSync;

impl ClusterSyncService for ImmediateSync {
    fn sync(&self, _view: &View, callback: SyncCallback) {
        callback.run();
    }

    fn cancel_sync(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use viewstate_core::Instance;

    #[test]
    fn immediate_sync_runs_callback_inline() {
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = Arc::clone(&ran);
        let view = View::builder()
            .instance(Instance::new("a", "c1").with_local(true))
            .build()
            .unwrap();

        ImmediateSync.sync(
            &view,
            SyncCallback::new(move || ran_clone.store(true, Ordering::SeqCst)),
        );
        assert!(ran.load(Ordering::SeqCst));
    }
}
