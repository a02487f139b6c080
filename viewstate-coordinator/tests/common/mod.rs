//! Common test utilities for viewstate-coordinator tests.

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::mpsc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use viewstate_coordinator::{
    ClusterSyncService, DelayedTask, ScheduledTask, Scheduler, SchedulerError, SyncCallback,
    TopologyObserver, TopologySource,
};
use viewstate_core::{EventKind, Instance, InstanceId, TopologyEvent, View};

/// Build a view in cluster "c1". The first instance is local and leader.
pub fn view(token: &str, ids: &[&str]) -> View {
    let mut builder = View::builder().sync_token(token);
    for (idx, id) in ids.iter().enumerate() {
        builder = builder.instance(
            Instance::new(*id, "c1")
                .with_local(idx == 0)
                .with_leader(idx == 0),
        );
    }
    builder.build().expect("valid test view")
}

/// Copy of `base` with one property set on `id`.
#[allow(dead_code)]
pub fn with_property(base: &View, id: &str, key: &str, value: &str) -> View {
    base.to_builder()
        .set_property(&InstanceId::new(id), key, value)
        .and_then(|b| b.build())
        .expect("valid test view")
}

/// Compact event description: `KIND(old->new)` using sync tokens.
pub fn describe(event: &TopologyEvent) -> String {
    let token = |v: Option<&View>| v.and_then(View::sync_token).unwrap_or("-").to_string();
    match event.kind() {
        EventKind::Init => format!("INIT({})", token(event.new_view())),
        EventKind::Changing => format!("CHANGING({})", token(event.old_view())),
        kind => format!(
            "{kind}({}->{})",
            token(event.old_view()),
            token(event.new_view())
        ),
    }
}

/// Observer that records every event it receives.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<TopologyEvent>>,
}

#[allow(dead_code)]
impl RecordingObserver {
    /// Create a shared recorder plus the handle to bind.
    pub fn create() -> (Arc<RecordingObserver>, Arc<dyn TopologyObserver>) {
        let recorder = Arc::new(RecordingObserver::default());
        let observer: Arc<dyn TopologyObserver> = Arc::clone(&recorder) as Arc<dyn TopologyObserver>;
        (recorder, observer)
    }

    /// All events received so far.
    pub fn events(&self) -> Vec<TopologyEvent> {
        self.events.lock().clone()
    }

    /// Kinds of the events received so far.
    pub fn kinds(&self) -> Vec<EventKind> {
        self.events.lock().iter().map(TopologyEvent::kind).collect()
    }

    /// Descriptions of the events received so far.
    pub fn described(&self) -> Vec<String> {
        self.events.lock().iter().map(describe).collect()
    }

    /// Forget recorded events.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl TopologyObserver for RecordingObserver {
    fn on_event(&self, event: &TopologyEvent) {
        self.events.lock().push(event.clone());
    }
}

#[allow(dead_code)]
struct SyncRequest {
    token: Option<String>,
    callback: Option<SyncCallback>,
}

/// Sync service that holds every request until the test releases it.
#[allow(dead_code)]
#[derive(Default)]
pub struct BlockingSync {
    requests: Mutex<Vec<SyncRequest>>,
    sync_calls: AtomicUsize,
    cancel_calls: AtomicUsize,
}

#[allow(dead_code)]
impl BlockingSync {
    /// Number of `sync` calls so far.
    pub fn sync_calls(&self) -> usize {
        self.sync_calls.load(Ordering::SeqCst)
    }

    /// Number of `cancel_sync` calls so far.
    pub fn cancel_calls(&self) -> usize {
        self.cancel_calls.load(Ordering::SeqCst)
    }

    /// Number of requests whose callback has neither run nor been cancelled.
    pub fn outstanding(&self) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.callback.is_some())
            .count()
    }

    /// Sync token of the most recent request.
    pub fn last_token(&self) -> Option<String> {
        self.requests.lock().last().and_then(|r| r.token.clone())
    }

    /// Run the callback of the most recent outstanding request.
    pub fn release(&self) -> bool {
        let callback = self
            .requests
            .lock()
            .iter_mut()
            .rev()
            .find_map(|r| r.callback.take());
        match callback {
            Some(callback) => {
                callback.run();
                true
            }
            None => false,
        }
    }

    /// Take the callback of request `index`, even if it was cancelled.
    ///
    /// Used to simulate a callback racing with its cancellation.
    pub fn steal(&self, index: usize) -> Option<SyncCallback> {
        self.requests
            .lock()
            .get_mut(index)
            .and_then(|r| r.callback.take())
    }
}

impl ClusterSyncService for BlockingSync {
    fn sync(&self, view: &View, callback: SyncCallback) {
        self.sync_calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(SyncRequest {
            token: view.sync_token().map(str::to_string),
            callback: Some(callback),
        });
    }

    fn cancel_sync(&self) {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(request) = self
            .requests
            .lock()
            .iter_mut()
            .rev()
            .find(|r| r.callback.is_some())
        {
            request.callback = None;
        }
    }
}

/// Sync service that keeps cancelled callbacks so tests can run them late.
#[allow(dead_code)]
#[derive(Default)]
pub struct LeakySync {
    callbacks: Mutex<Vec<SyncCallback>>,
}

#[allow(dead_code)]
impl LeakySync {
    /// Run every callback received so far, oldest first.
    pub fn run_all(&self) {
        let callbacks: Vec<SyncCallback> = self.callbacks.lock().drain(..).collect();
        for callback in callbacks {
            callback.run();
        }
    }
}

impl ClusterSyncService for LeakySync {
    fn sync(&self, _view: &View, callback: SyncCallback) {
        self.callbacks.lock().push(callback);
    }

    fn cancel_sync(&self) {}
}

/// Handle on a `sync` call held open by [`GatedSync`].
#[allow(dead_code)]
pub struct Gate {
    entered: mpsc::Receiver<()>,
    release: mpsc::Sender<()>,
}

#[allow(dead_code)]
impl Gate {
    /// Wait until the gated `sync` call has started.
    pub fn wait_entered(&self, timeout: Duration) -> bool {
        self.entered.recv_timeout(timeout).is_ok()
    }

    /// Let the gated `sync` call return.
    pub fn open(&self) {
        let _ = self.release.send(());
    }
}

/// Sync service whose next `sync` call blocks its caller until the test
/// opens the gate. Other calls complete inline.
///
/// A gated request runs its callback on release unless `cancel_sync` was
/// called meanwhile.
#[allow(dead_code)]
#[derive(Default)]
pub struct GatedSync {
    gate: Mutex<Option<(mpsc::Sender<()>, mpsc::Receiver<()>)>>,
    cancelled: AtomicBool,
    sync_calls: AtomicUsize,
    cancel_calls: AtomicUsize,
}

#[allow(dead_code)]
impl GatedSync {
    /// Make the next `sync` call block until the returned gate is opened.
    pub fn gate_next(&self) -> Gate {
        let (entered_tx, entered) = mpsc::channel();
        let (release, release_rx) = mpsc::channel();
        *self.gate.lock() = Some((entered_tx, release_rx));
        self.cancelled.store(false, Ordering::SeqCst);
        Gate { entered, release }
    }

    /// Number of `sync` calls so far.
    pub fn sync_calls(&self) -> usize {
        self.sync_calls.load(Ordering::SeqCst)
    }

    /// Number of `cancel_sync` calls so far.
    pub fn cancel_calls(&self) -> usize {
        self.cancel_calls.load(Ordering::SeqCst)
    }
}

impl ClusterSyncService for GatedSync {
    fn sync(&self, _view: &View, callback: SyncCallback) {
        self.sync_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().take();
        if let Some((entered, release)) = gate {
            let _ = entered.send(());
            let _ = release.recv_timeout(Duration::from_secs(10));
            if self.cancelled.load(Ordering::SeqCst) {
                return;
            }
        }
        callback.run();
    }

    fn cancel_sync(&self) {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

/// Topology source returning whatever the test set last.
#[allow(dead_code)]
#[derive(Default)]
pub struct StaticSource {
    view: Mutex<Option<View>>,
}

#[allow(dead_code)]
impl StaticSource {
    /// Replace the view returned by the source.
    pub fn set(&self, view: Option<View>) {
        *self.view.lock() = view;
    }
}

impl TopologySource for StaticSource {
    fn latest_view(&self) -> Option<View> {
        self.view.lock().clone()
    }
}

#[allow(dead_code)]
struct ManualTask(Arc<AtomicBool>);

impl ScheduledTask for ManualTask {
    fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Scheduler whose tasks run only when the test fires them.
#[allow(dead_code)]
#[derive(Default)]
pub struct ManualScheduler {
    tasks: Mutex<Vec<(Duration, DelayedTask, Arc<AtomicBool>)>>,
    reject: AtomicBool,
}

#[allow(dead_code)]
impl ManualScheduler {
    /// Make every further `schedule_once` fail.
    pub fn reject_all(&self) {
        self.reject.store(true, Ordering::SeqCst);
    }

    /// Number of scheduled tasks that have not fired and are not cancelled.
    pub fn pending(&self) -> usize {
        self.tasks
            .lock()
            .iter()
            .filter(|(_, _, cancelled)| !cancelled.load(Ordering::SeqCst))
            .count()
    }

    /// Delay requested by the most recent task.
    pub fn last_delay(&self) -> Option<Duration> {
        self.tasks.lock().last().map(|(delay, _, _)| *delay)
    }

    /// Run all tasks that were not cancelled. Returns how many ran.
    pub fn fire(&self) -> usize {
        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        let mut ran = 0;
        for (_, task, cancelled) in tasks {
            if !cancelled.load(Ordering::SeqCst) {
                task();
                ran += 1;
            }
        }
        ran
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_once(
        &self,
        delay: Duration,
        task: DelayedTask,
    ) -> Result<Box<dyn ScheduledTask>, SchedulerError> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(SchedulerError::Rejected("test scheduler rejects".to_string()));
        }
        let cancelled = Arc::new(AtomicBool::new(false));
        self.tasks.lock().push((delay, task, Arc::clone(&cancelled)));
        Ok(Box::new(ManualTask(cancelled)))
    }
}
