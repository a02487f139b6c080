//! The view-state coordinator.
//!
//! [`ViewStateCoordinator`] tracks the local node's belief about cluster
//! membership and decides when a change may be announced. Views arrive
//! through [`ViewStateCoordinator::handle_new_view`]; a changed view is first
//! agreed on through the [`ClusterSyncService`] and, when a
//! [`DebounceGate`] is installed, held back for a quiet period. Events go out
//! through an [`AsyncNotifier`] so callers never run observer code.
//!
//! # Locking
//!
//! All state lives behind one mutex. The sync service is never called with
//! any lock held: operations decide the sync work under the lock, claim it
//! against the generation counter, and run it after releasing the lock. A
//! superseded request is never issued and a superseded callback is ignored,
//! so a `sync` that blocks only ever blocks its own caller.

use crate::config::CoordinatorConfig;
use crate::debounce::{DebounceGate, TopologySource};
use crate::error::{CoordinatorError, CoordinatorResult};
use crate::notifier::AsyncNotifier;
use crate::observer::{ObserverId, TopologyObserver};
use crate::scheduler::Scheduler;
use crate::sync::{ClusterSyncService, SyncCallback};
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use viewstate_core::{EventKind, TopologyEvent, View, ViewDelta};

/// Externally visible state of a coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoordinatorPhase {
    /// Not activated. Initial state and the state after deactivation.
    Idle,
    /// Activated, no view received yet.
    ActiveNoView,
    /// Holds a current, announced view.
    ActiveStable,
    /// The current view was invalidated; waiting for a new one.
    ActiveChanging,
    /// A candidate view is being synchronized across the cluster.
    ActiveSyncing,
}

impl fmt::Display for CoordinatorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::ActiveNoView => "active_no_view",
            Self::ActiveStable => "active_stable",
            Self::ActiveChanging => "active_changing",
            Self::ActiveSyncing => "active_syncing",
        };
        f.write_str(name)
    }
}

struct BoundObserver {
    id: ObserverId,
    observer: Arc<dyn TopologyObserver>,
    /// Received INIT since the last activation.
    initialized: bool,
    last_kind: Option<EventKind>,
}

struct CoordinatorState {
    activated: bool,
    changing: bool,
    /// Last announced view, or the view stored before activation.
    previous_view: Option<View>,
    /// Candidate under synchronization.
    pending_view: Option<View>,
    generation: u64,
    sync_in_flight: bool,
    observers: Vec<BoundObserver>,
    notifier: Option<AsyncNotifier>,
    gate: Option<DebounceGate>,
    /// A fired debounce timer is still handing its view to the sync service.
    forwarding: usize,
}

impl CoordinatorState {
    fn phase(&self) -> CoordinatorPhase {
        if !self.activated {
            CoordinatorPhase::Idle
        } else if self.pending_view.is_some() {
            CoordinatorPhase::ActiveSyncing
        } else if self.changing {
            CoordinatorPhase::ActiveChanging
        } else if self.previous_view.is_some() {
            CoordinatorPhase::ActiveStable
        } else {
            CoordinatorPhase::ActiveNoView
        }
    }

    fn is_delaying(&self) -> bool {
        self.gate.as_ref().is_some_and(DebounceGate::is_delaying)
    }

    /// Debounce work that has not yet reached the notifier.
    fn timer_pending(&self) -> bool {
        self.is_delaying() || self.forwarding > 0
    }

    /// Queue `event` for the observers selected by `initialized`.
    ///
    /// CHANGING is never sent twice in a row to the same observer.
    fn enqueue(&mut self, event: TopologyEvent, initialized: bool) {
        let kind = event.kind();
        let mut audience = Vec::new();
        for bound in self
            .observers
            .iter_mut()
            .filter(|b| b.initialized == initialized)
        {
            if kind == EventKind::Changing && bound.last_kind == Some(EventKind::Changing) {
                tracing::debug!(observer = %bound.id, "Observer already got CHANGING");
                continue;
            }
            bound.last_kind = Some(kind);
            if kind == EventKind::Init {
                bound.initialized = true;
            }
            audience.push(Arc::clone(&bound.observer));
        }
        if audience.is_empty() {
            return;
        }

        tracing::info!(event = %event, audience = audience.len(), "Announcing topology event");
        match &self.notifier {
            Some(notifier) => {
                notifier.publish(event, audience);
            }
            None => tracing::warn!(event = %kind, "No notifier running, dropping event"),
        }
    }

    /// The candidate has been agreed on: announce it and make it current.
    fn complete(&mut self, view: View) {
        self.changing = false;
        self.pending_view = None;

        if let Some(previous) = self.previous_view.take() {
            let old_view = previous.not_current();
            let event = match previous.compare(&view) {
                ViewDelta::PropertiesChanged => TopologyEvent::PropertiesChanged {
                    old_view,
                    new_view: view.clone(),
                },
                ViewDelta::MembershipChanged | ViewDelta::Unchanged => TopologyEvent::Changed {
                    old_view,
                    new_view: view.clone(),
                },
            };
            self.enqueue(event, true);
        }

        self.enqueue(
            TopologyEvent::Init {
                new_view: view.clone(),
            },
            false,
        );
        self.previous_view = Some(view);
    }

    /// Drop the outstanding sync request, if any.
    fn supersede_sync(&mut self) -> Option<SyncAction> {
        self.pending_view.take()?;
        self.generation += 1;
        Some(SyncAction::Cancel {
            generation: self.generation,
        })
    }

    fn begin_sync(&mut self, view: View) -> SyncAction {
        self.generation += 1;
        self.pending_view = Some(view.clone());
        SyncAction::Issue {
            generation: self.generation,
            view,
        }
    }
}

/// Work on the sync service, performed after the state lock is released.
enum SyncAction {
    Cancel { generation: u64 },
    Issue { generation: u64, view: View },
}

impl SyncAction {
    fn generation(&self) -> u64 {
        match self {
            Self::Cancel { generation } | Self::Issue { generation, .. } => *generation,
        }
    }
}

struct CoordinatorShared {
    state: Mutex<CoordinatorState>,
    sync_service: Arc<dyn ClusterSyncService>,
    config: CoordinatorConfig,
}

impl Drop for CoordinatorShared {
    fn drop(&mut self) {
        if let Some(notifier) = self.state.get_mut().notifier.take() {
            notifier.shutdown(self.config.drain_on_shutdown);
        }
    }
}

/// Tracks the current topology view and announces changes to observers.
///
/// Cloning yields another handle to the same coordinator.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use viewstate_coordinator::{FnObserver, ImmediateSync, ViewStateCoordinator};
/// use viewstate_core::{Instance, View};
///
/// let coordinator = ViewStateCoordinator::new(Arc::new(ImmediateSync));
/// coordinator.handle_activated()?;
/// coordinator.bind(FnObserver::shared(|event| println!("{event}")));
///
/// let view = View::builder()
///     .sync_token("t1")
///     .instance(Instance::new("node-a", "cluster-1").with_local(true))
///     .build()?;
/// coordinator.handle_new_view(view);
/// assert_eq!(coordinator.wait_for_async_events(Duration::from_secs(1)), 0);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone)]
pub struct ViewStateCoordinator {
    shared: Arc<CoordinatorShared>,
}

impl ViewStateCoordinator {
    /// Create a coordinator with the default configuration.
    pub fn new(sync_service: Arc<dyn ClusterSyncService>) -> Self {
        Self::build(CoordinatorConfig::default(), sync_service)
    }

    /// Create a coordinator with a validated configuration.
    pub fn with_config(
        config: CoordinatorConfig,
        sync_service: Arc<dyn ClusterSyncService>,
    ) -> CoordinatorResult<Self> {
        config.validate().map_err(CoordinatorError::Config)?;
        Ok(Self::build(config, sync_service))
    }

    fn build(config: CoordinatorConfig, sync_service: Arc<dyn ClusterSyncService>) -> Self {
        Self {
            shared: Arc::new(CoordinatorShared {
                state: Mutex::new(CoordinatorState {
                    activated: false,
                    changing: false,
                    previous_view: None,
                    pending_view: None,
                    generation: 0,
                    sync_in_flight: false,
                    observers: Vec::new(),
                    notifier: None,
                    gate: None,
                    forwarding: 0,
                }),
                sync_service,
                config,
            }),
        }
    }

    /// The configuration in use.
    pub fn config(&self) -> &CoordinatorConfig {
        &self.shared.config
    }

    /// Current phase of the state machine.
    pub fn phase(&self) -> CoordinatorPhase {
        self.shared.state.lock().phase()
    }

    /// Whether the coordinator is activated.
    pub fn is_activated(&self) -> bool {
        self.shared.state.lock().activated
    }

    /// Number of bound observers.
    pub fn observer_count(&self) -> usize {
        self.shared.state.lock().observers.len()
    }

    /// Register an observer. Returns false if it was already bound.
    ///
    /// If a stable view exists the observer is sent INIT for it right away;
    /// otherwise it receives INIT once the next view is established.
    pub fn bind(&self, observer: Arc<dyn TopologyObserver>) -> bool {
        let id = ObserverId::of(&observer);
        let mut state = self.shared.state.lock();
        if state.observers.iter().any(|b| b.id == id) {
            tracing::debug!(observer = %id, "Observer already bound");
            return false;
        }

        state.observers.push(BoundObserver {
            id,
            observer,
            initialized: false,
            last_kind: None,
        });
        tracing::debug!(observer = %id, phase = %state.phase(), "Observer bound");

        if state.activated && !state.changing {
            if let Some(view) = state.previous_view.clone() {
                state.enqueue(TopologyEvent::Init { new_view: view }, false);
            }
        }
        true
    }

    /// Deregister an observer. Returns whether it was bound.
    pub fn unbind(&self, observer: &Arc<dyn TopologyObserver>) -> bool {
        let id = ObserverId::of(observer);
        let mut state = self.shared.state.lock();
        let before = state.observers.len();
        state.observers.retain(|b| b.id != id);
        let removed = state.observers.len() != before;
        if removed {
            tracing::debug!(observer = %id, "Observer unbound");
        }
        removed
    }

    /// Activate the coordinator and start event delivery.
    ///
    /// A no-op if already active. If a stable view was reported before
    /// activation, every bound observer is sent INIT for it.
    pub fn handle_activated(&self) -> CoordinatorResult<()> {
        let mut state = self.shared.state.lock();
        if state.activated {
            tracing::debug!("Already activated, ignoring");
            return Ok(());
        }

        let notifier = AsyncNotifier::start(&self.shared.config.notifier_thread_name)?;
        state.notifier = Some(notifier);
        state.activated = true;
        state.generation += 1;
        tracing::info!(observers = state.observers.len(), "Coordinator activated");

        if !state.changing {
            if let Some(view) = state.previous_view.clone() {
                state.enqueue(TopologyEvent::Init { new_view: view }, false);
            }
        }
        Ok(())
    }

    /// Deactivate the coordinator.
    ///
    /// Cancels any outstanding sync and debounce timer, forgets the current
    /// and pending views, and stops event delivery. Observers stay bound and
    /// receive INIT again after the next activation once a view is stable.
    pub fn handle_deactivated(&self) {
        let (notifier, action) = {
            let mut state = self.shared.state.lock();
            if !state.activated {
                tracing::debug!("Not activated, ignoring deactivation");
                return;
            }

            state.activated = false;
            state.changing = false;
            state.previous_view = None;
            state.pending_view = None;
            state.generation += 1;
            let action = state.sync_in_flight.then_some(SyncAction::Cancel {
                generation: state.generation,
            });
            if let Some(gate) = state.gate.as_mut() {
                gate.cancel();
            }
            for bound in &mut state.observers {
                bound.initialized = false;
                bound.last_kind = None;
            }
            tracing::info!("Coordinator deactivated");
            (state.notifier.take(), action)
        };

        if let Some(action) = action {
            self.run_sync_action(action);
        }
        if let Some(notifier) = notifier {
            notifier.shutdown(self.shared.config.drain_on_shutdown);
        }
    }

    /// Invalidate the current view.
    ///
    /// Sends CHANGING to initialized observers when a view is held. A sync
    /// in progress is cancelled. Repeated calls send nothing further.
    pub fn handle_changing(&self) {
        let action = {
            let mut state = self.shared.state.lock();
            if state.changing {
                let action = if state.activated {
                    state.supersede_sync()
                } else {
                    None
                };
                tracing::debug!(cancelled_sync = action.is_some(), "Already changing");
                action
            } else {
                self.announce_changing(&mut state);
                None
            }
        };

        if let Some(action) = action {
            self.run_sync_action(action);
        }
    }

    /// Report a view from the topology source.
    ///
    /// A view that is not current is treated as [`Self::handle_changing`].
    pub fn handle_new_view(&self, view: View) {
        if !view.is_current() {
            tracing::debug!(view = %view, "View is not current, treating as changing");
            self.handle_changing();
            return;
        }

        let action = {
            let mut state = self.shared.state.lock();
            if !state.activated {
                if !state.changing && state.previous_view.as_ref() == Some(&view) {
                    tracing::debug!(view = %view, "Unchanged view before activation, ignoring");
                } else {
                    tracing::debug!(view = %view, "Not activated, storing view");
                    state.previous_view = Some(view);
                    state.changing = false;
                }
                return;
            }

            if let Some(gate) = state.gate.as_mut() {
                if gate.offer(view.clone()) {
                    tracing::debug!(view = %view, "Debouncing, view queued");
                    return;
                }
            }

            self.process_view(&mut state, view)
        };

        if let Some(action) = action {
            self.run_sync_action(action);
        }
    }

    /// Install a debounce gate, replacing any previous one.
    ///
    /// A timer armed by the previous gate is cancelled and a view it held
    /// back is processed immediately. `min_delay_secs == 0` removes the
    /// gate.
    pub fn install_debounce(
        &self,
        source: Arc<dyn TopologySource>,
        scheduler: Arc<dyn Scheduler>,
        min_delay_secs: u64,
    ) {
        let action = {
            let mut state = self.shared.state.lock();
            let held_back = state.gate.take().and_then(|mut gate| gate.cancel());
            if min_delay_secs > 0 {
                state.gate = Some(DebounceGate::new(source, scheduler, min_delay_secs));
                tracing::info!(delay_secs = min_delay_secs, "Debounce installed");
            } else {
                tracing::info!("Debounce removed");
            }

            match held_back {
                Some(view) if state.activated => self.process_view(&mut state, view),
                _ => None,
            }
        };

        if let Some(action) = action {
            self.run_sync_action(action);
        }
    }

    /// Install a debounce gate using `min_event_delay_secs` from the
    /// configuration. Returns false when the configuration disables it.
    pub fn install_configured_debounce(
        &self,
        source: Arc<dyn TopologySource>,
        scheduler: Arc<dyn Scheduler>,
    ) -> bool {
        let secs = self.shared.config.min_event_delay_secs;
        if secs == 0 {
            return false;
        }
        self.install_debounce(source, scheduler, secs);
        true
    }

    /// Whether a debounce timer is armed.
    pub fn is_delaying(&self) -> bool {
        self.shared.state.lock().is_delaying()
    }

    /// Events queued or being delivered, plus one for an armed debounce
    /// timer.
    pub fn in_flight_event_count(&self) -> usize {
        let (notifier, timer_pending) = self.in_flight_parts();
        notifier.map_or(0, |n| n.in_flight_count()) + usize::from(timer_pending)
    }

    /// Whether any event is in flight.
    pub fn has_in_flight_events(&self) -> bool {
        self.in_flight_event_count() > 0
    }

    /// Block until no event is in flight or `timeout` elapses.
    ///
    /// Returns the number of in-flight events left (0 on success). An armed
    /// debounce timer counts as one. Called from an observer, it returns
    /// at once since delivery cannot progress.
    pub fn wait_for_async_events(&self, timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        let poll = self.shared.config.wait_poll_interval();
        loop {
            let (notifier, timer_pending) = self.in_flight_parts();
            let queued = notifier.as_ref().map_or(0, AsyncNotifier::in_flight_count);
            let count = queued + usize::from(timer_pending);
            let now = Instant::now();
            if count == 0 || now >= deadline {
                return count;
            }
            if queued > 0 && notifier.as_ref().is_some_and(AsyncNotifier::is_delivery_thread) {
                // Called from an observer: the queue cannot drain until it returns.
                return count;
            }

            let step = poll.min(deadline - now);
            match notifier {
                Some(notifier) if queued > 0 => {
                    notifier.wait_idle(step);
                }
                _ => std::thread::sleep(step),
            }
        }
    }

    fn in_flight_parts(&self) -> (Option<AsyncNotifier>, bool) {
        let state = self.shared.state.lock();
        (state.notifier.clone(), state.timer_pending())
    }

    /// Enter the changing state from a stable (or view-less) state.
    fn announce_changing(&self, state: &mut CoordinatorState) {
        state.changing = true;
        if !state.activated {
            tracing::debug!("Not activated, changing recorded");
            return;
        }
        let Some(previous) = state.previous_view.clone() else {
            tracing::debug!("No view yet, changing recorded");
            return;
        };

        state.enqueue(
            TopologyEvent::Changing {
                old_view: previous.not_current(),
            },
            true,
        );
        self.arm_gate(state);
    }

    /// Arm the debounce gate if one is installed and idle.
    fn arm_gate(&self, state: &mut CoordinatorState) {
        let Some(gate) = state.gate.as_mut() else {
            return;
        };
        if gate.is_delaying() {
            return;
        }
        let weak: Weak<CoordinatorShared> = Arc::downgrade(&self.shared);
        let delay = gate.min_delay();
        match gate.arm(move |epoch| {
            if let Some(shared) = weak.upgrade() {
                ViewStateCoordinator { shared }.on_debounce_elapsed(epoch);
            }
        }) {
            Ok(()) => tracing::debug!(delay_secs = delay.as_secs(), "Debounce armed"),
            Err(e) => tracing::warn!(
                error = %e,
                "Scheduler rejected debounce timer, forwarding without delay"
            ),
        }
    }

    /// Handle a current view that is not held back by the debounce gate.
    fn process_view(&self, state: &mut CoordinatorState, view: View) -> Option<SyncAction> {
        if !state.changing {
            match state.previous_view.clone() {
                Some(previous) if previous == view => {
                    tracing::debug!(view = %view, "View unchanged, ignoring");
                    return None;
                }
                Some(previous) if previous.only_differs_in_properties(&view) => {
                    state.enqueue(
                        TopologyEvent::PropertiesChanged {
                            old_view: previous.not_current(),
                            new_view: view.clone(),
                        },
                        true,
                    );
                    state.previous_view = Some(view);
                    return None;
                }
                _ => {
                    self.announce_changing(state);
                    if let Some(gate) = state.gate.as_mut() {
                        if gate.offer(view.clone()) {
                            tracing::debug!(view = %view, "Debouncing, view queued");
                            return None;
                        }
                    }
                }
            }
        }

        if let Some(pending) = &state.pending_view {
            if *pending == view && pending.sync_token() == view.sync_token() {
                tracing::debug!(view = %view, "Same candidate already syncing, ignoring");
                return None;
            }
        }
        Some(state.begin_sync(view))
    }

    fn on_debounce_elapsed(&self, epoch: u64) {
        let source = {
            let state = self.shared.state.lock();
            match state.gate.as_ref() {
                Some(gate) if gate.is_live(epoch) => gate.source(),
                _ => return,
            }
        };
        let latest = source.latest_view();

        let action = {
            let mut state = self.shared.state.lock();
            if !state.activated {
                return;
            }
            let Some(gate) = state.gate.as_mut() else {
                return;
            };
            if !gate.is_live(epoch) {
                return;
            }

            let candidate = gate.finish();
            let view = match latest {
                Some(view) if view.is_current() => Some(view),
                Some(_) => {
                    tracing::debug!("Source view still changing, re-arming debounce");
                    self.arm_gate(&mut state);
                    match state.gate.as_mut() {
                        Some(gate) if gate.is_delaying() => {
                            if let Some(candidate) = candidate {
                                gate.offer(candidate);
                            }
                            return;
                        }
                        _ => candidate,
                    }
                }
                None => candidate,
            };

            let action = match view {
                Some(view) => {
                    tracing::debug!(view = %view, "Debounce elapsed, processing view");
                    self.process_view(&mut state, view)
                }
                None => {
                    tracing::debug!("Debounce elapsed with no view to forward");
                    None
                }
            };
            if action.is_some() {
                state.forwarding += 1;
            }
            action
        };

        if let Some(action) = action {
            self.run_sync_action(action);
            self.shared.state.lock().forwarding -= 1;
        }
    }

    fn run_sync_action(&self, action: SyncAction) {
        let shared = &self.shared;
        // A cancel may overtake the request it targets when two threads race;
        // the late request's callback then fails the generation check.
        let outstanding = {
            let mut state = shared.state.lock();
            if state.generation != action.generation() {
                tracing::debug!(
                    generation = action.generation(),
                    current = state.generation,
                    "Sync action superseded"
                );
                return;
            }
            let outstanding = state.sync_in_flight;
            state.sync_in_flight = matches!(action, SyncAction::Issue { .. });
            outstanding
        };

        if outstanding {
            tracing::debug!("Cancelling outstanding sync");
            shared.sync_service.cancel_sync();
        }

        if let SyncAction::Issue { generation, view } = action {
            tracing::info!(generation, view = %view, "Issuing cluster sync");
            let weak = Arc::downgrade(shared);
            let candidate = view.clone();
            shared.sync_service.sync(
                &view,
                SyncCallback::new(move || {
                    if let Some(shared) = weak.upgrade() {
                        ViewStateCoordinator { shared }.on_sync_complete(generation, candidate);
                    }
                }),
            );
        }
    }

    fn on_sync_complete(&self, generation: u64, view: View) {
        let mut state = self.shared.state.lock();
        if !state.activated || state.generation != generation {
            tracing::debug!(
                generation,
                current = state.generation,
                "Sync callback superseded, ignoring"
            );
            return;
        }
        tracing::debug!(generation, "Sync completed");
        state.sync_in_flight = false;
        state.complete(view);
    }
}

impl fmt::Debug for ViewStateCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("ViewStateCoordinator")
            .field("phase", &state.phase())
            .field("generation", &state.generation)
            .field("observers", &state.observers.len())
            .field("delaying", &state.is_delaying())
            .field("forwarding", &state.forwarding)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::FnObserver;
    use crate::sync::ImmediateSync;
    use viewstate_core::{Instance, InstanceId};

    fn view(token: &str, ids: &[&str]) -> View {
        let mut builder = View::builder().sync_token(token);
        for (idx, id) in ids.iter().enumerate() {
            builder = builder.instance(
                Instance::new(*id, "c1")
                    .with_local(idx == 0)
                    .with_leader(idx == 0),
            );
        }
        builder.build().unwrap()
    }

    fn recording() -> (Arc<dyn TopologyObserver>, Arc<Mutex<Vec<EventKind>>>) {
        let kinds = Arc::new(Mutex::new(Vec::new()));
        let kinds_clone = Arc::clone(&kinds);
        let observer = FnObserver::shared(move |event: &TopologyEvent| {
            kinds_clone.lock().push(event.kind());
        });
        (observer, kinds)
    }

    fn drain(coordinator: &ViewStateCoordinator) {
        assert_eq!(coordinator.wait_for_async_events(Duration::from_secs(2)), 0);
    }

    #[test]
    fn phases_follow_lifecycle() {
        let coordinator = ViewStateCoordinator::new(Arc::new(ImmediateSync));
        assert_eq!(coordinator.phase(), CoordinatorPhase::Idle);

        coordinator.handle_activated().unwrap();
        assert_eq!(coordinator.phase(), CoordinatorPhase::ActiveNoView);

        coordinator.handle_new_view(view("t1", &["a"]));
        assert_eq!(coordinator.phase(), CoordinatorPhase::ActiveStable);

        coordinator.handle_changing();
        assert_eq!(coordinator.phase(), CoordinatorPhase::ActiveChanging);

        coordinator.handle_deactivated();
        assert_eq!(coordinator.phase(), CoordinatorPhase::Idle);
    }

    #[test]
    fn activation_is_idempotent() {
        let coordinator = ViewStateCoordinator::new(Arc::new(ImmediateSync));
        coordinator.handle_activated().unwrap();
        coordinator.handle_activated().unwrap();
        assert!(coordinator.is_activated());
        coordinator.handle_deactivated();
        coordinator.handle_deactivated();
        assert!(!coordinator.is_activated());
    }

    #[test]
    fn properties_only_change_skips_changing() {
        let coordinator = ViewStateCoordinator::new(Arc::new(ImmediateSync));
        let (observer, kinds) = recording();
        coordinator.handle_activated().unwrap();
        coordinator.bind(observer);

        let v1 = view("t1", &["a", "b"]);
        coordinator.handle_new_view(v1.clone());
        let v2 = v1
            .to_builder()
            .set_property(&InstanceId::new("b"), "k", "v")
            .unwrap()
            .build()
            .unwrap();
        coordinator.handle_new_view(v2);
        drain(&coordinator);

        assert_eq!(
            *kinds.lock(),
            vec![EventKind::Init, EventKind::PropertiesChanged]
        );
    }

    #[test]
    fn repeated_changing_sends_one_event() {
        let coordinator = ViewStateCoordinator::new(Arc::new(ImmediateSync));
        let (observer, kinds) = recording();
        coordinator.handle_activated().unwrap();
        coordinator.bind(observer);

        coordinator.handle_new_view(view("t1", &["a"]));
        coordinator.handle_changing();
        coordinator.handle_changing();
        coordinator.handle_new_view(view("t1", &["a"]).not_current());
        drain(&coordinator);

        assert_eq!(*kinds.lock(), vec![EventKind::Init, EventKind::Changing]);
    }

    #[test]
    fn view_before_activation_is_replayed_as_init() {
        let coordinator = ViewStateCoordinator::new(Arc::new(ImmediateSync));
        let (observer, kinds) = recording();
        coordinator.bind(observer);
        coordinator.handle_new_view(view("t1", &["a"]));
        assert_eq!(coordinator.phase(), CoordinatorPhase::Idle);

        coordinator.handle_activated().unwrap();
        drain(&coordinator);
        assert_eq!(*kinds.lock(), vec![EventKind::Init]);
        assert_eq!(coordinator.phase(), CoordinatorPhase::ActiveStable);
    }

    #[test]
    fn rejects_invalid_config() {
        let config = CoordinatorConfig {
            wait_poll_interval_ms: 0,
            ..CoordinatorConfig::default()
        };
        let result = ViewStateCoordinator::with_config(config, Arc::new(ImmediateSync));
        assert!(matches!(result, Err(CoordinatorError::Config(_))));
    }

    #[test]
    fn wait_with_zero_timeout_on_idle_coordinator() {
        let coordinator = ViewStateCoordinator::new(Arc::new(ImmediateSync));
        assert_eq!(coordinator.wait_for_async_events(Duration::ZERO), 0);
        coordinator.handle_activated().unwrap();
        assert_eq!(coordinator.in_flight_event_count(), 0);
        assert!(!coordinator.has_in_flight_events());
    }
}
