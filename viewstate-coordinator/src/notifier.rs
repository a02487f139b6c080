//! Asynchronous, ordered event delivery.
//!
//! The [`AsyncNotifier`] owns one delivery thread that drains a FIFO queue.
//! Each queued item carries the event and the observers that were bound when
//! it was published; observers bound later never see it. Producers only
//! enqueue, so a slow observer never blocks the coordinator.

use crate::observer::{ObserverId, TopologyObserver};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};
use viewstate_core::TopologyEvent;

struct Delivery {
    event: TopologyEvent,
    audience: Vec<Arc<dyn TopologyObserver>>,
}

struct NotifierState {
    queue: VecDeque<Delivery>,
    /// An item has been taken off the queue and is being delivered.
    delivering: bool,
    /// Accepting new events.
    running: bool,
}

impl NotifierState {
    fn in_flight(&self) -> usize {
        self.queue.len() + usize::from(self.delivering)
    }
}

struct NotifierShared {
    state: Mutex<NotifierState>,
    /// Signalled when an item is queued or the notifier stops.
    available: Condvar,
    /// Signalled whenever the in-flight count may have dropped to zero.
    idle: Condvar,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: Mutex<Option<ThreadId>>,
}

/// Single-consumer delivery queue for topology events.
#[derive(Clone)]
pub struct AsyncNotifier {
    shared: Arc<NotifierShared>,
}

impl AsyncNotifier {
    /// Spawn the delivery thread.
    pub fn start(thread_name: &str) -> std::io::Result<Self> {
        let shared = Arc::new(NotifierShared {
            state: Mutex::new(NotifierState {
                queue: VecDeque::new(),
                delivering: false,
                running: true,
            }),
            available: Condvar::new(),
            idle: Condvar::new(),
            worker: Mutex::new(None),
            worker_id: Mutex::new(None),
        });

        let worker_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name(thread_name.to_string())
            .spawn(move || {
                *worker_shared.worker_id.lock() = Some(thread::current().id());
                run_worker(&worker_shared);
            })?;
        *shared.worker.lock() = Some(handle);
        tracing::debug!(thread = thread_name, "Notifier started");

        Ok(Self { shared })
    }

    /// Queue `event` for delivery to `audience`.
    ///
    /// Returns false if the notifier has been shut down; the event is
    /// dropped in that case.
    pub fn publish(&self, event: TopologyEvent, audience: Vec<Arc<dyn TopologyObserver>>) -> bool {
        if audience.is_empty() {
            return true;
        }
        let mut state = self.shared.state.lock();
        if !state.running {
            tracing::warn!(event = %event.kind(), "Publish after notifier shutdown, dropping event");
            return false;
        }
        state.queue.push_back(Delivery { event, audience });
        self.shared.available.notify_one();
        true
    }

    /// Number of events queued or being delivered.
    pub fn in_flight_count(&self) -> usize {
        self.shared.state.lock().in_flight()
    }

    /// Whether any event is queued or being delivered.
    pub fn has_in_flight(&self) -> bool {
        self.in_flight_count() > 0
    }

    /// Whether the notifier still accepts events.
    pub fn is_running(&self) -> bool {
        self.shared.state.lock().running
    }

    /// Block until the queue is drained or `timeout` elapses.
    ///
    /// Returns the number of events still in flight (0 when drained).
    pub fn wait_idle(&self, timeout: Duration) -> usize {
        if self.is_delivery_thread() {
            return self.in_flight_count();
        }
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        while state.in_flight() > 0 {
            if self.shared.idle.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        state.in_flight()
    }

    /// Stop accepting events and stop the delivery thread.
    ///
    /// With `drain`, queued events are delivered first; otherwise they are
    /// discarded. Blocks until the delivery thread exits, unless called from
    /// that thread.
    pub fn shutdown(&self, drain: bool) {
        let discarded = {
            let mut state = self.shared.state.lock();
            state.running = false;
            let discarded = if drain { 0 } else { state.queue.len() };
            if !drain {
                state.queue.clear();
            }
            self.shared.available.notify_all();
            self.shared.idle.notify_all();
            discarded
        };
        if discarded > 0 {
            tracing::debug!(discarded, "Discarded queued events on shutdown");
        }

        if self.is_delivery_thread() {
            return;
        }
        let handle = self.shared.worker.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::error!("Notifier thread terminated abnormally");
            }
        }
    }

    /// Whether the caller is running on the delivery thread, i.e. inside an
    /// observer.
    pub fn is_delivery_thread(&self) -> bool {
        *self.shared.worker_id.lock() == Some(thread::current().id())
    }
}

impl std::fmt::Debug for AsyncNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("AsyncNotifier")
            .field("queued", &state.queue.len())
            .field("delivering", &state.delivering)
            .field("running", &state.running)
            .finish()
    }
}

fn run_worker(shared: &NotifierShared) {
    loop {
        let delivery = {
            let mut state = shared.state.lock();
            loop {
                if let Some(delivery) = state.queue.pop_front() {
                    state.delivering = true;
                    break Some(delivery);
                }
                if !state.running {
                    break None;
                }
                shared.available.wait(&mut state);
            }
        };

        let Some(delivery) = delivery else {
            shared.idle.notify_all();
            tracing::debug!("Notifier stopped");
            return;
        };

        deliver(&delivery);

        let mut state = shared.state.lock();
        state.delivering = false;
        if state.queue.is_empty() {
            shared.idle.notify_all();
        }
    }
}

fn deliver(delivery: &Delivery) {
    for observer in &delivery.audience {
        let result = catch_unwind(AssertUnwindSafe(|| observer.on_event(&delivery.event)));
        if result.is_err() {
            tracing::error!(
                observer = %ObserverId::of(observer),
                event = %delivery.event.kind(),
                "Observer panicked while handling event"
            );
        }
    }
}
