//! Minimum-delay gate between CHANGING and the following announcement.
//!
//! The gate holds back candidate views for a quiet period after a CHANGING
//! announcement. When the timer fires the coordinator asks the
//! [`TopologySource`] for its latest view and processes it as if it had
//! just been reported, so a burst of changes yields one announcement.
//!
//! The gate is pure policy state; it is owned by the coordinator and only
//! touched under the coordinator's lock.

use crate::error::SchedulerError;
use crate::scheduler::{ScheduledTask, Scheduler};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use viewstate_core::View;

/// Pull accessor for the latest view known to the raw topology source.
pub trait TopologySource: Send + Sync {
    /// The latest view, or `None` if the source has none yet.
    fn latest_view(&self) -> Option<View>;
}

/// Debounce state installed on a coordinator.
pub struct DebounceGate {
    source: Arc<dyn TopologySource>,
    scheduler: Arc<dyn Scheduler>,
    min_delay: Duration,
    delaying: bool,
    /// Bumped on every arm and cancel; a firing timer with an older epoch is stale.
    epoch: u64,
    timer: Option<Box<dyn ScheduledTask>>,
    /// Last view reported while delaying.
    candidate: Option<View>,
}

impl DebounceGate {
    /// Create an idle gate.
    pub fn new(
        source: Arc<dyn TopologySource>,
        scheduler: Arc<dyn Scheduler>,
        min_delay_secs: u64,
    ) -> Self {
        Self {
            source,
            scheduler,
            min_delay: Duration::from_secs(min_delay_secs),
            delaying: false,
            epoch: 0,
            timer: None,
            candidate: None,
        }
    }

    /// Whether a timer is armed.
    pub fn is_delaying(&self) -> bool {
        self.delaying
    }

    /// Configured quiet period.
    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    /// The view queued while delaying, if any.
    pub fn candidate(&self) -> Option<&View> {
        self.candidate.as_ref()
    }

    pub(crate) fn source(&self) -> Arc<dyn TopologySource> {
        Arc::clone(&self.source)
    }

    /// Arm the timer. `on_fire` receives the epoch the timer was armed with.
    ///
    /// On failure the gate stays idle and the caller must forward without
    /// delay.
    pub(crate) fn arm<F>(&mut self, on_fire: F) -> Result<(), SchedulerError>
    where
        F: FnOnce(u64) + Send + 'static,
    {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
        self.epoch += 1;
        let epoch = self.epoch;
        match self
            .scheduler
            .schedule_once(self.min_delay, Box::new(move || on_fire(epoch)))
        {
            Ok(timer) => {
                self.timer = Some(timer);
                self.delaying = true;
                Ok(())
            }
            Err(e) => {
                self.delaying = false;
                Err(e)
            }
        }
    }

    /// Queue `view` if delaying. Returns whether the view was absorbed.
    pub(crate) fn offer(&mut self, view: View) -> bool {
        if !self.delaying {
            return false;
        }
        self.candidate = Some(view);
        true
    }

    /// Whether a timer armed with `epoch` is still the live one.
    pub(crate) fn is_live(&self, epoch: u64) -> bool {
        self.delaying && self.epoch == epoch
    }

    /// Conclude a fired timer, returning the queued candidate.
    pub(crate) fn finish(&mut self) -> Option<View> {
        self.delaying = false;
        self.timer = None;
        self.candidate.take()
    }

    /// Cancel any armed timer, returning the queued candidate.
    pub(crate) fn cancel(&mut self) -> Option<View> {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
        self.epoch += 1;
        self.delaying = false;
        self.candidate.take()
    }
}

impl fmt::Debug for DebounceGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebounceGate")
            .field("min_delay", &self.min_delay)
            .field("delaying", &self.delaying)
            .field("epoch", &self.epoch)
            .field("candidate", &self.candidate.is_some())
            .finish_non_exhaustive()
    }
}
