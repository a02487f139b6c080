//! Delayed task scheduling used by the debounce gate.

use crate::error::SchedulerError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

/// A task to run once after a delay.
pub type DelayedTask = Box<dyn FnOnce() + Send + 'static>;

/// Handle to a scheduled task.
pub trait ScheduledTask: Send {
    /// Prevent the task from running if it has not started yet.
    fn cancel(&self);
}

/// Runs delayed tasks on behalf of the debounce gate.
///
/// Tasks must run on a thread of the scheduler's choosing, never inline in
/// `schedule_once`.
pub trait Scheduler: Send + Sync {
    /// Run `task` once after `delay`.
    fn schedule_once(
        &self,
        delay: Duration,
        task: DelayedTask,
    ) -> Result<Box<dyn ScheduledTask>, SchedulerError>;
}

/// A [`Scheduler`] backed by a tokio runtime.
///
/// Timers are handed to a dispatcher task living on the runtime, so a
/// runtime that has shut down is reported as [`SchedulerError::Shutdown`]
/// instead of accepting a timer that would never fire. The delay is a
/// `tokio::time::sleep`; the task itself runs on the blocking pool since it
/// re-enters the coordinator and may call the sync service.
///
/// A timer still pending when the runtime shuts down runs immediately on
/// the thread dropping it, unless it was cancelled.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    timers: mpsc::UnboundedSender<Timer>,
    shutdown: Arc<AtomicBool>,
}

impl TokioScheduler {
    /// Create a scheduler on the given runtime.
    pub fn new(handle: Handle) -> Self {
        let (timers, mut incoming) = mpsc::unbounded_channel::<Timer>();
        handle.spawn(async move {
            while let Some(timer) = incoming.recv().await {
                tokio::spawn(timer.run());
            }
        });
        Self {
            timers,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create a scheduler on the runtime of the calling context.
    ///
    /// Panics when called outside a tokio runtime, like [`Handle::current`].
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    /// Refuse further tasks. Tasks already scheduled still run.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Whether [`TokioScheduler::shutdown`] has been called or the runtime
    /// is gone.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst) || self.timers.is_closed()
    }
}

#[derive(Debug)]
struct Timer {
    delay: Duration,
    pending: PendingTask,
}

impl Timer {
    async fn run(self) {
        tokio::time::sleep(self.delay).await;
        let pending = self.pending;
        if let Err(e) = tokio::task::spawn_blocking(move || pending.run()).await {
            tracing::error!(error = %e, "Delayed task failed");
        }
    }
}

/// A delayed task that runs exactly once unless cancelled, even if the
/// runtime drops it.
struct PendingTask {
    task: Option<DelayedTask>,
    cancelled: Arc<AtomicBool>,
}

impl PendingTask {
    fn take(&mut self) -> Option<DelayedTask> {
        let task = self.task.take()?;
        (!self.cancelled.load(Ordering::SeqCst)).then_some(task)
    }

    fn run(mut self) {
        if let Some(task) = self.take() {
            task();
        }
    }
}

impl Drop for PendingTask {
    fn drop(&mut self) {
        if let Some(task) = self.take() {
            tracing::warn!("Runtime stopped before a delayed task fired, running it now");
            task();
        }
    }
}

impl std::fmt::Debug for PendingTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingTask")
            .field("pending", &self.task.is_some())
            .field("cancelled", &self.cancelled.load(Ordering::SeqCst))
            .finish()
    }
}

struct TokioTask {
    cancelled: Arc<AtomicBool>,
}

impl ScheduledTask for TokioTask {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_once(
        &self,
        delay: Duration,
        task: DelayedTask,
    ) -> Result<Box<dyn ScheduledTask>, SchedulerError> {
        if self.shutdown.load(Ordering::SeqCst) {
            return Err(SchedulerError::Shutdown);
        }

        let cancelled = Arc::new(AtomicBool::new(false));
        let timer = Timer {
            delay,
            pending: PendingTask {
                task: Some(task),
                cancelled: Arc::clone(&cancelled),
            },
        };
        if let Err(mpsc::error::SendError(timer)) = self.timers.send(timer) {
            // The task must not run: the caller falls back on the error.
            timer.pending.cancelled.store(true, Ordering::SeqCst);
            self.shutdown.store(true, Ordering::SeqCst);
            return Err(SchedulerError::Shutdown);
        }
        Ok(Box::new(TokioTask { cancelled }))
    }
}
