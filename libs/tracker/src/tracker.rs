//! Lifecycle Controller.
//!
//! The [`Tracker`] owns at most one active session. Starting a session
//! tears down the previous one first; every termination path removes the
//! session's timers exactly once.
//!
//! Published state is guarded by a generation counter: each session gets a
//! generation when it starts, and the counter moves on whenever the
//! session is stopped or replaced. A worker only publishes while its
//! generation is current, so results that arrive after cancellation are
//! dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rollwatch_id::{EvaluationId, JobId, Namespace};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::TrackerConfig;
use crate::reader::StatusReader;
use crate::session::{ResourceTarget, RolloutSnapshot, TrackingSession};
use crate::worker::SessionWorker;

/// Callbacks for terminal outcomes.
///
/// Invoked from the session's worker task; implementations should return
/// quickly.
pub trait RolloutObserver: Send + Sync + 'static {
    /// The rollout reached `healthy` and the settle delay elapsed.
    fn on_complete(&self, _snapshot: &RolloutSnapshot) {}

    /// The rollout ended in `failed` or `timeout`.
    fn on_error(&self, _message: &str) {}

    /// Navigate to the resource's detail view.
    fn navigate(&self, _target: &ResourceTarget) {}
}

/// Observer that ignores every callback.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl RolloutObserver for NoopObserver {}

/// Timers and identity of the running session.
struct ActiveSession {
    generation: u64,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl ActiveSession {
    fn cancel(self) {
        let _ = self.shutdown.send(true);
        self.handle.abort();
    }
}

/// State shared between the tracker and its session worker.
pub(crate) struct Shared {
    state: watch::Sender<Option<RolloutSnapshot>>,
    generation: AtomicU64,
    active: Mutex<Option<ActiveSession>>,
    observer: Arc<dyn RolloutObserver>,
}

impl Shared {
    pub(crate) fn new(observer: Arc<dyn RolloutObserver>) -> Self {
        let (state, _) = watch::channel(None);
        Self {
            state,
            generation: AtomicU64::new(0),
            active: Mutex::new(None),
            observer,
        }
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<ActiveSession>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn observer(&self) -> &dyn RolloutObserver {
        self.observer.as_ref()
    }

    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Publish the first snapshot of a new session and return its generation.
    pub(crate) fn begin(&self, snapshot: RolloutSnapshot) -> u64 {
        let mut generation = 0;
        self.state.send_modify(|state| {
            generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *state = Some(snapshot);
        });
        generation
    }

    /// Publish a snapshot if `generation` is still current.
    pub(crate) fn publish(&self, generation: u64, snapshot: RolloutSnapshot) -> bool {
        let mut current = false;
        self.state.send_if_modified(|state| {
            current = self.is_current(generation);
            if current {
                *state = Some(snapshot);
            }
            current
        });
        current
    }

    /// Invalidate the current generation and clear published state.
    fn clear(&self) {
        self.state.send_if_modified(|state| {
            self.generation.fetch_add(1, Ordering::SeqCst);
            state.take().is_some()
        });
    }

    /// Drop the timers of `generation` without touching published state.
    ///
    /// Returns false if the session no longer held the active slot, i.e. it
    /// was stopped or replaced.
    pub(crate) fn release(&self, generation: u64) -> bool {
        let mut active = self.lock_active();
        if active.as_ref().is_some_and(|s| s.generation == generation) {
            active.take();
            return true;
        }
        false
    }

    /// Full teardown after a successful rollout: clear published state and
    /// drop the timers, if `generation` is still current.
    pub(crate) fn finish(&self, generation: u64) {
        self.state.send_if_modified(|state| {
            if !self.is_current(generation) {
                return false;
            }
            self.generation.fetch_add(1, Ordering::SeqCst);
            state.take().is_some()
        });
        self.release(generation);
    }
}

/// Tracks one submission at a time.
///
/// Dropping the tracker stops any active session.
pub struct Tracker {
    reader: Arc<dyn StatusReader>,
    config: TrackerConfig,
    shared: Arc<Shared>,
}

impl Tracker {
    /// Create a tracker that reports only through snapshots.
    pub fn new(reader: Arc<dyn StatusReader>, config: TrackerConfig) -> Self {
        Self::with_observer(reader, config, Arc::new(NoopObserver))
    }

    /// Create a tracker with terminal-outcome callbacks.
    pub fn with_observer(
        reader: Arc<dyn StatusReader>,
        config: TrackerConfig,
        observer: Arc<dyn RolloutObserver>,
    ) -> Self {
        Self {
            reader,
            config,
            shared: Arc::new(Shared::new(observer)),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Start tracking a submission, replacing any active session.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start_tracking(&self, job_id: JobId, namespace: Namespace, evaluation_id: EvaluationId) {
        let mut active = self.shared.lock_active();

        if let Some(previous) = active.take() {
            debug!(
                generation = previous.generation,
                "Replacing active tracking session"
            );
            previous.cancel();
        }

        let session = TrackingSession::new(job_id, namespace, evaluation_id);
        let generation = self.shared.begin(session.snapshot());

        info!(
            generation,
            job_id = %session.job_id,
            namespace = %session.namespace,
            evaluation_id = %session.evaluation_id,
            "Started tracking rollout"
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker = SessionWorker::new(
            Arc::clone(&self.reader),
            self.config.clone(),
            Arc::clone(&self.shared),
            generation,
            session,
        );
        let handle = tokio::spawn(worker.run(shutdown_rx, Instant::now()));

        *active = Some(ActiveSession {
            generation,
            shutdown: shutdown_tx,
            handle,
        });
    }

    /// Stop tracking and clear published state. Safe to call repeatedly.
    pub fn stop_tracking(&self) {
        let previous = self.shared.lock_active().take();

        if let Some(previous) = previous {
            info!(generation = previous.generation, "Stopped tracking rollout");
            previous.cancel();
        }

        self.shared.clear();
    }

    /// Stop tracking and navigate to the session's resource.
    ///
    /// Returns the target navigated to, or `None` if there was no session.
    pub fn navigate_to_resource(&self) -> Option<ResourceTarget> {
        let target = self.shared.state.borrow().as_ref().map(RolloutSnapshot::target)?;

        self.stop_tracking();
        self.shared.observer().navigate(&target);

        Some(target)
    }

    /// Current published snapshot.
    pub fn snapshot(&self) -> Option<RolloutSnapshot> {
        self.shared.state.borrow().clone()
    }

    /// Subscribe to published snapshots.
    pub fn subscribe(&self) -> watch::Receiver<Option<RolloutSnapshot>> {
        self.shared.state.subscribe()
    }

    /// Returns true while a session's timers are armed.
    pub fn is_tracking(&self) -> bool {
        self.shared.lock_active().is_some()
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        self.stop_tracking();
    }
}
