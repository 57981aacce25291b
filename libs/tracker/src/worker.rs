//! Reconciliation Loop for a single tracking session.
//!
//! One task per session drives both timers: the poll ticker and the
//! deadline. Cancelling the task (or letting it return) releases both at
//! once.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use rollwatch_reconcile::{Classification, RolloutStep};
use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::config::TrackerConfig;
use crate::reader::{ReadError, StatusReader};
use crate::reconciler::{observe_target, PollTarget};
use crate::session::TrackingSession;
use crate::tracker::Shared;

type PollFuture = Pin<Box<dyn Future<Output = Result<Classification, ReadError>> + Send>>;

/// Reconciliation worker owning one session record.
pub(crate) struct SessionWorker {
    reader: Arc<dyn StatusReader>,
    config: TrackerConfig,
    shared: Arc<Shared>,
    generation: u64,
    session: TrackingSession,
}

impl SessionWorker {
    pub(crate) fn new(
        reader: Arc<dyn StatusReader>,
        config: TrackerConfig,
        shared: Arc<Shared>,
        generation: u64,
        session: TrackingSession,
    ) -> Self {
        Self {
            reader,
            config,
            shared,
            generation,
            session,
        }
    }

    /// Run until the session completes or shutdown is signaled.
    #[instrument(
        name = "rollout_session",
        skip_all,
        fields(
            generation = self.generation,
            job_id = %self.session.job_id,
            evaluation_id = %self.session.evaluation_id,
        )
    )]
    pub(crate) async fn run(mut self, mut shutdown: watch::Receiver<bool>, started: Instant) {
        let deadline = time::sleep_until(started + self.config.deadline);
        tokio::pin!(deadline);

        let mut ticker = time::interval_at(
            started + self.config.initial_delay,
            self.config.poll_interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut in_flight: Option<PollFuture> = None;

        loop {
            tokio::select! {
                biased;

                _ = shutdown.changed() => {
                    debug!("Tracking cancelled");
                    return;
                }

                _ = &mut deadline => {
                    // A poll still in flight is discarded with the session.
                    in_flight = None;
                    warn!(
                        step = %self.session.current_step,
                        deadline_ms = self.config.deadline.as_millis() as u64,
                        "Rollout deadline exceeded"
                    );
                    self.session.expire();
                    break;
                }

                result = poll_in_flight(&mut in_flight), if in_flight.is_some() => {
                    in_flight = None;
                    match result {
                        Ok(classification) => {
                            let changed = self.apply(classification);
                            if self.session.is_complete {
                                break;
                            }
                            if changed && !self.shared.publish(self.generation, self.session.snapshot()) {
                                debug!("Session superseded");
                                return;
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "Status read failed; skipping tick");
                        }
                    }
                }

                _ = ticker.tick() => {
                    if in_flight.is_some() {
                        debug!("Previous poll still in flight; skipping tick");
                        continue;
                    }
                    in_flight = Some(self.poll());
                }
            }
        }

        drop(in_flight);
        self.complete(shutdown).await;
    }

    /// Start reading the scheduler for the session's current ids.
    fn poll(&self) -> PollFuture {
        let reader = Arc::clone(&self.reader);
        let target = PollTarget::from(&self.session);
        let health_grace = self.config.health_grace;

        debug!(step = %self.session.current_step, "Polling scheduler status");

        Box::pin(async move { observe_target(reader.as_ref(), &target, health_grace).await })
    }

    /// Fold a classification into the session, logging what moved.
    fn apply(&mut self, classification: Classification) -> bool {
        let previous_allocation = self.session.allocation_id.clone();
        let changed = self.session.apply(classification);

        if changed {
            if previous_allocation.is_none() {
                if let Some(allocation_id) = &self.session.allocation_id {
                    info!(allocation_id = %allocation_id, "Allocation placed");
                }
            }
            info!(
                step = %self.session.current_step,
                progress = self.session.progress(),
                "Rollout advanced"
            );
        }

        changed
    }

    /// Publish the terminal state and run the matching completion path.
    async fn complete(self, mut shutdown: watch::Receiver<bool>) {
        let snapshot = self.session.snapshot();
        if !self.shared.publish(self.generation, snapshot.clone()) {
            debug!("Session superseded; discarding terminal state");
            return;
        }

        if snapshot.step == RolloutStep::Healthy {
            info!(settle_ms = self.config.settle_delay.as_millis() as u64, "Rollout healthy");

            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    debug!("Tracking cancelled while settling");
                    return;
                }
                _ = time::sleep(self.config.settle_delay) => {}
            }

            if !self.shared.is_current(self.generation) {
                return;
            }

            let observer = self.shared.observer();
            observer.on_complete(&snapshot);
            observer.navigate(&snapshot.target());
            self.shared.finish(self.generation);
            return;
        }

        let message = snapshot.error_message.as_deref().unwrap_or_default();
        warn!(step = %snapshot.step, reason = message, "Rollout ended");

        // Timers go now; the terminal snapshot stays published until the
        // operator navigates away or retries.
        if !self.shared.release(self.generation) {
            debug!("Session stopped before its outcome was reported");
            return;
        }
        self.shared.observer().on_error(message);
    }
}

async fn poll_in_flight(slot: &mut Option<PollFuture>) -> Result<Classification, ReadError> {
    match slot {
        Some(poll) => poll.await,
        None => std::future::pending().await,
    }
}
