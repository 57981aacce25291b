//! Tracking session state and its read-only projection.

use rollwatch_id::{AllocationId, EvaluationId, JobId, Namespace};
use rollwatch_reconcile::{advance, Classification, RolloutStep};
use serde::{Deserialize, Serialize};

/// Message reported when the deadline expires before the rollout finishes.
pub const TIMEOUT_MESSAGE: &str =
    "Deployment is taking longer than expected. The job may still be starting in the background.";

/// The mutable record of one tracking session.
///
/// Only the session's reconciliation worker mutates it; everything else
/// sees [`RolloutSnapshot`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingSession {
    pub job_id: JobId,
    pub namespace: Namespace,
    pub evaluation_id: EvaluationId,

    /// Set once placement is observed; never replaced afterwards.
    pub allocation_id: Option<AllocationId>,

    pub current_step: RolloutStep,

    /// Only set together with `failed` or `timeout`.
    pub error_message: Option<String>,

    /// Once latched, no further mutation is accepted.
    pub is_complete: bool,
}

impl TrackingSession {
    /// Start a session at `submitting`.
    pub fn new(job_id: JobId, namespace: Namespace, evaluation_id: EvaluationId) -> Self {
        Self {
            job_id,
            namespace,
            evaluation_id,
            allocation_id: None,
            current_step: RolloutStep::Submitting,
            error_message: None,
            is_complete: false,
        }
    }

    /// Progress derived from the current step.
    pub fn progress(&self) -> u8 {
        self.current_step.progress()
    }

    /// Fold a classification into the session.
    ///
    /// Returns true if anything observable changed.
    pub fn apply(&mut self, classification: Classification) -> bool {
        if self.is_complete {
            return false;
        }

        match classification {
            Classification::Unchanged => false,
            Classification::Advance {
                step,
                allocation_id,
            } => {
                let mut changed = false;

                if self.allocation_id.is_none() {
                    if let Some(id) = allocation_id {
                        self.allocation_id = Some(id);
                        changed = true;
                    }
                }

                if let Some(next) = advance(self.current_step, step) {
                    self.current_step = next;
                    self.is_complete = next.is_terminal();
                    changed = true;
                }

                changed
            }
            Classification::Failed { message } => self.finish(RolloutStep::Failed, message),
        }
    }

    /// Force the `timeout` terminal.
    pub fn expire(&mut self) -> bool {
        self.finish(RolloutStep::Timeout, TIMEOUT_MESSAGE.to_string())
    }

    fn finish(&mut self, step: RolloutStep, message: String) -> bool {
        if self.is_complete {
            return false;
        }

        match advance(self.current_step, step) {
            Some(next) => {
                self.current_step = next;
                self.error_message = Some(message);
                self.is_complete = true;
                true
            }
            None => false,
        }
    }

    /// Read-only projection for renderers.
    pub fn snapshot(&self) -> RolloutSnapshot {
        RolloutSnapshot {
            step: self.current_step,
            progress: self.progress(),
            job_id: self.job_id.clone(),
            namespace: self.namespace.clone(),
            evaluation_id: self.evaluation_id.clone(),
            allocation_id: self.allocation_id.clone(),
            error_message: self.error_message.clone(),
        }
    }
}

/// What renderers see of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolloutSnapshot {
    pub step: RolloutStep,
    pub progress: u8,
    pub job_id: JobId,
    pub namespace: Namespace,
    pub evaluation_id: EvaluationId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allocation_id: Option<AllocationId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl RolloutSnapshot {
    /// Returns true once the session can no longer change.
    pub fn is_terminal(&self) -> bool {
        self.step.is_terminal()
    }

    /// Where navigation leads for this session.
    pub fn target(&self) -> ResourceTarget {
        ResourceTarget {
            job_id: self.job_id.clone(),
            namespace: self.namespace.clone(),
        }
    }
}

/// The resource detail view a finished session navigates to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTarget {
    pub job_id: JobId,
    pub namespace: Namespace,
}

impl ResourceTarget {
    /// Path of the job detail view in the scheduler's web UI.
    pub fn ui_path(&self) -> String {
        format!("/ui/jobs/{}@{}", self.job_id, self.namespace)
    }
}
