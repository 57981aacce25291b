//! Rollout reconciliation primitives.
//!
//! This library turns what the orchestration service reports about a
//! submission into a coarse rollout step. Key concepts:
//!
//! - **Records**: evaluations and allocations as read from the scheduler.
//! - **Classification**: the step a single observation implies.
//! - **Advancement**: folding a classification into the step already shown,
//!   without ever moving backwards.
//!
//! # Invariants
//!
//! - Classification is pure: same records and clock give the same result
//! - Non-terminal steps only move forward
//! - Terminal steps absorb every later observation

mod classify;
mod model;

use serde::{Deserialize, Serialize};

pub use classify::{
    classify, classify_allocation, classify_evaluation, failure_message, select_allocation,
    task_is_healthy, Classification, EvaluationOutcome, Observation, DEFAULT_HEALTH_GRACE,
};
pub use model::{
    Allocation, AllocationStub, ClientStatus, Evaluation, EvaluationStatus, TaskEvent,
    TaskLifecycle, TaskState, EVENT_STARTED,
};

/// Coarse phase of a submission's rollout.
///
/// The first five variants are totally ordered; `Failed` and `Timeout` sit
/// outside that order and absorb every later observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RolloutStep {
    /// Submission accepted, evaluation not yet complete.
    Submitting,

    /// Evaluation complete, placement not yet visible.
    Scheduling,

    /// Allocation placed, artifacts being fetched.
    Pulling,

    /// All tasks running, waiting for them to settle.
    Starting,

    /// All tasks have been running past the health grace period.
    Healthy,

    /// The scheduler reported a failure.
    Failed,

    /// Tracking gave up before the rollout finished.
    Timeout,
}

impl RolloutStep {
    /// Position in the forward order, `None` for `Failed` and `Timeout`.
    pub fn position(&self) -> Option<u8> {
        match self {
            Self::Submitting => Some(0),
            Self::Scheduling => Some(1),
            Self::Pulling => Some(2),
            Self::Starting => Some(3),
            Self::Healthy => Some(4),
            Self::Failed | Self::Timeout => None,
        }
    }

    /// Progress percentage shown for this step.
    pub fn progress(&self) -> u8 {
        match self {
            Self::Submitting => 20,
            Self::Scheduling => 40,
            Self::Pulling => 60,
            Self::Starting => 80,
            Self::Healthy => 100,
            Self::Failed | Self::Timeout => 0,
        }
    }

    /// Returns true if no further step change is allowed after this one.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Healthy | Self::Failed | Self::Timeout)
    }

    /// Returns true for the two error terminals.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failed | Self::Timeout)
    }

    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitting => "submitting",
            Self::Scheduling => "scheduling",
            Self::Pulling => "pulling",
            Self::Starting => "starting",
            Self::Healthy => "healthy",
            Self::Failed => "failed",
            Self::Timeout => "timeout",
        }
    }

    /// Short description suitable for a progress line.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Submitting => "Submitting job",
            Self::Scheduling => "Scheduling",
            Self::Pulling => "Pulling image",
            Self::Starting => "Starting tasks",
            Self::Healthy => "Healthy",
            Self::Failed => "Failed",
            Self::Timeout => "Timed out",
        }
    }
}

impl std::fmt::Display for RolloutStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Apply the monotonic advancement rule.
///
/// Returns the step to move to, or `None` if `candidate` must be discarded:
/// the current step is already terminal, or `candidate` is a non-terminal
/// step at or behind the current one.
pub fn advance(current: RolloutStep, candidate: RolloutStep) -> Option<RolloutStep> {
    if current.is_terminal() {
        return None;
    }

    match (candidate.position(), current.position()) {
        (Some(next), Some(now)) if next <= now => None,
        _ => Some(candidate),
    }
}
