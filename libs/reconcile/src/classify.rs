//! Step classification.
//!
//! Everything this crate knows about what "placed", "running" and
//! "healthy" mean lives here. Functions are pure: the caller supplies the
//! records and the wall-clock instant to judge them against.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use rollwatch_id::AllocationId;

use crate::model::{
    Allocation, AllocationStub, ClientStatus, Evaluation, EvaluationStatus, TaskEvent,
    TaskLifecycle, TaskState,
};
use crate::RolloutStep;

/// How long a task must have been started before it counts as healthy.
pub const DEFAULT_HEALTH_GRACE: Duration = Duration::from_millis(3000);

const NO_NODES_MESSAGE: &str = "No nodes available";
const EVALUATION_FAILED_MESSAGE: &str = "Evaluation failed";
const ALLOCATION_FAILED_MESSAGE: &str = "Allocation failed";
const TASK_FAILED_MESSAGE: &str = "Task failed";

/// What one poll observed.
#[derive(Debug, Clone, Copy)]
pub enum Observation<'a> {
    /// No allocation is tracked yet. `allocations` is only consulted when
    /// the evaluation is complete and may be empty otherwise.
    Unplaced {
        evaluation: &'a Evaluation,
        allocations: &'a [AllocationStub],
    },

    /// The tracked allocation's detailed record.
    Placed(&'a Allocation),
}

/// Result of classifying one observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Nothing new can be concluded.
    Unchanged,

    /// Candidate step, plus the allocation discovered by this observation.
    Advance {
        step: RolloutStep,
        allocation_id: Option<AllocationId>,
    },

    /// The scheduler reported a failure.
    Failed { message: String },
}

impl Classification {
    fn step(step: RolloutStep) -> Self {
        Self::Advance {
            step,
            allocation_id: None,
        }
    }

    /// Candidate step carried by this classification, if any.
    pub fn candidate(&self) -> Option<RolloutStep> {
        match self {
            Self::Unchanged => None,
            Self::Advance { step, .. } => Some(*step),
            Self::Failed { .. } => Some(RolloutStep::Failed),
        }
    }
}

/// Coarse reading of an evaluation before any allocation is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvaluationOutcome {
    /// Still being processed.
    Waiting,

    /// Scheduling failed; not retried.
    Failed(String),

    /// Placement finished; look up the job's allocations.
    Placed,
}

/// Classify an evaluation record.
pub fn classify_evaluation(evaluation: &Evaluation) -> EvaluationOutcome {
    match &evaluation.status {
        EvaluationStatus::Blocked => EvaluationOutcome::Failed(NO_NODES_MESSAGE.to_string()),
        EvaluationStatus::Failed => {
            let message = evaluation
                .status_description
                .as_deref()
                .filter(|desc| !desc.is_empty())
                .unwrap_or(EVALUATION_FAILED_MESSAGE);
            EvaluationOutcome::Failed(message.to_string())
        }
        EvaluationStatus::Complete => EvaluationOutcome::Placed,
        _ => EvaluationOutcome::Waiting,
    }
}

/// Pick the most recent placement: highest create index, later entries
/// winning ties.
pub fn select_allocation(allocations: &[AllocationStub]) -> Option<&AllocationStub> {
    allocations.iter().max_by_key(|alloc| alloc.create_index)
}

/// Classify one observation.
pub fn classify(
    observation: Observation<'_>,
    now: DateTime<Utc>,
    health_grace: Duration,
) -> Classification {
    match observation {
        Observation::Unplaced {
            evaluation,
            allocations,
        } => match classify_evaluation(evaluation) {
            EvaluationOutcome::Waiting => Classification::Unchanged,
            EvaluationOutcome::Failed(message) => Classification::Failed { message },
            EvaluationOutcome::Placed => match select_allocation(allocations) {
                Some(stub) => Classification::Advance {
                    step: RolloutStep::Pulling,
                    allocation_id: Some(stub.id.clone()),
                },
                None => Classification::step(RolloutStep::Scheduling),
            },
        },
        Observation::Placed(allocation) => classify_allocation(allocation, now, health_grace),
    }
}

/// Classify the tracked allocation.
pub fn classify_allocation(
    allocation: &Allocation,
    now: DateTime<Utc>,
    health_grace: Duration,
) -> Classification {
    match &allocation.client_status {
        ClientStatus::Failed => Classification::Failed {
            message: failure_message(allocation),
        },
        ClientStatus::Pending => Classification::step(RolloutStep::Pulling),
        ClientStatus::Running => {
            // An allocation whose client has not reported task states yet
            // is treated as still pulling.
            let mut tasks = allocation.tasks().peekable();
            if tasks.peek().is_none() {
                return Classification::step(RolloutStep::Pulling);
            }

            let tasks: Vec<&TaskState> = tasks.map(|(_, task)| task).collect();
            if !tasks.iter().all(|task| task.state == TaskLifecycle::Running) {
                return Classification::step(RolloutStep::Pulling);
            }

            if tasks
                .iter()
                .all(|task| task_is_healthy(task, now, health_grace))
            {
                Classification::step(RolloutStep::Healthy)
            } else {
                Classification::step(RolloutStep::Starting)
            }
        }
        _ => Classification::Unchanged,
    }
}

/// A task is healthy once its most recent `Started` event is older than
/// the grace period.
pub fn task_is_healthy(task: &TaskState, now: DateTime<Utc>, health_grace: Duration) -> bool {
    let Ok(grace) = TimeDelta::from_std(health_grace) else {
        return false;
    };

    task.last_started()
        .map(TaskEvent::occurred_at)
        .is_some_and(|started| now - started > grace)
}

/// Message for a failed allocation, from the first dead-and-failed task.
pub fn failure_message(allocation: &Allocation) -> String {
    allocation
        .tasks()
        .find(|(_, task)| task.state == TaskLifecycle::Dead && task.failed)
        .map(|(name, task)| {
            let detail = task
                .events()
                .last()
                .and_then(TaskEvent::text)
                .unwrap_or(TASK_FAILED_MESSAGE);
            format!("Task \"{name}\" failed: {detail}")
        })
        .unwrap_or_else(|| ALLOCATION_FAILED_MESSAGE.to_string())
}
