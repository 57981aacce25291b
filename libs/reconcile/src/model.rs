//! Scheduler records as returned by the status endpoints.
//!
//! Field names follow the orchestration service's JSON (PascalCase). Status
//! strings decode into closed enums with an `Other` fallback so a status
//! introduced by a newer scheduler never breaks decoding.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rollwatch_id::{AllocationId, EvaluationId, JobId, Namespace};
use serde::{Deserialize, Serialize};

/// Task event type recorded when a task's process has been started.
pub const EVENT_STARTED: &str = "Started";

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $wire:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum $name {
            $($variant,)+
            /// A value this client does not know about.
            Other(String),
        }

        impl $name {
            /// Wire representation.
            pub fn as_str(&self) -> &str {
                match self {
                    $(Self::$variant => $wire,)+
                    Self::Other(raw) => raw.as_str(),
                }
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                match raw.as_str() {
                    $($wire => Self::$variant,)+
                    _ => Self::Other(raw),
                }
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.as_str().to_string()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_enum! {
    /// Evaluation status.
    EvaluationStatus {
        Pending => "pending",
        Blocked => "blocked",
        Complete => "complete",
        Failed => "failed",
        Canceled => "canceled",
    }
}

wire_enum! {
    /// Client-side status of an allocation.
    ClientStatus {
        Pending => "pending",
        Running => "running",
        Complete => "complete",
        Failed => "failed",
        Lost => "lost",
        Unknown => "unknown",
    }
}

wire_enum! {
    /// Lifecycle state of a single task inside an allocation.
    TaskLifecycle {
        Pending => "pending",
        Running => "running",
        Dead => "dead",
    }
}

/// The scheduler's record of one scheduling attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Evaluation {
    #[serde(rename = "ID")]
    pub id: EvaluationId,

    pub status: EvaluationStatus,

    #[serde(default)]
    pub status_description: Option<String>,

    #[serde(rename = "JobID", default)]
    pub job_id: Option<JobId>,

    #[serde(default)]
    pub namespace: Option<Namespace>,
}

/// Allocation entry as returned by the job allocations listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AllocationStub {
    #[serde(rename = "ID")]
    pub id: AllocationId,

    pub create_index: u64,

    #[serde(default)]
    pub client_status: Option<ClientStatus>,

    #[serde(default)]
    pub task_group: Option<String>,
}

/// Detailed allocation record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Allocation {
    #[serde(rename = "ID")]
    pub id: AllocationId,

    pub client_status: ClientStatus,

    /// Task states keyed by task name. `null` until the client reports.
    #[serde(default)]
    pub task_states: Option<BTreeMap<String, TaskState>>,
}

impl Allocation {
    /// Iterate task states in task-name order.
    pub fn tasks(&self) -> impl Iterator<Item = (&str, &TaskState)> {
        self.task_states
            .iter()
            .flat_map(|states| states.iter())
            .map(|(name, state)| (name.as_str(), state))
    }
}

/// State of one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskState {
    pub state: TaskLifecycle,

    #[serde(default)]
    pub failed: bool,

    /// Ordered oldest first.
    #[serde(default)]
    pub events: Option<Vec<TaskEvent>>,
}

impl TaskState {
    /// The task's events, oldest first.
    pub fn events(&self) -> &[TaskEvent] {
        self.events.as_deref().unwrap_or_default()
    }

    /// Most recent `Started` event, if any.
    pub fn last_started(&self) -> Option<&TaskEvent> {
        self.events()
            .iter()
            .rev()
            .find(|event| event.event_type == EVENT_STARTED)
    }
}

/// A single entry in a task's event history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskEvent {
    #[serde(rename = "Type")]
    pub event_type: String,

    /// Unix time in nanoseconds.
    #[serde(default)]
    pub time: i64,

    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub display_message: String,
}

impl TaskEvent {
    /// Event time as a UTC timestamp.
    pub fn occurred_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(self.time)
    }

    /// The text an operator should see: display message, then message.
    pub fn text(&self) -> Option<&str> {
        [self.display_message.as_str(), self.message.as_str()]
            .into_iter()
            .find(|text| !text.is_empty())
    }
}
