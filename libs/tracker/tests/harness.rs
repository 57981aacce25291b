//! Test harness for tracker integration tests.
//!
//! Provides a scripted in-memory Status Reader and a recording observer.

#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use rollwatch_reconcile::{
    Allocation, AllocationStub, ClientStatus, Evaluation, EvaluationStatus, TaskEvent,
    TaskLifecycle, TaskState,
};
use rollwatch_tracker::{
    AllocationId, EvaluationId, JobId, Namespace, ReadError, ResourceTarget, RolloutObserver,
    RolloutSnapshot, StatusReader,
};

/// One scripted response; `Err` becomes a transient read failure.
pub type Scripted<T> = Result<T, &'static str>;

/// Responses served in order; the last one repeats forever.
struct Script<T> {
    steps: VecDeque<Scripted<T>>,
}

impl<T: Clone> Script<T> {
    fn new(steps: Vec<Scripted<T>>) -> Self {
        Self {
            steps: steps.into(),
        }
    }

    fn next(&mut self) -> Result<T, ReadError> {
        let step = if self.steps.len() > 1 {
            self.steps.pop_front()
        } else {
            self.steps.front().cloned()
        };

        match step {
            Some(Ok(value)) => Ok(value),
            Some(Err(message)) => Err(ReadError::Other(message.to_string())),
            None => Err(ReadError::Other("no scripted response".to_string())),
        }
    }
}

/// A recorded reader call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Evaluation(String),
    JobAllocations(String, String),
    Allocation(String),
}

/// Status Reader that replays scripted responses.
pub struct ScriptedReader {
    evaluations: Mutex<Script<Evaluation>>,
    allocation_lists: Mutex<Script<Vec<AllocationStub>>>,
    allocations: Mutex<Script<Allocation>>,
    latency: Duration,
    calls: Mutex<Vec<Call>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedReader {
    pub fn new() -> Self {
        Self {
            evaluations: Mutex::new(Script::new(vec![])),
            allocation_lists: Mutex::new(Script::new(vec![])),
            allocations: Mutex::new(Script::new(vec![])),
            latency: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn evaluations(self, steps: Vec<Scripted<Evaluation>>) -> Self {
        *self.evaluations.lock().unwrap() = Script::new(steps);
        self
    }

    pub fn allocation_lists(self, steps: Vec<Scripted<Vec<AllocationStub>>>) -> Self {
        *self.allocation_lists.lock().unwrap() = Script::new(steps);
        self
    }

    pub fn allocations(self, steps: Vec<Scripted<Allocation>>) -> Self {
        *self.allocations.lock().unwrap() = Script::new(steps);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn evaluation_calls(&self, id: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| **c == Call::Evaluation(id.to_string()))
            .count()
    }

    pub fn job_allocation_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::JobAllocations(..)))
            .count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn exit(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl StatusReader for ScriptedReader {
    async fn evaluation(&self, id: &EvaluationId) -> Result<Evaluation, ReadError> {
        self.enter(Call::Evaluation(id.to_string())).await;
        let result = self.evaluations.lock().unwrap().next();
        self.exit();
        result
    }

    async fn job_allocations(
        &self,
        job_id: &JobId,
        namespace: &Namespace,
    ) -> Result<Vec<AllocationStub>, ReadError> {
        self.enter(Call::JobAllocations(job_id.to_string(), namespace.to_string()))
            .await;
        let result = self.allocation_lists.lock().unwrap().next();
        self.exit();
        result
    }

    async fn allocation(&self, id: &AllocationId) -> Result<Allocation, ReadError> {
        self.enter(Call::Allocation(id.to_string())).await;
        let result = self.allocations.lock().unwrap().next();
        self.exit();
        result
    }
}

/// What an observer was told.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observed {
    Completed(RolloutSnapshot),
    Error(String),
    Navigated(ResourceTarget),
}

/// Observer that records every callback.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<Observed>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<Observed> {
        self.events.lock().unwrap().clone()
    }
}

impl RolloutObserver for RecordingObserver {
    fn on_complete(&self, snapshot: &RolloutSnapshot) {
        self.events
            .lock()
            .unwrap()
            .push(Observed::Completed(snapshot.clone()));
    }

    fn on_error(&self, message: &str) {
        self.events
            .lock()
            .unwrap()
            .push(Observed::Error(message.to_string()));
    }

    fn navigate(&self, target: &ResourceTarget) {
        self.events
            .lock()
            .unwrap()
            .push(Observed::Navigated(target.clone()));
    }
}

// =============================================================================
// Record builders
// =============================================================================

pub fn evaluation(status: EvaluationStatus) -> Evaluation {
    Evaluation {
        id: EvaluationId::new("eval-1"),
        status,
        status_description: None,
        job_id: Some(JobId::new("web")),
        namespace: Some(Namespace::default()),
    }
}

pub fn stub(id: &str, create_index: u64) -> AllocationStub {
    AllocationStub {
        id: AllocationId::new(id),
        create_index,
        client_status: Some(ClientStatus::Pending),
        task_group: Some("web".to_string()),
    }
}

pub fn started_event(at: DateTime<Utc>) -> TaskEvent {
    TaskEvent {
        event_type: "Started".to_string(),
        time: at.timestamp_nanos_opt().unwrap(),
        message: String::new(),
        display_message: "Task started by client".to_string(),
    }
}

fn allocation_with(id: &str, status: ClientStatus, tasks: Vec<(&str, TaskState)>) -> Allocation {
    Allocation {
        id: AllocationId::new(id),
        client_status: status,
        task_states: Some(
            tasks
                .into_iter()
                .map(|(name, state)| (name.to_string(), state))
                .collect::<BTreeMap<_, _>>(),
        ),
    }
}

pub fn pending_allocation(id: &str) -> Allocation {
    allocation_with(id, ClientStatus::Pending, vec![])
}

/// Running allocation whose single task started long ago.
pub fn settled_allocation(id: &str) -> Allocation {
    let started = Utc::now() - TimeDelta::hours(1);
    allocation_with(
        id,
        ClientStatus::Running,
        vec![(
            "server",
            TaskState {
                state: TaskLifecycle::Running,
                failed: false,
                events: Some(vec![started_event(started)]),
            },
        )],
    )
}

/// Running allocation whose single task will not be healthy any time soon.
pub fn fresh_allocation(id: &str) -> Allocation {
    let started = Utc::now() + TimeDelta::hours(1);
    allocation_with(
        id,
        ClientStatus::Running,
        vec![(
            "server",
            TaskState {
                state: TaskLifecycle::Running,
                failed: false,
                events: Some(vec![started_event(started)]),
            },
        )],
    )
}

pub fn failed_allocation(id: &str, task: &str, display_message: &str) -> Allocation {
    allocation_with(
        id,
        ClientStatus::Failed,
        vec![(
            task,
            TaskState {
                state: TaskLifecycle::Dead,
                failed: true,
                events: Some(vec![TaskEvent {
                    event_type: "Driver Failure".to_string(),
                    time: Utc::now().timestamp_nanos_opt().unwrap(),
                    message: String::new(),
                    display_message: display_message.to_string(),
                }]),
            },
        )],
    )
}
