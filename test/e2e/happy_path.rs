//! End-to-end rollout tracking against a mock scheduler.
//!
//! Drives the tracker through the real HTTP Status Reader, verifying:
//!
//! 1. Evaluation pending, then complete
//! 2. Newest allocation selected from the job's list
//! 3. Allocation pending, then healthy
//! 4. Completion callback and navigation to the job view
//!
//! plus the failed and timed-out endings.
//!
//! ## Running
//!
//! ```bash
//! cargo test -p rollwatch-e2e --test happy_path
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use rollwatch_reconcile::RolloutStep;
use rollwatch_tracker::{
    EvaluationId, HttpStatusReader, JobId, Namespace, ResourceTarget, RolloutObserver,
    RolloutSnapshot, SchedulerEndpoint, Tracker, TrackerConfig, TIMEOUT_MESSAGE,
};
use serde_json::json;
use tokio::sync::mpsc;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "e2e-token";

/// How long a test waits for a terminal outcome.
const OUTCOME_WAIT: Duration = Duration::from_secs(10);

#[derive(Debug)]
enum Outcome {
    Completed(RolloutSnapshot),
    Error(String),
    Navigate(ResourceTarget),
}

struct ChannelObserver(mpsc::UnboundedSender<Outcome>);

impl RolloutObserver for ChannelObserver {
    fn on_complete(&self, snapshot: &RolloutSnapshot) {
        let _ = self.0.send(Outcome::Completed(snapshot.clone()));
    }

    fn on_error(&self, message: &str) {
        let _ = self.0.send(Outcome::Error(message.to_string()));
    }

    fn navigate(&self, target: &ResourceTarget) {
        let _ = self.0.send(Outcome::Navigate(target.clone()));
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("rollwatch_tracker=debug")
        .with_test_writer()
        .try_init();
}

fn fast_config() -> TrackerConfig {
    TrackerConfig::default()
        .with_initial_delay(Duration::from_millis(10))
        .with_poll_interval(Duration::from_millis(50))
        .with_settle_delay(Duration::from_millis(20))
        .with_deadline(Duration::from_secs(5))
}

fn tracker_for(
    server: &MockServer,
    config: TrackerConfig,
) -> (Tracker, mpsc::UnboundedReceiver<Outcome>) {
    let endpoint = SchedulerEndpoint::new(server.uri()).with_token(Some(TOKEN.to_string()));
    let reader = HttpStatusReader::new(&endpoint).unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    let tracker = Tracker::with_observer(Arc::new(reader), config, Arc::new(ChannelObserver(tx)));
    (tracker, rx)
}

async fn next_outcome(outcomes: &mut mpsc::UnboundedReceiver<Outcome>) -> Outcome {
    tokio::time::timeout(OUTCOME_WAIT, outcomes.recv())
        .await
        .expect("timed out waiting for rollout outcome")
        .expect("observer channel closed")
}

fn nanos(at: chrono::DateTime<Utc>) -> i64 {
    at.timestamp_nanos_opt().unwrap()
}

async fn mount_evaluation(server: &MockServer, status: &str, times: Option<u64>) {
    let mock = Mock::given(method("GET"))
        .and(path("/v1/evaluation/eval-1"))
        .and(header("x-nomad-token", TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ID": "eval-1",
            "Status": status,
            "StatusDescription": "",
            "JobID": "web",
            "Namespace": "default"
        })));

    match times {
        Some(n) => mock.up_to_n_times(n).with_priority(1).mount(server).await,
        None => mock.mount(server).await,
    }
}

async fn mount_allocation_list(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/v1/job/web/allocations"))
        .and(query_param("namespace", "default"))
        .and(header("x-nomad-token", TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn happy_path() {
    init_tracing();
    let server = MockServer::start().await;

    // Step 1: evaluation pending twice, then complete
    mount_evaluation(&server, "pending", Some(2)).await;
    mount_evaluation(&server, "complete", None).await;

    // Step 2: two allocations, the newer one is tracked
    mount_allocation_list(
        &server,
        json!([
            { "ID": "alloc-old", "CreateIndex": 5, "ClientStatus": "complete", "TaskGroup": "web" },
            { "ID": "alloc-new", "CreateIndex": 9, "ClientStatus": "pending", "TaskGroup": "web" }
        ]),
    )
    .await;

    // Step 3: allocation pending once, then running past the grace period
    Mock::given(method("GET"))
        .and(path("/v1/allocation/alloc-new"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ID": "alloc-new",
            "ClientStatus": "pending",
            "TaskStates": null
        })))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/allocation/alloc-new"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ID": "alloc-new",
            "ClientStatus": "running",
            "TaskStates": {
                "server": {
                    "State": "running",
                    "Failed": false,
                    "Events": [
                        { "Type": "Received", "Time": nanos(Utc::now() - TimeDelta::minutes(61)) },
                        { "Type": "Started", "Time": nanos(Utc::now() - TimeDelta::minutes(60)) }
                    ]
                }
            }
        })))
        .mount(&server)
        .await;

    let (tracker, mut outcomes) = tracker_for(&server, fast_config());
    let mut updates = tracker.subscribe();
    tracker.start_tracking(
        JobId::new("web"),
        Namespace::default(),
        EvaluationId::new("eval-1"),
    );

    // Step 4: completion then navigation
    match next_outcome(&mut outcomes).await {
        Outcome::Completed(snapshot) => {
            assert_eq!(snapshot.step, RolloutStep::Healthy);
            assert_eq!(snapshot.progress, 100);
            assert_eq!(snapshot.allocation_id.unwrap().as_str(), "alloc-new");
        }
        other => panic!("expected completion, got {other:?}"),
    }

    match next_outcome(&mut outcomes).await {
        Outcome::Navigate(target) => assert_eq!(target.ui_path(), "/ui/jobs/web@default"),
        other => panic!("expected navigation, got {other:?}"),
    }

    assert!(tracker.snapshot().is_none());
    assert!(!tracker.is_tracking());
    assert!(updates.has_changed().unwrap());
    assert!(updates.borrow_and_update().is_none());

    // The list endpoint is read exactly once
    let requests = server.received_requests().await.unwrap();
    let list_reads = requests
        .iter()
        .filter(|r| r.url.path() == "/v1/job/web/allocations")
        .count();
    assert_eq!(list_reads, 1);
    assert!(!requests
        .iter()
        .any(|r| r.url.path() == "/v1/allocation/alloc-old"));
}

#[tokio::test]
async fn failed_allocation() {
    init_tracing();
    let server = MockServer::start().await;

    mount_evaluation(&server, "complete", None).await;
    mount_allocation_list(
        &server,
        json!([{ "ID": "alloc-1", "CreateIndex": 3, "ClientStatus": "pending" }]),
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/v1/allocation/alloc-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ID": "alloc-1",
            "ClientStatus": "failed",
            "TaskStates": {
                "web": {
                    "State": "dead",
                    "Failed": true,
                    "Events": [
                        { "Type": "Received", "Time": nanos(Utc::now()), "DisplayMessage": "Task received by client" },
                        { "Type": "Driver Failure", "Time": nanos(Utc::now()), "DisplayMessage": "image pull error" }
                    ]
                }
            }
        })))
        .mount(&server)
        .await;

    let (tracker, mut outcomes) = tracker_for(&server, fast_config());
    tracker.start_tracking(
        JobId::new("web"),
        Namespace::default(),
        EvaluationId::new("eval-1"),
    );

    match next_outcome(&mut outcomes).await {
        Outcome::Error(message) => assert_eq!(message, "Task \"web\" failed: image pull error"),
        other => panic!("expected failure, got {other:?}"),
    }

    let snapshot = tracker.snapshot().unwrap();
    assert_eq!(snapshot.step, RolloutStep::Failed);
    assert_eq!(snapshot.progress, 0);
    assert!(!tracker.is_tracking());

    let target = tracker.navigate_to_resource().unwrap();
    assert_eq!(target.job_id.as_str(), "web");
    assert!(tracker.snapshot().is_none());
}

#[tokio::test]
async fn evaluation_never_completes() {
    init_tracing();
    let server = MockServer::start().await;

    mount_evaluation(&server, "pending", None).await;

    let config = fast_config().with_deadline(Duration::from_millis(300));
    let (tracker, mut outcomes) = tracker_for(&server, config);
    tracker.start_tracking(
        JobId::new("web"),
        Namespace::default(),
        EvaluationId::new("eval-1"),
    );

    match next_outcome(&mut outcomes).await {
        Outcome::Error(message) => assert_eq!(message, TIMEOUT_MESSAGE),
        other => panic!("expected timeout, got {other:?}"),
    }

    let snapshot = tracker.snapshot().unwrap();
    assert_eq!(snapshot.step, RolloutStep::Timeout);
    assert_eq!(snapshot.error_message.as_deref(), Some(TIMEOUT_MESSAGE));

    // No reads after the deadline
    let reads = server.received_requests().await.unwrap().len();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(server.received_requests().await.unwrap().len(), reads);
}
