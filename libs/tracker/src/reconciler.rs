//! One read-and-classify pass for a session.

use std::time::Duration;

use chrono::Utc;
use rollwatch_id::{AllocationId, EvaluationId, JobId, Namespace};
use rollwatch_reconcile::{classify, Classification, EvaluationStatus, Observation};
use tracing::{debug, instrument};

use crate::reader::{ReadError, StatusReader};
use crate::session::TrackingSession;

/// Ids a poll needs, detached from the session so the read can outlive a
/// borrow of it.
#[derive(Debug, Clone)]
pub(crate) struct PollTarget {
    pub job_id: JobId,
    pub namespace: Namespace,
    pub evaluation_id: EvaluationId,
    pub allocation_id: Option<AllocationId>,
}

impl From<&TrackingSession> for PollTarget {
    fn from(session: &TrackingSession) -> Self {
        Self {
            job_id: session.job_id.clone(),
            namespace: session.namespace.clone(),
            evaluation_id: session.evaluation_id.clone(),
            allocation_id: session.allocation_id.clone(),
        }
    }
}

/// Read what the scheduler currently reports for a session and classify it.
///
/// Before placement this reads the evaluation, and the job's allocations
/// once the evaluation is complete. After placement only the tracked
/// allocation is read. Any read error aborts the whole pass.
pub async fn observe(
    reader: &dyn StatusReader,
    session: &TrackingSession,
    health_grace: Duration,
) -> Result<Classification, ReadError> {
    observe_target(reader, &PollTarget::from(session), health_grace).await
}

#[instrument(
    skip(reader, target, health_grace),
    fields(job_id = %target.job_id, evaluation_id = %target.evaluation_id)
)]
pub(crate) async fn observe_target(
    reader: &dyn StatusReader,
    target: &PollTarget,
    health_grace: Duration,
) -> Result<Classification, ReadError> {
    let classification = match &target.allocation_id {
        Some(allocation_id) => {
            let allocation = reader.allocation(allocation_id).await?;
            debug!(
                allocation_id = %allocation_id,
                client_status = %allocation.client_status,
                "Read allocation"
            );
            classify(Observation::Placed(&allocation), Utc::now(), health_grace)
        }
        None => {
            let evaluation = reader.evaluation(&target.evaluation_id).await?;
            debug!(status = %evaluation.status, "Read evaluation");

            let allocations = if evaluation.status == EvaluationStatus::Complete {
                reader
                    .job_allocations(&target.job_id, &target.namespace)
                    .await?
            } else {
                Vec::new()
            };

            classify(
                Observation::Unplaced {
                    evaluation: &evaluation,
                    allocations: &allocations,
                },
                Utc::now(),
                health_grace,
            )
        }
    };

    Ok(classification)
}
