//! Status Reader seam.

use async_trait::async_trait;
use rollwatch_id::{AllocationId, EvaluationId, JobId, Namespace};
use rollwatch_reconcile::{Allocation, AllocationStub, Evaluation};
use thiserror::Error;

/// Errors from reading scheduler status.
///
/// None of these are classification inputs: the tracker skips the poll
/// that produced them.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("scheduler returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("failed to decode {kind}: {message}")]
    Decode { kind: &'static str, message: String },

    #[error("invalid scheduler address '{0}'")]
    InvalidAddress(String),

    #[error("{0}")]
    Other(String),
}

impl ReadError {
    /// Returns true if the requested record does not exist (yet).
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Read-only access to the scheduler records a rollout is derived from.
///
/// Implementations perform I/O only; they never interpret what they read.
#[async_trait]
pub trait StatusReader: Send + Sync + 'static {
    /// Fetch an evaluation by id.
    async fn evaluation(&self, id: &EvaluationId) -> Result<Evaluation, ReadError>;

    /// List the allocations of a job.
    async fn job_allocations(
        &self,
        job_id: &JobId,
        namespace: &Namespace,
    ) -> Result<Vec<AllocationStub>, ReadError>;

    /// Fetch one allocation with its task states.
    async fn allocation(&self, id: &AllocationId) -> Result<Allocation, ReadError>;
}
