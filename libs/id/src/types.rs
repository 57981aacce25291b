//! Typed ID definitions for scheduler resources.
//!
//! The orchestration service owns these identifiers; rollwatch only carries
//! them between the submitter, the status endpoints and the renderer.

use crate::define_id;

// =============================================================================
// Submission
// =============================================================================

define_id!(JobId, "job");
define_id!(Namespace, "namespace");

// =============================================================================
// Scheduling
// =============================================================================

define_id!(EvaluationId, "evaluation");
define_id!(AllocationId, "allocation");

impl Namespace {
    /// The namespace the scheduler uses when none is specified.
    pub const DEFAULT: &'static str = "default";
}

impl Default for Namespace {
    fn default() -> Self {
        Self::new(Self::DEFAULT)
    }
}
