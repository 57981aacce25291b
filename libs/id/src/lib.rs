//! # rollwatch-id
//!
//! Identifier types for the scheduler resources a rollout touches.
//!
//! ## Design Principles
//!
//! - IDs are produced by the orchestration service and are opaque here
//! - No format validation: whatever the submitter handed us is used verbatim
//! - IDs are typed so a job id can never be passed where an evaluation id
//!   is expected
//! - Serialization is transparent (a plain JSON string)
//!
//! ## Examples
//!
//! - `EvaluationId`: `5b1c6d2e-7d8a-4c3e-9a51-0e44b1f2c9aa`
//! - `JobId`: `web-frontend`
//! - `Namespace`: `default`

mod macros;
mod types;

pub use types::*;
