//! # rollwatch-tracker
//!
//! Follows a submitted job through the scheduler by polling its status
//! endpoints and publishing a forward-only rollout snapshot.
//!
//! The pieces, leaf first:
//!
//! - [`StatusReader`]: read-only access to evaluations and allocations,
//!   implemented over HTTP by [`HttpStatusReader`]
//! - [`observe`]: one read-and-classify pass
//! - [`TrackingSession`]: the mutable session record and its advancement rule
//! - [`Tracker`]: start/stop/navigate entry points; owns the poll and
//!   deadline timers of the single active session
//!
//! Renderers read [`RolloutSnapshot`]s through [`Tracker::subscribe`] and
//! react to terminal outcomes through a [`RolloutObserver`].

mod config;
mod http;
mod reader;
mod reconciler;
mod session;
mod tracker;
mod worker;

pub use config::{ConfigError, TrackerConfig};
pub use http::{HttpStatusReader, SchedulerEndpoint};
pub use reader::{ReadError, StatusReader};
pub use reconciler::observe;
pub use session::{ResourceTarget, RolloutSnapshot, TrackingSession, TIMEOUT_MESSAGE};
pub use tracker::{NoopObserver, RolloutObserver, Tracker};

pub use rollwatch_id::{AllocationId, EvaluationId, JobId, Namespace};
pub use rollwatch_reconcile::{Classification, RolloutStep};
