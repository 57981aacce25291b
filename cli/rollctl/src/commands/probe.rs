//! Probe command - classify a submission once.
//!
//! Runs a single read-and-classify pass with no timers, showing the step
//! the tracker would derive right now.

use anyhow::Result;
use clap::Args;
use rollwatch_tracker::{
    observe, AllocationId, EvaluationId, JobId, RolloutSnapshot, TrackerConfig, TrackingSession,
};
use serde::Serialize;
use tabled::Tabled;

use crate::error::CliError;
use crate::output::{print_output, print_single, OutputFormat};

use super::CommandContext;

/// Probe command - one classification pass.
#[derive(Debug, Args)]
pub struct ProbeCommand {
    /// Job ID the evaluation belongs to.
    job_id: String,

    /// Evaluation ID returned by the job submission.
    #[arg(long = "eval")]
    evaluation_id: String,

    /// Classify this allocation instead of selecting one.
    #[arg(long = "alloc")]
    allocation_id: Option<String>,
}

#[derive(Debug, Serialize, Tabled)]
struct ProbeRow {
    #[tabled(rename = "FIELD")]
    field: &'static str,
    #[tabled(rename = "VALUE")]
    value: String,
}

impl ProbeCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let config = TrackerConfig::from_env().map_err(CliError::from)?;
        let reader = ctx.reader()?;

        let mut session = TrackingSession::new(
            JobId::new(self.job_id),
            ctx.namespace(),
            EvaluationId::new(self.evaluation_id),
        );
        session.allocation_id = self.allocation_id.map(AllocationId::new);

        let classification = observe(&reader, &session, config.health_grace)
            .await
            .map_err(CliError::from)?;
        session.apply(classification);

        let snapshot = session.snapshot();
        match ctx.format {
            OutputFormat::Json => print_single(&snapshot),
            OutputFormat::Table => print_output(&probe_rows(&snapshot), ctx.format),
        }

        Ok(())
    }
}

fn probe_rows(snapshot: &RolloutSnapshot) -> Vec<ProbeRow> {
    let mut rows = vec![
        ProbeRow {
            field: "Job",
            value: format!("{} ({})", snapshot.job_id, snapshot.namespace),
        },
        ProbeRow {
            field: "Evaluation",
            value: snapshot.evaluation_id.to_string(),
        },
        ProbeRow {
            field: "Allocation",
            value: snapshot
                .allocation_id
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "-".to_string()),
        },
        ProbeRow {
            field: "Step",
            value: snapshot.step.to_string(),
        },
        ProbeRow {
            field: "Progress",
            value: format!("{}%", snapshot.progress),
        },
    ];

    if let Some(message) = &snapshot.error_message {
        rows.push(ProbeRow {
            field: "Message",
            value: message.clone(),
        });
    }

    rows
}
