//! Track command - follow a submission to its terminal outcome.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use rollwatch_tracker::{
    EvaluationId, JobId, Namespace, ResourceTarget, RolloutObserver, RolloutSnapshot, Tracker,
    TrackerConfig,
};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::CliError;
use crate::output::{info_line, json_line, print_snapshot, success_line, OutputFormat};

use super::CommandContext;

/// Track command - render a rollout as it progresses.
#[derive(Debug, Args)]
pub struct TrackCommand {
    /// Job ID the evaluation belongs to.
    job_id: String,

    /// Evaluation ID returned by the job submission.
    #[arg(long = "eval")]
    evaluation_id: String,

    /// Poll interval in milliseconds.
    #[arg(long)]
    poll_ms: Option<u64>,

    /// Give up after this many milliseconds.
    #[arg(long)]
    deadline_ms: Option<u64>,
}

/// Terminal outcomes forwarded from the tracker.
#[derive(Debug)]
enum Outcome {
    Completed(RolloutSnapshot),
    Failed,
    Navigate(ResourceTarget),
}

struct ChannelObserver(mpsc::UnboundedSender<Outcome>);

impl RolloutObserver for ChannelObserver {
    fn on_complete(&self, snapshot: &RolloutSnapshot) {
        let _ = self.0.send(Outcome::Completed(snapshot.clone()));
    }

    fn on_error(&self, _message: &str) {
        let _ = self.0.send(Outcome::Failed);
    }

    fn navigate(&self, target: &ResourceTarget) {
        let _ = self.0.send(Outcome::Navigate(target.clone()));
    }
}

impl TrackCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let config = self.tracker_config()?;
        let reader = Arc::new(ctx.reader()?);
        let (outcome_tx, mut outcomes) = mpsc::unbounded_channel();

        let tracker = Tracker::with_observer(reader, config, Arc::new(ChannelObserver(outcome_tx)));
        let mut updates = tracker.subscribe();

        tracker.start_tracking(
            JobId::new(self.job_id),
            ctx.namespace(),
            EvaluationId::new(self.evaluation_id),
        );

        let mut renderer = Renderer::new(ctx.format);
        if let Some(snapshot) = tracker.snapshot() {
            renderer.render(&snapshot);
        }

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                biased;

                _ = &mut ctrl_c => {
                    tracker.stop_tracking();
                    renderer.stopped();
                    return Ok(());
                }

                changed = updates.changed() => {
                    if changed.is_err() {
                        return Err(anyhow::anyhow!("Tracker stopped unexpectedly"));
                    }
                    let snapshot = updates.borrow_and_update().clone();
                    if let Some(snapshot) = snapshot {
                        renderer.render(&snapshot);
                    }
                }

                outcome = outcomes.recv() => match outcome {
                    Some(Outcome::Completed(snapshot)) => {
                        renderer.render(&snapshot);
                        renderer.completed(&snapshot);
                    }
                    Some(Outcome::Navigate(target)) => {
                        renderer.navigated(&target, &ctx.detail_url(&target));
                        return Ok(());
                    }
                    Some(Outcome::Failed) => {
                        let Some(snapshot) = tracker.snapshot() else {
                            return Err(anyhow::anyhow!("Rollout ended without a result"));
                        };
                        renderer.render(&snapshot);
                        let message = snapshot.error_message.unwrap_or_default();
                        return Err(CliError::rollout(snapshot.step, message).into());
                    }
                    None => return Err(anyhow::anyhow!("Tracker stopped unexpectedly")),
                },
            }
        }
    }

    fn tracker_config(&self) -> Result<TrackerConfig, CliError> {
        let mut config = TrackerConfig::from_env()?;

        if let Some(ms) = self.poll_ms {
            config = config.with_poll_interval(Duration::from_millis(ms));
        }
        if let Some(ms) = self.deadline_ms {
            config = config.with_deadline(Duration::from_millis(ms));
        }

        config.validate()?;
        Ok(config)
    }
}

/// Where a finished rollout can be inspected, as emitted in JSON mode.
#[derive(Debug, Serialize)]
struct Navigation<'a> {
    job_id: &'a JobId,
    namespace: &'a Namespace,
    url: &'a str,
}

/// Prints each distinct snapshot once.
///
/// In JSON mode stdout carries one JSON object per line and nothing else.
struct Renderer {
    format: OutputFormat,
    last: Option<RolloutSnapshot>,
}

impl Renderer {
    fn new(format: OutputFormat) -> Self {
        Self { format, last: None }
    }

    fn render(&mut self, snapshot: &RolloutSnapshot) {
        if self.last.as_ref() == Some(snapshot) {
            debug!(step = %snapshot.step, "Snapshot already rendered");
            return;
        }

        print_snapshot(snapshot, self.format);
        self.last = Some(snapshot.clone());
    }

    fn completed(&self, snapshot: &RolloutSnapshot) {
        if let Some(line) = self.completion_line(snapshot) {
            println!("{}", line);
        }
    }

    fn navigated(&self, target: &ResourceTarget, url: &str) {
        println!("{}", self.navigation_line(target, url));
    }

    fn stopped(&self) {
        match self.format {
            OutputFormat::Table => println!(
                "{}",
                info_line("Stopped tracking; the job keeps running on the scheduler.")
            ),
            OutputFormat::Json => info!("Stopped tracking"),
        }
    }

    fn completion_line(&self, snapshot: &RolloutSnapshot) -> Option<String> {
        match self.format {
            OutputFormat::Table => Some(success_line(&format!(
                "Job {} is healthy",
                snapshot.job_id
            ))),
            OutputFormat::Json => None,
        }
    }

    fn navigation_line(&self, target: &ResourceTarget, url: &str) -> String {
        match self.format {
            OutputFormat::Table => info_line(&format!("View job: {}", url)),
            OutputFormat::Json => json_line(&Navigation {
                job_id: &target.job_id,
                namespace: &target.namespace,
                url,
            }),
        }
    }
}
