//! Error handling and display for the CLI.

use colored::Colorize;
use rollwatch_tracker::{ConfigError, ReadError, RolloutStep};
use thiserror::Error;

/// Exit code for a rollout that failed.
pub const EXIT_FAILED: i32 = 2;

/// Exit code for a rollout that did not finish before the deadline.
pub const EXIT_TIMEOUT: i32 = 3;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Rollout {step}: {message}")]
    Rollout { step: RolloutStep, message: String },

    #[error("Scheduler error: {0}")]
    Read(#[from] ReadError),

    #[error("Invalid tracker configuration: {0}")]
    Config(#[from] ConfigError),
}

impl CliError {
    /// Create an error for a rollout that ended in `failed` or `timeout`.
    pub fn rollout(step: RolloutStep, message: impl Into<String>) -> Self {
        Self::Rollout {
            step,
            message: message.into(),
        }
    }
}

/// Process exit code for an error.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<CliError>() {
        Some(CliError::Rollout {
            step: RolloutStep::Timeout,
            ..
        }) => EXIT_TIMEOUT,
        Some(CliError::Rollout { .. }) => EXIT_FAILED,
        _ => 1,
    }
}

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {}", "Error:".red().bold(), err);

    if let Some(hint) = hint(err) {
        eprintln!("\n{}", format!("Hint: {}", hint).yellow());
    }
}

fn hint(err: &anyhow::Error) -> Option<&'static str> {
    let read_err = match err.downcast_ref::<CliError>() {
        Some(CliError::Read(read_err)) => read_err,
        Some(CliError::Rollout {
            step: RolloutStep::Timeout,
            ..
        }) => return Some("Run `rollctl probe` later to check on the job."),
        _ => err.downcast_ref::<ReadError>()?,
    };

    match read_err {
        ReadError::Network(_) => {
            Some("Check that the scheduler is reachable at NOMAD_ADDR or --address.")
        }
        ReadError::InvalidAddress(_) => Some("Addresses look like http://127.0.0.1:4646."),
        ReadError::Status { status: 401, .. } | ReadError::Status { status: 403, .. } => {
            Some("Check the ACL token in NOMAD_TOKEN or --token.")
        }
        ReadError::NotFound { .. } => {
            Some("Check the job, evaluation and allocation ids, and --namespace.")
        }
        _ => None,
    }
}
