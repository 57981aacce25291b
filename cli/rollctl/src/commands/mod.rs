//! CLI commands.

mod probe;
mod track;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rollwatch_tracker::{HttpStatusReader, Namespace, ResourceTarget, SchedulerEndpoint};

use crate::config::Config;
use crate::error::CliError;
use crate::logging;
use crate::output::OutputFormat;

/// rollctl - Track job rollouts on the scheduler.
#[derive(Debug, Parser)]
#[command(name = "rollctl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format (table or json).
    #[arg(long, global = true, default_value = "table")]
    format: String,

    /// Scheduler HTTP API address.
    #[arg(long, global = true, env = "NOMAD_ADDR")]
    address: Option<String>,

    /// ACL token sent with every request.
    #[arg(long, global = true, env = "NOMAD_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Namespace of the tracked job.
    #[arg(long, global = true, env = "NOMAD_NAMESPACE")]
    namespace: Option<String>,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, global = true, env = "ROLLWATCH_LOG_LEVEL", default_value = logging::DEFAULT_LEVEL)]
    log_level: String,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Follow a submission until it is healthy, fails, or times out.
    Track(track::TrackCommand),

    /// Classify a submission once, without tracking it.
    Probe(probe::ProbeCommand),

    /// Show CLI version.
    Version,
}

impl Cli {
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn log_json(&self) -> bool {
        self.log_json
    }

    /// Run the CLI command.
    pub async fn run(self) -> Result<()> {
        let format = OutputFormat::parse(&self.format);

        if let Commands::Version = self.command {
            println!("rollctl {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }

        let config = Config::load()?.with_overrides(self.address, self.token, self.namespace);
        let ctx = CommandContext { config, format };

        match self.command {
            Commands::Track(cmd) => cmd.run(ctx).await,
            Commands::Probe(cmd) => cmd.run(ctx).await,
            Commands::Version => Ok(()),
        }
    }
}

/// Shared command context.
pub struct CommandContext {
    pub config: Config,
    pub format: OutputFormat,
}

impl CommandContext {
    /// Get a Status Reader for the configured scheduler.
    pub fn reader(&self) -> Result<HttpStatusReader> {
        let endpoint =
            SchedulerEndpoint::new(self.config.address()).with_token(self.config.token.clone());
        HttpStatusReader::new(&endpoint).map_err(|e| CliError::from(e).into())
    }

    pub fn namespace(&self) -> Namespace {
        Namespace::new(self.config.namespace())
    }

    /// Web UI URL of a job detail view.
    pub fn detail_url(&self, target: &ResourceTarget) -> String {
        format!("{}{}", self.config.address(), target.ui_path())
    }
}
