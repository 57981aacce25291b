//! rollctl - track scheduler rollouts from the terminal
//!
//! Renders the rollout tracker: step, progress, and the terminal outcome
//! of a job submission.

use clap::Parser;

mod commands;
mod config;
mod error;
mod logging;
mod output;

use commands::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.log_level(), cli.log_json()) {
        error::print_error(&e);
        std::process::exit(1);
    }

    if let Err(e) = cli.run().await {
        error::print_error(&e);
        std::process::exit(error::exit_code(&e));
    }
}
