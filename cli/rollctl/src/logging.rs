//! Diagnostic logging to stderr.
//!
//! stdout carries rendered output only, so log lines never interleave with
//! JSON snapshots.

use std::io;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Level used when neither `RUST_LOG` nor `--log-level` is set.
pub const DEFAULT_LEVEL: &str = "warn";

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `level` when set.
pub fn init(level: &str, json: bool) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .with_context(|| format!("Invalid log level '{}'", level))?,
    };

    let layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_writer(io::stderr)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(layer.with_filter(filter))
        .try_init()
        .context("Failed to install log subscriber")?;

    Ok(())
}
