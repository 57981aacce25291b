//! Output formatting for CLI commands.

use colored::{ColoredString, Colorize};
use rollwatch_tracker::{RolloutSnapshot, RolloutStep};
use serde::Serialize;
use tabled::{Table, Tabled};

const CLI_SCHEMA_VERSION: &str = "rollwatch.cli.v1";

/// Width of the progress bar in cells.
const BAR_WIDTH: usize = 20;

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON format.
    Json,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Self {
        match value {
            "json" => Self::Json,
            _ => Self::Table,
        }
    }
}

/// Print rows as a table, or as a JSON array.
pub fn print_output<T: Serialize + Tabled>(data: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if data.is_empty() {
                println!("{}", "No items found.".dimmed());
            } else {
                println!("{}", Table::new(data));
            }
        }
        OutputFormat::Json => println!("{}", format_json(data, "[]", true)),
    }
}

/// Print a single item as pretty JSON.
pub fn print_single<T: Serialize>(data: &T) {
    println!("{}", format_json(data, "{}", true));
}

/// Print one item as a single JSON line.
pub fn print_json_line<T: Serialize>(data: &T) {
    println!("{}", json_line(data));
}

/// One item as schema-wrapped JSON on a single line.
pub fn json_line<T: Serialize>(data: &T) -> String {
    format_json(data, "{}", false)
}

/// Success message line.
pub fn success_line(message: &str) -> String {
    format!("{} {}", "Success:".green().bold(), message)
}

/// Info message line.
pub fn info_line(message: &str) -> String {
    format!("{} {}", "Info:".blue().bold(), message)
}

/// Print a rollout snapshot in the requested format.
pub fn print_snapshot(snapshot: &RolloutSnapshot, format: OutputFormat) {
    match format {
        OutputFormat::Table => println!("{}", progress_line(snapshot)),
        OutputFormat::Json => print_json_line(snapshot),
    }
}

/// Human-readable progress line for a snapshot.
pub fn progress_line(snapshot: &RolloutSnapshot) -> String {
    let mut line = format!(
        "{} {:>3}%  {}",
        progress_bar(snapshot.progress),
        snapshot.progress,
        step_label(snapshot.step),
    );

    if let Some(allocation_id) = &snapshot.allocation_id {
        line.push_str(&format!("  {}", format!("alloc {}", allocation_id.short()).dimmed()));
    }

    if let Some(message) = &snapshot.error_message {
        line.push_str(&format!("\n  {}", message));
    }

    line
}

/// Fixed-width bar, e.g. `[########------------]`.
pub fn progress_bar(progress: u8) -> String {
    let filled = (usize::from(progress.min(100)) * BAR_WIDTH) / 100;
    format!(
        "[{}{}]",
        "#".repeat(filled),
        "-".repeat(BAR_WIDTH - filled)
    )
}

fn step_label(step: RolloutStep) -> ColoredString {
    match step {
        RolloutStep::Healthy => step.describe().green().bold(),
        RolloutStep::Failed | RolloutStep::Timeout => step.describe().red().bold(),
        _ => step.describe().cyan(),
    }
}

fn format_json<T: Serialize + ?Sized>(data: &T, fallback: &str, pretty: bool) -> String {
    let value = serde_json::to_value(data).unwrap_or_else(|_| serde_json::json!({}));
    let wrapped = sort_json_value(wrap_with_schema(value));

    let rendered = if pretty {
        serde_json::to_string_pretty(&wrapped)
    } else {
        serde_json::to_string(&wrapped)
    };
    rendered.unwrap_or_else(|_| fallback.to_string())
}

fn wrap_with_schema(value: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "schemaVersion": CLI_SCHEMA_VERSION,
        "data": value
    })
}

fn sort_json_value(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Array(values) => {
            serde_json::Value::Array(values.into_iter().map(sort_json_value).collect())
        }
        serde_json::Value::Object(entries) => {
            let mut pairs: Vec<_> = entries.into_iter().collect();
            pairs.sort_by(|a, b| a.0.cmp(&b.0));
            let mut mapped = serde_json::Map::new();
            for (key, value) in pairs {
                mapped.insert(key, sort_json_value(value));
            }
            serde_json::Value::Object(mapped)
        }
        other => other,
    }
}
