//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a table from a list of items
#[allow(dead_code)]
pub fn print_table<T: Tabled + Serialize>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("{}", "No items found".yellow());
                return;
            }
            let table = Table::new(items).with(Style::rounded()).to_string();
            println!("{}", table);
        }
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(&items) {
                println!("{}", json);
            }
        }
    }
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format a power value as watts
pub fn format_watts(watts: f64) -> String {
    format!("{:.2} W", watts)
}

/// Format an energy value as watt-hours
pub fn format_wh(wh: f64) -> String {
    if wh.abs() < 0.1 {
        format!("{:.1} mWh", wh * 1000.0)
    } else {
        format!("{:.3} Wh", wh)
    }
}

/// Format a [0, 1] fraction as a percentage
pub fn format_percent(fraction: f64) -> String {
    format!("{:.1}%", fraction * 100.0)
}

/// Format an ISO timestamp for display
pub fn format_timestamp(ts: &str) -> String {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(ts) {
        dt.format("%Y-%m-%d %H:%M:%S").to_string()
    } else {
        ts.to_string()
    }
}

/// Color an experiment phase by how far the run has progressed
pub fn color_phase(phase: &str) -> String {
    match phase {
        "idle" | "warming_up" => phase.yellow().to_string(),
        "running" => phase.green().to_string(),
        "cooling_down" => phase.cyan().to_string(),
        "stopped" => phase.blue().to_string(),
        "failed" => phase.red().to_string(),
        _ => phase.to_string(),
    }
}

/// Color alignment coverage by quality
pub fn color_coverage(coverage: f64) -> String {
    let formatted = format_percent(coverage);
    if coverage >= 0.9 {
        formatted.green().to_string()
    } else if coverage >= 0.5 {
        formatted.yellow().to_string()
    } else {
        formatted.red().to_string()
    }
}
