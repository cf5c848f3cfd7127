use crate::core::models::{Scan, ScanStatus};
use crate::output::schema::ScanEnvelope;
use crate::utils::time::format_duration;
use anyhow::Result;
use colored::{ColoredString, Colorize};

pub fn status_label(status: ScanStatus) -> ColoredString {
    let label = status.as_str();
    match status {
        ScanStatus::Pending => label.yellow(),
        ScanStatus::Running => label.blue().bold(),
        ScanStatus::Completed => label.green().bold(),
        ScanStatus::Failed => label.red().bold(),
        ScanStatus::Cancelled => label.dimmed(),
    }
}

pub fn print_scan(scan: &Scan) {
    println!(
        "\n{} {}",
        "Scan".cyan().bold(),
        scan.id.to_string().cyan().bold()
    );
    println!("  {:<10} {}", "Status:", status_label(scan.status));
    println!("  {:<10} {} ({})", "Tool:", scan.tool, scan.scan_type);
    println!("  {:<10} {}", "Target:", scan.target);
    println!("  {:<10} {}", "Created:", scan.created_at.format("%Y-%m-%d %H:%M:%S UTC"));

    if let Some(started) = scan.started_at {
        println!("  {:<10} {}", "Started:", started.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if let Some(completed) = scan.completed_at {
        let took = scan
            .started_at
            .and_then(|started| (completed - started).to_std().ok())
            .map(|d| format!(" (took {})", format_duration(d)))
            .unwrap_or_default();
        println!(
            "  {:<10} {}{}",
            "Finished:",
            completed.format("%Y-%m-%d %H:%M:%S UTC"),
            took
        );
    }
    if let Some(task) = &scan.task_ref {
        println!("  {:<10} {}", "Task:", task.to_string().dimmed());
    }

    if let Some(envelope) = &scan.results {
        println!(
            "  {:<10} {} records, exit code {}",
            "Results:",
            envelope.result.record_count().to_string().green().bold(),
            envelope.meta.return_code
        );
    }
    if scan.parse_degraded {
        println!(
            "  {} tool output was not fully structured; results are best effort",
            "WARN".yellow().bold()
        );
    }
    if let Some(message) = &scan.error_message {
        println!("  {} {}", "ERR".red().bold(), message);
    }
}

pub fn print_results(envelope: &ScanEnvelope) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(envelope)?);
    Ok(())
}

pub fn print_success(message: &str) {
    println!("{} {}", "OK".green().bold(), message);
}

pub fn print_warning(message: &str) {
    eprintln!("{} {}", "WARN".yellow().bold(), message);
}
