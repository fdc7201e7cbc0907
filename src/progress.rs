//! Progress reporting for an offload run
//!
//! Provides real-time progress display using indicatif progress bars.

use crate::coordinator::{SlurpProgress, SlurpSummary};
use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Progress reporter that displays copy status
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();

        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .expect("Invalid progress template")
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Update the progress display
    pub fn update(&self, progress: &SlurpProgress) {
        if progress.total == 0 {
            self.bar.set_message("Locating files...");
            return;
        }

        let msg = format!(
            "Files: {}/{} | Copied: {} | Skipped: {} | Retries: {} | Size: {} | Rate: {}/s",
            format_number(progress.finished()),
            format_number(progress.total),
            format_number(progress.copied),
            format_number(progress.skipped),
            progress.retries,
            format_size(progress.bytes, BINARY),
            format_size(progress.bytes_per_second() as u64, BINARY),
        );

        self.bar.set_message(msg);
    }

    /// Set a status message
    pub fn set_status(&self, status: &str) {
        self.bar.set_message(status.to_string());
    }

    /// Finish the progress display with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a number with thousands separators
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();

    let chunks: Vec<String> = bytes
        .chunks(3)
        .map(|chunk| chunk.iter().rev().map(|&b| b as char).collect::<String>())
        .collect();

    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

/// Print a summary of the run
pub fn print_summary(summary: &SlurpSummary) {
    let duration_secs = summary.duration.as_secs_f64();
    let rate = if duration_secs > 0.0 {
        summary.bytes_copied as f64 / duration_secs
    } else {
        0.0
    };

    println!();
    if summary.completed {
        println!("{}", style("Offload Complete").green().bold());
    } else if summary.files_failed > 0 {
        println!("{}", style("Offload Aborted").red().bold());
    } else {
        println!("{}", style("Offload Interrupted").yellow().bold());
    }
    println!("{}", style("─".repeat(50)).dim());

    for root in &summary.roots {
        println!(
            "  {} {} located, {} copied, {} skipped, {} retries",
            style(format!("{}:", root.root.display())).bold(),
            format_number(root.located),
            format_number(root.copied),
            format_number(root.skipped),
            root.retries,
        );
    }
    if summary.roots.len() > 1 {
        println!("{}", style("─".repeat(50)).dim());
    }

    println!("  {} {}", style("Copied:").bold(), format_number(summary.files_copied));
    println!("  {} {}", style("Skipped:").bold(), format_number(summary.files_skipped));
    if summary.files_failed > 0 {
        println!(
            "  {} {}",
            style("Failed:").bold(),
            style(format_number(summary.files_failed)).red()
        );
    }
    println!("  {} {}", style("Retries:").bold(), summary.retries);
    println!(
        "  {} {}",
        style("Total Size:").bold(),
        format_size(summary.bytes_copied, BINARY)
    );
    println!(
        "  {} {:.1}s ({}/s)",
        style("Duration:").bold(),
        duration_secs,
        format_size(rate as u64, BINARY)
    );

    if summary.has_minor_errors() {
        println!();
        println!(
            "{}",
            style(format!(
                "Errors found during processing ({}):",
                summary.minor_errors.len()
            ))
            .yellow()
            .bold()
        );
        for message in &summary.minor_errors {
            println!("  {}", message);
        }
    }
    println!();
}

/// Print a header at the start of the run
pub fn print_header(target: &Path, roots: &[PathBuf], workers: usize) {
    println!();
    println!(
        "{} {}",
        style("cardslurp").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    for root in roots {
        println!("  {} {}", style("Source:").bold(), root.display());
    }
    println!("  {} {}", style("Target:").bold(), target.display());
    println!("  {} {}", style("Workers:").bold(), workers);
    println!();
}
