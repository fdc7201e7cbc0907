//! xmpsafecopy - Verified sidecar replacement
//!
//! Backs up a shoot's sidecar files, then copies the edited ones over from
//! another copy of the same shoot.

use anyhow::{Context, Result};
use cardslurp::config::{SidecarArgs, SidecarConfig};
use cardslurp::content::FileComparator;
use cardslurp::sidecar::{run_sidecar_copy, SidecarSummary};
use clap::Parser;
use console::style;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let args = SidecarArgs::parse();
    setup_logging(args.verbose)?;

    let config = SidecarConfig::from_args(args).context("Invalid configuration")?;

    println!();
    println!(
        "{} {}",
        style("xmpsafecopy").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Source:").bold(), config.source_dir.display());
    println!("  {} {}", style("Target:").bold(), config.target_dir.display());
    println!("  {} .{}", style("Extension:").bold(), config.extension);
    if config.dry_run {
        println!("  {}", style("Dry run: nothing will be changed").yellow());
    }
    println!();

    let ops = FileComparator::new(config.buffer_size, config.verify_passes);
    let summary = run_sidecar_copy(&config, &ops).context("Sidecar copy failed")?;

    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &SidecarSummary) {
    println!();
    if summary.dry_run {
        println!("{}", style("Dry Run Complete").yellow().bold());
    } else {
        println!("{}", style("Sidecar Copy Complete").green().bold());
    }
    println!("{}", style("─".repeat(50)).dim());
    if let Some(ref dir) = summary.backup_dir {
        println!("  {} {}", style("Backup:").bold(), dir.display());
    }
    println!("  {} {}", style("Backed up:").bold(), summary.backed_up);
    println!("  {} {}", style("Copied:").bold(), summary.copied);
    println!();
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("cardslurp=debug,warn")
    } else {
        EnvFilter::new("cardslurp=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}
