//! cardslurp - Parallel Camera Card Offloader
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use cardslurp::config::{CliArgs, SlurpConfig};
use cardslurp::coordinator::{SlurpCoordinator, SlurpSummary};
use cardslurp::progress::{print_header, print_summary, ProgressReporter};
use clap::Parser;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Exit status for a run stopped by Ctrl-C (128 + SIGINT)
const EXIT_INTERRUPTED: u8 = 130;

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let args = CliArgs::parse();

    setup_logging(args.verbose)?;

    let config = SlurpConfig::from_args(args).context("Invalid configuration")?;

    if config.show_progress {
        print_header(&config.target_dir, &config.source_roots, config.worker_count);
    }

    let coordinator = SlurpCoordinator::new(config.clone());

    // Setup signal handler for graceful shutdown
    let shutdown_flag = coordinator.shutdown_flag();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, finishing in-flight copies...");
        shutdown_flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to set signal handler")?;

    let result = if config.show_progress {
        let progress = Arc::new(ProgressReporter::new());
        progress.set_status("Locating files...");

        let reporter = Arc::clone(&progress);
        let result = coordinator.run_with_progress(move |p| reporter.update(&p));

        match &result {
            Ok(summary) if summary.completed => progress.finish("Offload completed"),
            Ok(_) => progress.finish("Offload interrupted"),
            Err(_) => progress.finish("Offload failed"),
        }
        result
    } else {
        coordinator.run()
    };
    let summary = match result {
        Ok(summary) => summary,
        Err(e) => {
            if let Some(partial) = e.partial_summary() {
                print_summary(partial);
            }
            return Err(e).context("Offload failed");
        }
    };

    print_summary(&summary);

    if !summary.completed {
        info!("Offload was interrupted before completion");
    }

    if summary.has_minor_errors() {
        warn!(
            count = summary.minor_errors.len(),
            "Offload completed with verification errors"
        );
    }

    Ok(ExitCode::from(exit_status(&summary)))
}

fn exit_status(summary: &SlurpSummary) -> u8 {
    if summary.completed {
        0
    } else {
        EXIT_INTERRUPTED
    }
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
