//! Mica - AFM micrograph container splitter.
//!
//! Splits multi-frame instrument containers into per-channel,
//! per-scan-direction image series with full provenance metadata.

mod batch;
mod report;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use dialoguer::{theme::ColorfulTheme, Input};
use humansize::{format_size, BINARY};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use batch::{BatchOptions, BatchOutcome};
use report::{FileStatus, RunReport};

#[derive(Parser, Debug)]
#[command(name = "mica")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long)]
    input: Option<PathBuf>,

    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(short, long)]
    jobs: Option<usize>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    let input = match args.input {
        Some(dir) => dir,
        None => prompt_input_dir()?,
    };
    anyhow::ensure!(
        input.is_dir(),
        "Input path {} is not a directory",
        input.display()
    );
    // Outputs land next to the inputs unless redirected.
    let output = args.output.unwrap_or_else(|| input.clone());
    let jobs = args.jobs.unwrap_or_else(num_cpus::get);

    let started_at = Utc::now();
    let start = Instant::now();

    let options = BatchOptions {
        input: input.clone(),
        output: output.clone(),
        jobs,
    };
    let outcome = batch::run(&options, &running)?;

    let finished_at = Utc::now();
    print_summary(&outcome, start.elapsed().as_secs_f64());

    if !outcome.reports.is_empty() {
        let run_report = RunReport {
            started_at: started_at.to_rfc3339(),
            finished_at: finished_at.to_rfc3339(),
            input_dir: input.display().to_string(),
            output_dir: output.display().to_string(),
            files: outcome.reports,
        };
        let report_path = report::write_report(&output, &run_report)?;
        println!("[Batch] Report: {}", report_path.display());
    }

    Ok(())
}

fn prompt_input_dir() -> Result<PathBuf> {
    let dir: String = Input::with_theme(&ColorfulTheme::default())
        .with_prompt("Folder containing .jpk container files")
        .default(".".to_string())
        .interact_text()
        .context("Failed to read the input folder")?;
    Ok(PathBuf::from(dir))
}

fn print_summary(outcome: &BatchOutcome, elapsed_secs: f64) {
    println!();
    if outcome.cancelled {
        println!("[Batch] Interrupted - partial results below");
    }
    println!("[Batch] Containers processed: {}", outcome.reports.len());
    println!("[Batch] Units written:        {}", outcome.units_written());
    println!(
        "[Batch] Data processed:       {}",
        format_size(outcome.bytes_processed, BINARY)
    );
    println!("[Batch] Elapsed:              {:.1}s", elapsed_secs);

    let failed = outcome.files_failed();
    if failed > 0 {
        println!("[Batch] Failed containers:    {}", failed);
        for report in &outcome.reports {
            if report.status == FileStatus::Failed {
                println!(
                    "  {}: {}",
                    report.file,
                    report.error.as_deref().unwrap_or("unknown error")
                );
            }
        }
    }
}
