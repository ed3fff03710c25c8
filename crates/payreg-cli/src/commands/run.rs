//! Reconciliation commands: `bank`, `tracker` and `invoices`.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use payreg_core::{Pipeline, RunReport, SourceKind};

/// Arguments shared by the reconciliation commands.
#[derive(Args)]
pub struct RunArgs {
    /// Working directory holding the registry and the source files
    #[arg(default_value = ".")]
    dir: PathBuf,

    /// Print the full run report as JSON
    #[arg(long)]
    json: bool,
}

pub fn run(kind: SourceKind, args: RunArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = super::load_config(config_path)?;

    if !args.dir.is_dir() {
        anyhow::bail!("Directory not found: {}", args.dir.display());
    }
    info!("Reconciling {} in {}", kind, args.dir.display());

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    spinner.set_message(format!("Reconciling {kind}..."));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = Pipeline::new(config).run(kind, &args.dir);
    spinner.finish_and_clear();
    let report = result?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_report(&report);
    println!(
        "   {} in {:?}",
        if report.persisted {
            style("registry updated").green()
        } else {
            style("registry unchanged").yellow()
        },
        start.elapsed()
    );
    Ok(())
}

fn print_report(report: &RunReport) {
    println!("{} {}", style("✓").green(), report.message());

    if let Some(path) = &report.registry_path {
        println!("   Registry: {}", path.display());
    }
    if report.duplicates_dropped > 0 {
        println!("   {} duplicate source rows ignored", report.duplicates_dropped);
    }

    if !report.parse_failures.is_empty() {
        println!();
        println!("{}", style("Unparseable cells:").yellow());
        for failure in &report.parse_failures {
            println!("  - {}", failure);
        }
    }

    if !report.warnings.is_empty() {
        println!();
        println!("{}", style("Warnings:").yellow());
        for warning in &report.warnings {
            println!("  - {}", warning);
        }
    }
}
