//! CLI application for payment registry reconciliation.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{config, extract, run};
use payreg_core::SourceKind;

/// Payment registry reconciliation - keep the АХЧ registry in sync with the
/// bank statement, the task tracker and PDF invoices
#[derive(Parser)]
#[command(name = "payreg")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Update payment statuses from the bank statement export
    Bank(run::RunArgs),

    /// Update statuses and fill references from the task-tracker export
    Tracker(run::RunArgs),

    /// Register PDF invoices not yet in the registry
    Invoices(run::RunArgs),

    /// Extract invoice fields from documents without touching the registry
    Extract(extract::ExtractArgs),

    /// Manage configuration
    Config(config::ConfigArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Bank(args) => run::run(SourceKind::BankStatement, args, config_path),
        Commands::Tracker(args) => run::run(SourceKind::TaskTracker, args, config_path),
        Commands::Invoices(args) => run::run(SourceKind::PdfInvoices, args, config_path),
        Commands::Extract(args) => extract::run(args),
        Commands::Config(args) => config::run(args, config_path),
    }
}
