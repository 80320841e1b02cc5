//! Sysfactsctl - machine reports and hardware identity on the command
//! line. Presentation only; all collection lives in the sysfacts crate.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use sysfacts::hwid::SysfsIdentitySource;
use sysfacts::{
    build_report_with_store, IdentificationAggregator, MachineIdentification, ReportEntry,
    DEFAULT_RUNTIME_STORE,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sysfactsctl", version, about = "Machine fact and identity reports")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Emit JSON instead of a table
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the full machine report (default)
    Report {
        /// Root of the runtime version store
        #[arg(long, default_value = DEFAULT_RUNTIME_STORE)]
        runtime_store: PathBuf,
    },
    /// Probe the machine's hardware identity
    Identify,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Report {
        runtime_store: PathBuf::from(DEFAULT_RUNTIME_STORE),
    }) {
        Commands::Report { runtime_store } => print_report(&runtime_store, cli.json),
        Commands::Identify => identify(cli.json).await,
    }
}

fn print_report(runtime_store: &Path, json: bool) -> Result<()> {
    let report = build_report_with_store(runtime_store);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let width = report.iter().map(|e| e.label.len()).max().unwrap_or(0);
    for ReportEntry { label, value } in &report {
        println!("{}  {}", format!("{:width$}", label).bold(), value);
    }

    Ok(())
}

async fn identify(json: bool) -> Result<()> {
    let aggregator = IdentificationAggregator::new(SysfsIdentitySource::new());
    let identification = aggregator.run().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&identification)?);
        return Ok(());
    }

    let MachineIdentification {
        cpu_id,
        gpu_id,
        hard_drive_id,
        mac_id,
        motherboard_id,
        machine_id,
    } = identification;

    let rows = [
        ("Machine id", machine_id),
        ("CPU id", cpu_id),
        ("GPU id", gpu_id),
        ("Hard drive id", hard_drive_id),
        ("MAC id", mac_id),
        ("Motherboard id", motherboard_id),
    ];

    let width = rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
    for (label, value) in rows {
        println!("{}  {}", format!("{:width$}", label).bold(), value);
    }

    Ok(())
}
