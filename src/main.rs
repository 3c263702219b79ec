//! Garden LCA digest CLI
//!
//! Usage:
//!   garden-lca-digest stats --csv gardenData.csv
//!   garden-lca-digest plots --csv gardenData.csv
//!   garden-lca-digest messages --csv gardenData.csv
//!   garden-lca-digest report --csv gardenData.csv --out report.md

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{Datelike, Local};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod error;
mod message;
mod models;
mod plot;
mod report;
mod stats;
mod table;

use message::{MessageConfig, Messenger, DEFAULT_SUBJECT};
use models::{DateAxis, ParticipantFailure};
use table::NormalizedTable;

#[derive(Parser)]
#[command(name = "garden-lca-digest")]
#[command(about = "Weekly garden life-cycle statistics, figures, and participant digests", long_about = None)]
struct Cli {
    /// Verbose logging (RUST_LOG overrides)
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print summary statistics for every participant
    Stats {
        #[arg(long)]
        csv: PathBuf,
        /// Calendar year the month/day columns belong to (defaults to the current year)
        #[arg(long)]
        year: Option<i32>,
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Render the two-panel water/produce figure for every participant
    Plots {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long)]
        year: Option<i32>,
        /// Parent directory for the dated output directory
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Compose personalized digest messages next to the rendered figures
    Messages {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long, default_value = ".")]
        out: PathBuf,
        /// Sender address stamped on each message
        #[arg(long, default_value = "garden-study@example.edu")]
        sender: String,
        #[arg(long, default_value = DEFAULT_SUBJECT)]
        subject: String,
    },
    /// Write a markdown run report
    Report {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Stats { csv, year, json } => {
            let (table, axis) = load(&csv, year)?;
            let outcome = stats::compute_stats(&table, &axis);

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome.records)?);
            } else {
                for record in outcome.records.iter() {
                    println!("{} ({})", record.participant, record.email);
                    for (name, value) in record.stats.entries() {
                        println!("  {name}: {value:.2}");
                    }
                }
            }
            print_failures(&outcome.failures);
        }
        Commands::Plots { csv, year, out } => {
            let (table, axis) = load(&csv, year)?;
            let set = plot::render_batch(&table, &axis, &out)?;
            println!(
                "Rendered {} figures into {}.",
                set.figures.len(),
                set.dir.display()
            );
            print_failures(&set.failures);
        }
        Commands::Messages {
            csv,
            year,
            out,
            sender,
            subject,
        } => {
            let (table, axis) = load(&csv, year)?;
            let outcome = stats::compute_stats(&table, &axis);
            let dir = out.join(plot::out_dir_name(&axis).context("table has no date columns")?);
            let messenger = Messenger::new(MessageConfig { sender, subject });

            let mut written = 0usize;
            let mut missing_figures = Vec::new();
            for record in outcome.records.iter() {
                let figure = plot::figure_path(&dir, &record.participant);
                if !figure.exists() {
                    missing_figures.push(record.participant.clone());
                    continue;
                }
                let message = messenger.compose(record, &figure);
                let path = message::message_path(&dir, &record.participant);
                std::fs::write(&path, &message.html_body)
                    .with_context(|| format!("writing {}", path.display()))?;
                println!("Composed digest for {} <{}>", record.participant, message.to);
                written += 1;
            }

            println!("Composed {} messages in {}.", written, dir.display());
            if !missing_figures.is_empty() {
                println!(
                    "No figure yet for: {} (run `plots` first).",
                    missing_figures.join(", ")
                );
            }
            print_failures(&outcome.failures);
        }
        Commands::Report { csv, year, out } => {
            let (table, axis) = load(&csv, year)?;
            let outcome = stats::compute_stats(&table, &axis);
            let report = report::build_report(&csv.display().to_string(), &axis, &outcome);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

/// Read, normalize, and date-index the dataset. The assumed year comes
/// from the caller; only here does the local clock supply a default.
fn load(csv: &Path, year: Option<i32>) -> anyhow::Result<(NormalizedTable, DateAxis)> {
    let raw =
        table::RawTable::from_path(csv).with_context(|| format!("reading {}", csv.display()))?;
    let table = table::normalize(&raw)?;
    let year = year.unwrap_or_else(|| Local::now().year());
    let axis = table::extract_date_axis(&table, year)?;
    Ok((table, axis))
}

fn print_failures(failures: &[ParticipantFailure]) {
    for failure in failures {
        println!("Skipped {}: {}", failure.participant, failure.error);
    }
}
