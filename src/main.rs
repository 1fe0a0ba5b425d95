mod config;
mod output;
mod source;

use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use timetree_core::constants::PRODUCT_ID;
use timetree_core::{ExportOptions, ExportReport, SkipReason};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "timetree-exporter", version)]
#[command(about = "Convert TimeTree events to iCal format")]
struct Cli {
    /// Path to the output iCal file (default: ./timetree.ics)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Increase output verbosity
    #[arg(short, long)]
    verbose: bool,

    /// Calendar id to export (default: first active calendar)
    #[arg(long)]
    calendar: Option<String>,

    /// Convert events from a saved JSON file instead of fetching them
    #[arg(long)]
    input: Option<PathBuf>,

    /// Fallback timezone for timestamps without one (e.g. Asia/Tokyo)
    #[arg(long)]
    timezone: Option<String>,

    /// Config file (default: ~/.config/timetree-exporter/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let settings = config::load_config(cli.config.as_deref())?.resolve(
        cli.timezone,
        cli.output,
        cli.calendar,
    )?;

    let batch = match cli.input {
        Some(ref path) => source::read_input_file(path)?,
        None => {
            let credentials = config::credentials_from_env()?;
            source::fetch_remote(&credentials, settings.calendar.as_deref()).await?
        }
    };

    tracing::info!("Found {} events", batch.records.len());

    let options = ExportOptions {
        fallback_timezone: settings.timezone,
        product_id: PRODUCT_ID.to_string(),
        calendar_name: batch.calendar_name,
        generated_at: Utc::now(),
    };
    let export = timetree_core::export(&batch.records, &options)?;
    log_report(&export.report);

    // Nothing touches the output path until the whole document is rendered
    let contents = timetree_core::serialize(&export.document)?;
    let path = output::write_atomic(&settings.output, &contents)?;

    tracing::info!("The .ics calendar file is saved to {}", path.display());

    Ok(())
}

fn log_report(report: &ExportReport) {
    for skipped in &report.skipped {
        let id = skipped.id.as_deref().unwrap_or("<no id>");
        match skipped.reason {
            SkipReason::Unsupported(_) => {
                tracing::debug!("Skipped event #{} ({}): {}", skipped.index, id, skipped.reason)
            }
            SkipReason::Invalid(_) | SkipReason::DuplicateId => {
                tracing::warn!("Skipped event #{} ({}): {}", skipped.index, id, skipped.reason)
            }
        }
    }

    for warning in &report.warnings {
        tracing::warn!("{}", warning);
    }

    tracing::info!(
        "A total of {}/{} events are added to the calendar",
        report.converted,
        report.total
    );
}
