//! Bulk-loads a review CSV export into the configured review store.
//!
//! Usage:
//!   load-csv --file preprocessed_reviews.csv --progress-every 100

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::info;

use ulasan_lib::infrastructure::{ingestion::DEFAULT_PROGRESS_EVERY, CsvIngestor};

#[derive(Parser, Debug)]
#[command(name = "load-csv")]
#[command(about = "Classify every review in a CSV file and store it")]
struct Args {
    /// CSV file with a header row (business_name, review_text, ...)
    #[arg(short, long)]
    file: PathBuf,

    /// Log progress after this many loaded rows
    #[arg(long, default_value_t = DEFAULT_PROGRESS_EVERY)]
    progress_every: usize,
}

fn main() -> Result<()> {
    let args = Args::parse();
    ulasan_lib::init_tracing();

    let handles = ulasan_lib::build_environment().context("failed to initialise environment")?;
    info!(store = handles.store.name(), file = %args.file.display(), "loading reviews");

    let summary = CsvIngestor::new(handles.service)
        .with_progress_every(args.progress_every)
        .ingest_path(&args.file)
        .map_err(|err| anyhow!(err.to_string()))?;

    info!(
        rows = summary.rows,
        loaded = summary.loaded,
        failed = summary.failed,
        "CSV data loaded"
    );
    Ok(())
}
