//! Bulk loading of review exports into the review store.

mod csv_loader;

pub use csv_loader::{CsvIngestor, CsvReviewRow, IngestionSummary, DEFAULT_PROGRESS_EVERY};
