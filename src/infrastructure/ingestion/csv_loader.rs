use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, warn};

use crate::application::ReviewService;
use crate::domain::{DomainError, ReviewDetails};

pub const DEFAULT_PROGRESS_EVERY: usize = 100;

/// One line of a scraped review export. Every column is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CsvReviewRow {
    #[serde(default)]
    pub business_name: Option<String>,
    #[serde(default)]
    pub business_category: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub latitude: Option<String>,
    #[serde(default)]
    pub longitude: Option<String>,
    #[serde(default)]
    pub reviewer_name: Option<String>,
    #[serde(default)]
    pub review_rating: Option<String>,
    #[serde(default)]
    pub review_text: Option<String>,
    #[serde(default)]
    pub review_date: Option<String>,
    #[serde(default)]
    pub price_per_person: Option<String>,
    #[serde(default)]
    pub meal_type: Option<String>,
}

impl CsvReviewRow {
    pub fn into_parts(self) -> (ReviewDetails, String) {
        let details = ReviewDetails {
            business_name: self.business_name,
            business_category: self.business_category,
            city: self.city,
            address: self.address,
            latitude: parse_number(self.latitude.as_deref()),
            longitude: parse_number(self.longitude.as_deref()),
            reviewer_name: self.reviewer_name,
            review_rating: parse_number(self.review_rating.as_deref()).map(|r| r.round() as i32),
            review_date: self.review_date,
            meal_type: self.meal_type,
            price_per_person: self.price_per_person,
        };
        (details, self.review_text.unwrap_or_default())
    }
}

fn parse_number(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestionSummary {
    pub rows: usize,
    pub loaded: usize,
    pub failed: usize,
}

/// Classifies and stores each CSV row in file order. A bad row is logged and skipped.
pub struct CsvIngestor {
    service: Arc<ReviewService>,
    progress_every: usize,
}

impl CsvIngestor {
    pub fn new(service: Arc<ReviewService>) -> Self {
        Self {
            service,
            progress_every: DEFAULT_PROGRESS_EVERY,
        }
    }

    pub fn with_progress_every(mut self, every: usize) -> Self {
        self.progress_every = every.max(1);
        self
    }

    pub fn ingest_path(&self, path: impl AsRef<Path>) -> Result<IngestionSummary, DomainError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|err| {
            DomainError::validation(format!("cannot open {}: {err}", path.display()))
        })?;
        info!(path = %path.display(), "loading reviews from csv");
        self.ingest_reader(BufReader::new(file))
    }

    pub fn ingest_reader<R: Read>(&self, reader: R) -> Result<IngestionSummary, DomainError> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        csv_reader
            .headers()
            .map_err(|err| DomainError::validation(format!("unreadable csv header: {err}")))?;

        let mut summary = IngestionSummary::default();
        for (index, row) in csv_reader.deserialize::<CsvReviewRow>().enumerate() {
            summary.rows += 1;

            let outcome = row
                .map_err(|err| DomainError::validation(format!("malformed row: {err}")))
                .and_then(|row| {
                    let (details, text) = row.into_parts();
                    self.service.analyze_review(details, &text)
                });

            match outcome {
                Ok(_) => summary.loaded += 1,
                Err(err) => {
                    warn!(row = index, error = %err, "error loading row, skipping");
                    summary.failed += 1;
                }
            }

            if progress_due(summary.rows, self.progress_every) {
                info!(
                    processed = summary.rows,
                    loaded = summary.loaded,
                    "loaded reviews"
                );
            }
        }

        info!(
            rows = summary.rows,
            loaded = summary.loaded,
            failed = summary.failed,
            "csv load finished"
        );
        Ok(summary)
    }
}

/// Progress is keyed on processed rows, so skipped rows do not shift the cadence.
fn progress_due(processed: usize, every: usize) -> bool {
    processed > 0 && processed % every == 0
}
