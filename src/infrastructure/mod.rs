//! Infrastructure layer wiring concrete adapters (models, storage, ingestion).

pub mod http_client;
pub mod inference;
pub mod ingestion;
pub mod storage;

pub use http_client::SupabaseReviewStore;
pub use inference::load_artifact;
pub use ingestion::{CsvIngestor, IngestionSummary};
pub use storage::SledReviewStore;
