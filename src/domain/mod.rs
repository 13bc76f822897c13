//! Domain layer: sentiment values, batch items and review records.

pub mod errors;
pub mod models;

pub use errors::DomainError;
pub use models::{
    BatchItem, BatchItemResult, RawPrediction, ReviewDetails, ReviewId, ReviewRecord, Sentiment,
    SentimentCounts, SentimentResult,
};
