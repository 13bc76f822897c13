use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::classifier::SentimentClassifier;
use crate::domain::{BatchItem, BatchItemResult, DomainError, SentimentResult};

/// Error recorded for items whose text is blank.
pub const EMPTY_TEXT_ERROR: &str = "Empty text";

/// Anything that can score a single piece of text. Errors stay scoped to the item.
pub trait SentimentScorer: Send + Sync {
    fn score(&self, text: &str) -> Result<SentimentResult, DomainError>;
}

impl SentimentScorer for SentimentClassifier {
    fn score(&self, text: &str) -> Result<SentimentResult, DomainError> {
        Ok(self.classify(text))
    }
}

/// Runs a scorer over an ordered list of items, one result per item, in input order.
pub struct BatchRunner {
    scorer: Arc<dyn SentimentScorer>,
}

impl BatchRunner {
    pub fn new(scorer: Arc<dyn SentimentScorer>) -> Self {
        Self { scorer }
    }

    pub fn run(&self, items: impl IntoIterator<Item = BatchItem>) -> Vec<BatchItemResult> {
        let results: Vec<BatchItemResult> = items
            .into_iter()
            .enumerate()
            .map(|(position, item)| self.run_item(position, item))
            .collect();

        let failed = results.iter().filter(|r| r.is_error()).count();
        info!(total = results.len(), failed, "batch completed");
        results
    }

    fn run_item(&self, position: usize, item: BatchItem) -> BatchItemResult {
        let BatchItem { id, text } = item;

        if text.trim().is_empty() {
            debug!(position, %id, "skipping blank batch item");
            return BatchItemResult::failed(id, EMPTY_TEXT_ERROR);
        }

        let scorer = &self.scorer;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| scorer.score(&text)))
            .unwrap_or_else(|payload| Err(DomainError::other(panic_message(&*payload))));

        match outcome {
            Ok(result) => {
                debug!(position, %id, sentiment = %result.sentiment, "batch item scored");
                BatchItemResult::scored(id, result)
            }
            Err(err) => {
                warn!(position, %id, error = %err, "batch item failed");
                BatchItemResult::failed(id, err.to_string())
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("scorer panicked: {detail}")
}
