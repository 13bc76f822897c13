use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::batch_runner::{BatchRunner, SentimentScorer};
use super::classifier::SentimentClassifier;
use crate::{
    application::dtos::{HealthStatusResponse, ReanalysisSummary},
    domain::{
        BatchItem, BatchItemResult, DomainError, ReviewDetails, ReviewId, ReviewRecord, Sentiment,
        SentimentCounts, SentimentResult,
    },
};

/// Limits shared by the service and the HTTP layer.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub default_limit: usize,
    pub max_limit: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            default_limit: 100,
            max_limit: 1_000,
        }
    }
}

/// Contract for the table that keeps reviews and their sentiment labels.
pub trait ReviewStore: Send + Sync {
    /// Inserts a new row and returns it with the store-assigned `id` and `created_at`.
    fn insert(&self, record: &ReviewRecord) -> Result<ReviewRecord, DomainError>;

    /// Newest rows first.
    fn recent(&self, limit: usize) -> Result<Vec<ReviewRecord>, DomainError>;

    /// Rows whose `sentiment_score` is still empty.
    fn unlabeled(&self) -> Result<Vec<ReviewRecord>, DomainError>;

    fn update_sentiment(&self, id: &ReviewId, result: &SentimentResult)
        -> Result<(), DomainError>;

    /// The `sentiment_score` column of every row, used for statistics.
    fn sentiment_labels(&self) -> Result<Vec<Option<Sentiment>>, DomainError>;

    fn ping(&self) -> Result<(), DomainError>;

    fn name(&self) -> &'static str;
}

/// Orchestrates classification and persistence of reviews.
pub struct ReviewService {
    classifier: Arc<SentimentClassifier>,
    store: Arc<dyn ReviewStore>,
    batch: BatchRunner,
    config: ServiceConfig,
}

impl ReviewService {
    pub fn new(
        classifier: Arc<SentimentClassifier>,
        store: Arc<dyn ReviewStore>,
        config: ServiceConfig,
    ) -> Self {
        let scorer: Arc<dyn SentimentScorer> = Arc::clone(&classifier) as _;
        let batch = BatchRunner::new(scorer);
        Self {
            classifier,
            store,
            batch,
            config,
        }
    }

    pub fn classifier(&self) -> &SentimentClassifier {
        &self.classifier
    }

    /// Classifies a single text without persisting anything.
    pub fn predict(&self, text: &str) -> Result<SentimentResult, DomainError> {
        if text.trim().is_empty() {
            return Err(DomainError::validation("No text provided"));
        }
        Ok(self.classifier.classify(text))
    }

    /// Classifies a batch without persisting anything. Per-item failures stay in the results.
    pub fn predict_batch(
        &self,
        items: Vec<BatchItem>,
    ) -> Result<Vec<BatchItemResult>, DomainError> {
        if items.is_empty() {
            return Err(DomainError::validation("No reviews provided"));
        }
        Ok(self.batch.run(items))
    }

    /// Classifies a review and stores it together with its metadata.
    pub fn analyze_review(
        &self,
        details: ReviewDetails,
        review_text: &str,
    ) -> Result<(SentimentResult, ReviewRecord), DomainError> {
        let result = self.classifier.classify(review_text);
        let record = ReviewRecord::new(details, review_text, Some(result));
        let stored = self.store.insert(&record)?;

        info!(
            id = ?stored.id,
            sentiment = %result.sentiment,
            confidence = result.confidence,
            "review analyzed and saved"
        );
        Ok((result, stored))
    }

    pub fn list_reviews(&self, limit: Option<usize>) -> Result<Vec<ReviewRecord>, DomainError> {
        let capped = limit
            .unwrap_or(self.config.default_limit)
            .clamp(1, self.config.max_limit);
        self.store.recent(capped)
    }

    pub fn stats(&self) -> Result<SentimentCounts, DomainError> {
        let labels = self.store.sentiment_labels()?;
        Ok(SentimentCounts::tally(labels))
    }

    /// Labels every stored review that has no sentiment yet.
    ///
    /// Rows without an id or text are skipped; store failures abort and propagate.
    pub fn reanalyze_unlabeled(&self) -> Result<ReanalysisSummary, DomainError> {
        let pending = self.store.unlabeled()?;
        let total = pending.len();

        let mut ids = Vec::with_capacity(total);
        let mut items = Vec::with_capacity(total);
        for record in pending {
            if let Some(id) = record.id {
                items.push(BatchItem::new(id.clone(), record.review_text.unwrap_or_default()));
                ids.push(id);
            }
        }

        let mut summary = ReanalysisSummary {
            analyzed: 0,
            skipped: total - ids.len(),
        };

        for (id, outcome) in ids.iter().zip(self.batch.run(items)) {
            if let Some(error) = &outcome.error {
                warn!(%id, %error, "review skipped during re-analysis");
                summary.skipped += 1;
                continue;
            }
            self.store.update_sentiment(id, &outcome.as_result())?;
            summary.analyzed += 1;
        }

        info!(
            analyzed = summary.analyzed,
            skipped = summary.skipped,
            "re-analysis finished"
        );
        Ok(summary)
    }

    pub fn health(&self) -> Result<HealthStatusResponse, DomainError> {
        self.store.ping()?;

        Ok(HealthStatusResponse {
            status: "healthy".into(),
            service: "ulasan".into(),
            model_loaded: self.classifier.is_ready(),
            model: self.classifier.artifact().describe(),
            store: self.store.name().into(),
            checked_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI64, Ordering};

    use parking_lot::Mutex;

    use super::*;
    use crate::application::services::classifier::{
        ClassifierArtifact, Inference, InferenceModel, ModelInput,
    };
    use crate::domain::RawPrediction;

    /// Positive for texts mentioning "good", negative otherwise.
    struct KeywordModel;

    impl InferenceModel for KeywordModel {
        fn infer(&self, input: ModelInput<'_>) -> Result<Inference, DomainError> {
            let ModelInput::Text(text) = input else {
                return Err(DomainError::inference("text input expected"));
            };
            let index = if text.contains("good") { 2 } else { 0 };
            Ok(Inference {
                prediction: RawPrediction::Index(index),
                probabilities: Some(vec![0.9, 0.05, 0.05]),
            })
        }

        fn name(&self) -> &str {
            "keyword"
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        rows: Mutex<Vec<ReviewRecord>>,
        next_id: AtomicI64,
        fail_updates: bool,
    }

    impl ReviewStore for MemoryStore {
        fn insert(&self, record: &ReviewRecord) -> Result<ReviewRecord, DomainError> {
            let mut stored = record.clone();
            stored.id = Some(ReviewId::Int(self.next_id.fetch_add(1, Ordering::SeqCst) + 1));
            stored.created_at = Some(Utc::now());
            self.rows.lock().push(stored.clone());
            Ok(stored)
        }

        fn recent(&self, limit: usize) -> Result<Vec<ReviewRecord>, DomainError> {
            Ok(self.rows.lock().iter().rev().take(limit).cloned().collect())
        }

        fn unlabeled(&self) -> Result<Vec<ReviewRecord>, DomainError> {
            Ok(self
                .rows
                .lock()
                .iter()
                .filter(|r| r.is_unlabeled())
                .cloned()
                .collect())
        }

        fn update_sentiment(
            &self,
            id: &ReviewId,
            result: &SentimentResult,
        ) -> Result<(), DomainError> {
            if self.fail_updates {
                return Err(DomainError::storage("table is read-only"));
            }
            let mut rows = self.rows.lock();
            let row = rows
                .iter_mut()
                .find(|r| r.id.as_ref() == Some(id))
                .ok_or_else(|| DomainError::not_found(format!("review {id}")))?;
            row.apply_sentiment(*result);
            Ok(())
        }

        fn sentiment_labels(&self) -> Result<Vec<Option<Sentiment>>, DomainError> {
            Ok(self.rows.lock().iter().map(|r| r.sentiment_score).collect())
        }

        fn ping(&self) -> Result<(), DomainError> {
            Ok(())
        }

        fn name(&self) -> &'static str {
            "memory"
        }
    }

    fn service_with(store: Arc<MemoryStore>) -> ReviewService {
        let classifier = Arc::new(SentimentClassifier::new(ClassifierArtifact::loaded(
            Arc::new(KeywordModel),
        )));
        ReviewService::new(classifier, store, ServiceConfig::default())
    }

    fn unlabeled(text: &str) -> ReviewRecord {
        ReviewRecord::new(ReviewDetails::default(), text, None)
    }

    #[test]
    fn analyze_review_persists_sentiment() {
        let store = Arc::new(MemoryStore::default());
        let service = service_with(Arc::clone(&store));

        let details = ReviewDetails {
            business_name: Some("Barista Corner".into()),
            ..ReviewDetails::default()
        };
        let (result, stored) = service
            .analyze_review(details, "Really good espresso")
            .unwrap();

        assert_eq!(result, SentimentResult::new(Sentiment::Positive, 0.9));
        assert_eq!(stored.id, Some(ReviewId::Int(1)));
        assert_eq!(stored.sentiment_score, Some(Sentiment::Positive));
        assert_eq!(store.rows.lock().len(), 1);
    }

    #[test]
    fn predict_rejects_blank_text() {
        let service = service_with(Arc::new(MemoryStore::default()));
        assert!(matches!(
            service.predict("  "),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            service.predict_batch(Vec::new()),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn long_text_is_clipped_by_the_classifier_not_rejected() {
        let store = Arc::new(MemoryStore::default());
        let service = service_with(Arc::clone(&store));
        let long_text = "good ".repeat(4000);

        let predicted = service.predict(&long_text).unwrap();
        assert_eq!(predicted.sentiment, Sentiment::Positive);

        let (_, stored) = service
            .analyze_review(ReviewDetails::default(), &long_text)
            .unwrap();
        assert_eq!(stored.review_text.as_deref(), Some(long_text.as_str()));
        assert_eq!(store.rows.lock().len(), 1);
    }

    #[test]
    fn large_batches_are_scored_in_full() {
        let service = service_with(Arc::new(MemoryStore::default()));
        let items: Vec<BatchItem> = (0..1_500).map(|i| BatchItem::new(i, "good")).collect();

        let results = service.predict_batch(items).unwrap();
        assert_eq!(results.len(), 1_500);
        assert_eq!(results[1_499].id, serde_json::json!(1_499));
    }

    #[test]
    fn stats_count_labels() {
        let store = Arc::new(MemoryStore::default());
        let service = service_with(Arc::clone(&store));
        service.analyze_review(ReviewDetails::default(), "good").unwrap();
        service.analyze_review(ReviewDetails::default(), "awful").unwrap();
        store.insert(&unlabeled("pending")).unwrap();

        let counts = service.stats().unwrap();
        assert_eq!(counts.total, 3);
        assert_eq!(counts.positive, 1);
        assert_eq!(counts.negative, 1);
        assert_eq!(counts.neutral, 0);
    }

    #[test]
    fn reanalysis_labels_pending_rows_and_skips_blank_text() {
        let store = Arc::new(MemoryStore::default());
        store.insert(&unlabeled("good vibes")).unwrap();
        store.insert(&unlabeled("")).unwrap();
        store.insert(&unlabeled("cold food")).unwrap();
        let service = service_with(Arc::clone(&store));

        let summary = service.reanalyze_unlabeled().unwrap();

        assert_eq!(summary.analyzed, 2);
        assert_eq!(summary.skipped, 1);
        let rows = store.rows.lock();
        assert_eq!(rows[0].sentiment_score, Some(Sentiment::Positive));
        assert!(rows[1].is_unlabeled());
        assert_eq!(rows[2].sentiment_score, Some(Sentiment::Negative));
    }

    #[test]
    fn reanalysis_propagates_store_failures() {
        let store = Arc::new(MemoryStore {
            fail_updates: true,
            ..MemoryStore::default()
        });
        store.insert(&unlabeled("good")).unwrap();
        let service = service_with(store);

        assert!(matches!(
            service.reanalyze_unlabeled(),
            Err(DomainError::Storage(_))
        ));
    }

    #[test]
    fn list_limit_is_clamped() {
        let store = Arc::new(MemoryStore::default());
        for _ in 0..3 {
            store.insert(&unlabeled("x")).unwrap();
        }
        let service = ReviewService::new(
            Arc::new(SentimentClassifier::new(ClassifierArtifact::not_loaded("off"))),
            store,
            ServiceConfig {
                default_limit: 2,
                max_limit: 2,
            },
        );

        assert_eq!(service.list_reviews(None).unwrap().len(), 2);
        assert_eq!(service.list_reviews(Some(0)).unwrap().len(), 1);
        assert_eq!(service.list_reviews(Some(50)).unwrap().len(), 2);
    }

    #[test]
    fn health_reports_model_state() {
        let service = service_with(Arc::new(MemoryStore::default()));
        let health = service.health().unwrap();
        assert!(health.model_loaded);
        assert_eq!(health.model, "keyword");
        assert_eq!(health.store, "memory");
    }
}
