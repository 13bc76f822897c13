use std::path::Path;

use chrono::Utc;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use sled::{Config, Db, IVec, Tree};

use crate::{
    application::services::ReviewStore,
    domain::{DomainError, ReviewId, ReviewRecord, Sentiment, SentimentResult},
};

const REVIEWS_TREE: &str = "reviews";

/// Embedded review table backed by `sled`.
///
/// Rows are stored as JSON under big-endian integer keys taken from sled's
/// monotonic id generator, so key order follows insertion order.
pub struct SledReviewStore {
    db: Db,
    reviews: Tree,
    write_lock: Mutex<()>,
}

impl SledReviewStore {
    /// Opens (or creates) a sled database rooted at `data_dir`.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self, DomainError> {
        let dir = data_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|err| {
            DomainError::storage(format!("failed to create data directory {:?}: {err}", dir))
        })?;

        let db = Config::default()
            .path(&dir)
            .cache_capacity(16 * 1024 * 1024)
            .open()
            .map_err(|err| DomainError::storage(format!("failed to open sled db: {err}")))?;

        let reviews = db
            .open_tree(REVIEWS_TREE)
            .map_err(|err| DomainError::storage(format!("failed to open reviews tree: {err}")))?;

        Ok(Self {
            db,
            reviews,
            write_lock: Mutex::new(()),
        })
    }

    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, DomainError> {
        serde_json::to_vec(value)
            .map_err(|err| DomainError::storage(format!("serialization error: {err}")))
    }

    fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, DomainError> {
        serde_json::from_slice(bytes)
            .map_err(|err| DomainError::storage(format!("deserialization error: {err}")))
    }

    fn encode_key(id: i64) -> [u8; 8] {
        id.to_be_bytes()
    }

    fn key_for(id: &ReviewId) -> Result<[u8; 8], DomainError> {
        match id {
            ReviewId::Int(value) => Ok(Self::encode_key(*value)),
            ReviewId::Text(value) => value
                .trim()
                .parse::<i64>()
                .map(Self::encode_key)
                .map_err(|_| DomainError::not_found(format!("review {value}"))),
        }
    }

    fn decode_record(bytes: &IVec) -> Result<ReviewRecord, DomainError> {
        Self::deserialize(bytes.as_ref())
    }

    fn all_records(&self) -> Result<Vec<ReviewRecord>, DomainError> {
        self.reviews
            .iter()
            .map(|entry| {
                let (_, value) = entry.map_err(|err| {
                    DomainError::storage(format!("failed to read review record: {err}"))
                })?;
                Self::decode_record(&value)
            })
            .collect()
    }

    fn flush(&self) -> Result<(), DomainError> {
        self.reviews
            .flush()
            .map_err(|err| DomainError::storage(format!("failed to flush reviews: {err}")))?;
        Ok(())
    }
}

impl ReviewStore for SledReviewStore {
    fn insert(&self, record: &ReviewRecord) -> Result<ReviewRecord, DomainError> {
        let _guard = self.write_lock.lock();

        let id = self
            .db
            .generate_id()
            .map_err(|err| DomainError::storage(format!("failed to allocate review id: {err}")))?
            as i64;

        let mut stored = record.clone();
        stored.id = Some(ReviewId::Int(id));
        stored.created_at = Some(Utc::now());

        let bytes = Self::serialize(&stored)?;
        self.reviews
            .insert(Self::encode_key(id), bytes)
            .map_err(|err| DomainError::storage(format!("failed to persist review: {err}")))?;
        self.flush()?;

        Ok(stored)
    }

    fn recent(&self, limit: usize) -> Result<Vec<ReviewRecord>, DomainError> {
        let mut items = self.all_records()?;
        items.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| review_key(b).cmp(&review_key(a)))
        });
        items.truncate(limit);
        Ok(items)
    }

    fn unlabeled(&self) -> Result<Vec<ReviewRecord>, DomainError> {
        Ok(self
            .all_records()?
            .into_iter()
            .filter(ReviewRecord::is_unlabeled)
            .collect())
    }

    fn update_sentiment(
        &self,
        id: &ReviewId,
        result: &SentimentResult,
    ) -> Result<(), DomainError> {
        let _guard = self.write_lock.lock();
        let key = Self::key_for(id)?;

        let existing = self
            .reviews
            .get(key)
            .map_err(|err| DomainError::storage(format!("failed to read review {id}: {err}")))?
            .ok_or_else(|| DomainError::not_found(format!("review {id}")))?;

        let mut record = Self::decode_record(&existing)?;
        record.apply_sentiment(*result);

        self.reviews
            .insert(key, Self::serialize(&record)?)
            .map_err(|err| DomainError::storage(format!("failed to update review {id}: {err}")))?;
        self.flush()
    }

    fn sentiment_labels(&self) -> Result<Vec<Option<Sentiment>>, DomainError> {
        Ok(self
            .all_records()?
            .into_iter()
            .map(|record| record.sentiment_score)
            .collect())
    }

    fn ping(&self) -> Result<(), DomainError> {
        self.db
            .flush()
            .map_err(|err| DomainError::storage(format!("failed to flush db: {err}")))?;

        Ok(())
    }

    fn name(&self) -> &'static str {
        "sled"
    }
}

fn review_key(record: &ReviewRecord) -> i64 {
    match &record.id {
        Some(ReviewId::Int(id)) => *id,
        _ => i64::MIN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ReviewDetails;

    fn open_temp() -> (tempfile::TempDir, SledReviewStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SledReviewStore::open(dir.path().join("store")).unwrap();
        (dir, store)
    }

    fn review(text: &str, sentiment: Option<SentimentResult>) -> ReviewRecord {
        let details = ReviewDetails {
            business_name: Some("  Kopi Kenangan ".into()),
            city: Some("Jakarta".into()),
            ..ReviewDetails::default()
        };
        ReviewRecord::new(details, text, sentiment)
    }

    #[test]
    fn insert_assigns_id_and_timestamp() {
        let (_dir, store) = open_temp();
        let stored = store.insert(&review("enak sekali", None)).unwrap();

        assert!(matches!(stored.id, Some(ReviewId::Int(_))));
        assert!(stored.created_at.is_some());
        assert_eq!(stored.business_name.as_deref(), Some("Kopi Kenangan"));
    }

    #[test]
    fn recent_lists_newest_first_with_limit() {
        let (_dir, store) = open_temp();
        for text in ["first", "second", "third"] {
            store.insert(&review(text, None)).unwrap();
        }

        let recent = store.recent(2).unwrap();
        let texts: Vec<_> = recent.iter().filter_map(|r| r.review_text.as_deref()).collect();
        assert_eq!(texts, vec!["third", "second"]);
    }

    #[test]
    fn update_labels_unlabeled_rows() {
        let (_dir, store) = open_temp();
        let labeled = SentimentResult::new(Sentiment::Positive, 0.9);
        store.insert(&review("great", Some(labeled))).unwrap();
        let pending = store.insert(&review("awful", None)).unwrap();

        let unlabeled = store.unlabeled().unwrap();
        assert_eq!(unlabeled.len(), 1);

        let id = pending.id.unwrap();
        store
            .update_sentiment(&id, &SentimentResult::new(Sentiment::Negative, 0.8))
            .unwrap();

        assert!(store.unlabeled().unwrap().is_empty());
        let mut labels = store.sentiment_labels().unwrap();
        labels.sort_by_key(|l| l.map(|s| s.as_str()));
        assert_eq!(
            labels,
            vec![Some(Sentiment::Negative), Some(Sentiment::Positive)]
        );
    }

    #[test]
    fn updating_missing_review_is_not_found() {
        let (_dir, store) = open_temp();
        let err = store
            .update_sentiment(&ReviewId::Int(4242), &SentimentResult::FAIL_SAFE)
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));

        let err = store
            .update_sentiment(&ReviewId::Text("abc".into()), &SentimentResult::FAIL_SAFE)
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[test]
    fn reopening_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = SledReviewStore::open(dir.path()).unwrap();
            store.insert(&review("persisted", None)).unwrap();
            store.ping().unwrap();
        }
        let store = SledReviewStore::open(dir.path()).unwrap();
        assert_eq!(store.recent(10).unwrap().len(), 1);
    }
}
