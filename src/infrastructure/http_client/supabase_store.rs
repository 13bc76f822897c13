//! Review store backed by a Supabase table, spoken to through its PostgREST API.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::describe_http_error;
use crate::application::services::ReviewStore;
use crate::domain::{DomainError, ReviewId, ReviewRecord, Sentiment, SentimentResult};

pub struct SupabaseReviewStore {
    base_url: String,
    key: String,
    table: String,
    agent: ureq::Agent,
}

#[derive(Debug, Deserialize)]
struct LabelRow {
    #[serde(default)]
    sentiment_score: Option<String>,
}

impl SupabaseReviewStore {
    pub fn new(url: &str, key: impl Into<String>, table: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(30))
            .build();

        Self {
            base_url: url.trim_end_matches('/').to_string(),
            key: key.into(),
            table: table.into(),
            agent,
        }
    }

    /// `<url>/rest/v1/<table>?<query>`
    fn table_url(&self, query: &str) -> String {
        let mut url = format!(
            "{}/rest/v1/{}",
            self.base_url,
            urlencoding::encode(&self.table)
        );
        if !query.is_empty() {
            url.push('?');
            url.push_str(query);
        }
        url
    }

    fn authorized(&self, request: ureq::Request) -> ureq::Request {
        request
            .set("apikey", &self.key)
            .set("Authorization", &format!("Bearer {}", self.key))
    }

    fn fetch_rows(&self, query: &str, action: &str) -> Result<Vec<ReviewRecord>, DomainError> {
        let url = self.table_url(query);
        debug!(%url, "querying reviews");

        let response = self
            .authorized(self.agent.get(&url))
            .call()
            .map_err(|e| DomainError::storage(format!("{action}: {}", describe_http_error(e))))?;

        response
            .into_json()
            .map_err(|e| DomainError::storage(format!("{action}: failed to parse rows: {e}")))
    }
}

impl ReviewStore for SupabaseReviewStore {
    fn insert(&self, record: &ReviewRecord) -> Result<ReviewRecord, DomainError> {
        let url = self.table_url("");

        let mut payload = record.clone();
        payload.id = None;
        payload.created_at = None;

        let response = self
            .authorized(self.agent.post(&url))
            .set("Prefer", "return=representation")
            .send_json(&payload)
            .map_err(|e| {
                DomainError::storage(format!("Failed to save review: {}", describe_http_error(e)))
            })?;

        let mut rows: Vec<ReviewRecord> = response
            .into_json()
            .map_err(|e| DomainError::storage(format!("Failed to parse inserted row: {e}")))?;

        if rows.is_empty() {
            return Err(DomainError::storage("insert returned no rows"));
        }
        Ok(rows.remove(0))
    }

    fn recent(&self, limit: usize) -> Result<Vec<ReviewRecord>, DomainError> {
        self.fetch_rows(
            &format!("select=*&order=created_at.desc&limit={limit}"),
            "Failed to list reviews",
        )
    }

    fn unlabeled(&self) -> Result<Vec<ReviewRecord>, DomainError> {
        self.fetch_rows(
            "select=*&sentiment_score=is.null&order=created_at.asc",
            "Failed to list unlabeled reviews",
        )
    }

    fn update_sentiment(
        &self,
        id: &ReviewId,
        result: &SentimentResult,
    ) -> Result<(), DomainError> {
        let url = self.table_url(&format!(
            "id=eq.{}",
            urlencoding::encode(&id.to_string())
        ));

        self.authorized(self.agent.request("PATCH", &url))
            .send_json(json!({
                "sentiment_score": result.sentiment,
                "sentiment_confidence": result.confidence,
            }))
            .map_err(|e| {
                DomainError::storage(format!(
                    "Failed to update review {id}: {}",
                    describe_http_error(e)
                ))
            })?;

        Ok(())
    }

    fn sentiment_labels(&self) -> Result<Vec<Option<Sentiment>>, DomainError> {
        let url = self.table_url("select=sentiment_score");
        let rows: Vec<LabelRow> = self
            .authorized(self.agent.get(&url))
            .call()
            .map_err(|e| {
                DomainError::storage(format!("Failed to read labels: {}", describe_http_error(e)))
            })?
            .into_json()
            .map_err(|e| DomainError::storage(format!("Failed to parse labels: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|row| row.sentiment_score.as_deref().and_then(Sentiment::from_canonical))
            .collect())
    }

    fn ping(&self) -> Result<(), DomainError> {
        let url = self.table_url("select=id&limit=1");

        self.authorized(self.agent.get(&url))
            .call()
            .map_err(|e| {
                DomainError::storage(format!("Health check failed: {}", describe_http_error(e)))
            })?;

        Ok(())
    }

    fn name(&self) -> &'static str {
        "supabase"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_postgrest_urls() {
        let store = SupabaseReviewStore::new("https://db.example.test/", "key", "reviews");
        assert_eq!(
            store.table_url("select=*"),
            "https://db.example.test/rest/v1/reviews?select=*"
        );
        assert_eq!(store.table_url(""), "https://db.example.test/rest/v1/reviews");
    }

    #[test]
    fn unknown_labels_are_treated_as_unlabeled() {
        let rows: Vec<LabelRow> = serde_json::from_str(
            r#"[{"sentiment_score": "positive"}, {"sentiment_score": null}, {"sentiment_score": "mixed"}]"#,
        )
        .unwrap();
        let labels: Vec<Option<Sentiment>> = rows
            .into_iter()
            .map(|row| row.sentiment_score.as_deref().and_then(Sentiment::from_canonical))
            .collect();
        assert_eq!(labels, vec![Some(Sentiment::Positive), None, None]);
    }

    #[test]
    fn unreachable_store_reports_storage_error() {
        let store = SupabaseReviewStore::new("http://127.0.0.1:9", "key", "reviews");
        let err = store.ping().unwrap_err();
        assert!(matches!(err, DomainError::Storage(_)));
    }
}
