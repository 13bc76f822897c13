use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Canonical three-way sentiment label. Every classifier output resolves to one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    pub const ALL: [Sentiment; 3] = [Sentiment::Positive, Sentiment::Neutral, Sentiment::Negative];

    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
        }
    }

    /// Exact match against the canonical lowercase names; no heuristics.
    pub fn from_canonical(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == label)
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a single classification call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentResult {
    pub sentiment: Sentiment,
    pub confidence: f32,
}

impl SentimentResult {
    /// `{neutral, 0.0}`, returned whenever no confident answer can be produced.
    pub const FAIL_SAFE: SentimentResult = SentimentResult {
        sentiment: Sentiment::Neutral,
        confidence: 0.0,
    };

    pub fn new(sentiment: Sentiment, confidence: f32) -> Self {
        Self {
            sentiment,
            confidence,
        }
    }

    pub fn is_fail_safe(&self) -> bool {
        self.sentiment == Sentiment::Neutral && self.confidence == 0.0
    }
}

/// Raw model output before reconciliation into [`Sentiment`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawPrediction {
    /// Class-name output such as `"POSITIVE"` or `"LABEL_1"`.
    Label(String),
    /// Class index output, resolved through the artifact's class list or the default map.
    Index(i64),
}

/// One entry of a batch request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItem {
    #[serde(default)]
    pub id: serde_json::Value,
    #[serde(default)]
    pub text: String,
}

impl BatchItem {
    pub fn new(id: impl Into<serde_json::Value>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// Per-item outcome of a batch run. `error` is set only when this item failed on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItemResult {
    pub id: serde_json::Value,
    pub sentiment: Sentiment,
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchItemResult {
    pub fn scored(id: serde_json::Value, result: SentimentResult) -> Self {
        Self {
            id,
            sentiment: result.sentiment,
            confidence: result.confidence,
            error: None,
        }
    }

    pub fn failed(id: serde_json::Value, error: impl Into<String>) -> Self {
        Self {
            id,
            sentiment: SentimentResult::FAIL_SAFE.sentiment,
            confidence: SentimentResult::FAIL_SAFE.confidence,
            error: Some(error.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn as_result(&self) -> SentimentResult {
        SentimentResult::new(self.sentiment, self.confidence)
    }
}

/// Identifier assigned by the review store. Remote tables use integers, but text keys are
/// accepted as well.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReviewId {
    Int(i64),
    Text(String),
}

impl fmt::Display for ReviewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewId::Int(value) => write!(f, "{value}"),
            ReviewId::Text(value) => f.write_str(value),
        }
    }
}

impl From<ReviewId> for serde_json::Value {
    fn from(value: ReviewId) -> Self {
        match value {
            ReviewId::Int(id) => serde_json::Value::from(id),
            ReviewId::Text(id) => serde_json::Value::from(id),
        }
    }
}

/// Metadata accompanying a review. Strings are trimmed and blank values dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewDetails {
    pub business_name: Option<String>,
    pub business_category: Option<String>,
    pub city: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub reviewer_name: Option<String>,
    pub review_rating: Option<i32>,
    pub review_date: Option<String>,
    pub meal_type: Option<String>,
    pub price_per_person: Option<String>,
}

impl ReviewDetails {
    pub fn sanitized(self) -> Self {
        Self {
            business_name: sanitize_optional(self.business_name),
            business_category: sanitize_optional(self.business_category),
            city: sanitize_optional(self.city),
            address: sanitize_optional(self.address),
            latitude: self.latitude.filter(|v| v.is_finite()),
            longitude: self.longitude.filter(|v| v.is_finite()),
            reviewer_name: sanitize_optional(self.reviewer_name),
            review_rating: self.review_rating,
            review_date: sanitize_optional(self.review_date),
            meal_type: sanitize_optional(self.meal_type),
            price_per_person: sanitize_optional(self.price_per_person),
        }
    }
}

/// Row of the `reviews` table, flat so it maps one-to-one onto the remote columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ReviewId>,
    #[serde(default)]
    pub business_name: Option<String>,
    #[serde(default)]
    pub business_category: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub reviewer_name: Option<String>,
    #[serde(default)]
    pub review_rating: Option<i32>,
    #[serde(default)]
    pub review_text: Option<String>,
    #[serde(default)]
    pub review_date: Option<String>,
    #[serde(default)]
    pub meal_type: Option<String>,
    #[serde(default)]
    pub price_per_person: Option<String>,
    /// Labels outside the canonical three read as `None` so one legacy row cannot break a listing.
    #[serde(default, deserialize_with = "lenient_sentiment")]
    pub sentiment_score: Option<Sentiment>,
    #[serde(default)]
    pub sentiment_confidence: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl ReviewRecord {
    /// Builds an unsaved row; the store assigns `id` and `created_at`.
    pub fn new(
        details: ReviewDetails,
        review_text: impl Into<String>,
        sentiment: Option<SentimentResult>,
    ) -> Self {
        let details = details.sanitized();
        Self {
            id: None,
            business_name: details.business_name,
            business_category: details.business_category,
            city: details.city,
            address: details.address,
            latitude: details.latitude,
            longitude: details.longitude,
            reviewer_name: details.reviewer_name,
            review_rating: details.review_rating,
            review_text: Some(review_text.into()),
            review_date: details.review_date,
            meal_type: details.meal_type,
            price_per_person: details.price_per_person,
            sentiment_score: sentiment.map(|s| s.sentiment),
            sentiment_confidence: sentiment.map(|s| s.confidence),
            created_at: None,
        }
    }

    pub fn apply_sentiment(&mut self, result: SentimentResult) {
        self.sentiment_score = Some(result.sentiment);
        self.sentiment_confidence = Some(result.confidence);
    }

    pub fn is_unlabeled(&self) -> bool {
        self.sentiment_score.is_none()
    }
}

/// Label distribution across stored reviews.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentCounts {
    pub total: usize,
    pub positive: usize,
    pub neutral: usize,
    pub negative: usize,
}

impl SentimentCounts {
    /// Counts every row in `total`, including rows that have not been labeled yet.
    pub fn tally(labels: impl IntoIterator<Item = Option<Sentiment>>) -> Self {
        labels
            .into_iter()
            .fold(Self::default(), |mut counts, label| {
                counts.total += 1;
                match label {
                    Some(Sentiment::Positive) => counts.positive += 1,
                    Some(Sentiment::Neutral) => counts.neutral += 1,
                    Some(Sentiment::Negative) => counts.negative += 1,
                    None => {}
                }
                counts
            })
    }
}

fn lenient_sentiment<'de, D>(deserializer: D) -> Result<Option<Sentiment>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .and_then(Sentiment::from_canonical))
}

fn sanitize_optional(input: Option<String>) -> Option<String> {
    input.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_lookup_is_exact() {
        assert_eq!(Sentiment::from_canonical("positive"), Some(Sentiment::Positive));
        assert_eq!(Sentiment::from_canonical("Positive"), None);
        assert_eq!(Sentiment::from_canonical("pos"), None);
    }

    #[test]
    fn failed_batch_item_carries_fail_safe_values() {
        let item = BatchItemResult::failed(serde_json::json!(7), "boom");
        assert_eq!(item.sentiment, Sentiment::Neutral);
        assert_eq!(item.confidence, 0.0);
        assert_eq!(item.error.as_deref(), Some("boom"));
    }

    #[test]
    fn review_id_accepts_numbers_and_strings() {
        let numeric: ReviewId = serde_json::from_str("42").unwrap();
        let text: ReviewId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(numeric, ReviewId::Int(42));
        assert_eq!(text.to_string(), "abc");
    }

    #[test]
    fn new_record_drops_blank_metadata() {
        let details = ReviewDetails {
            business_name: Some("  Kopi Kenangan ".into()),
            city: Some("   ".into()),
            ..ReviewDetails::default()
        };
        let record = ReviewRecord::new(
            details,
            "Enak",
            Some(SentimentResult::new(Sentiment::Positive, 0.9)),
        );
        assert_eq!(record.business_name.as_deref(), Some("Kopi Kenangan"));
        assert!(record.city.is_none());
        assert_eq!(record.sentiment_score, Some(Sentiment::Positive));
        assert!(!record.is_unlabeled());
    }

    #[test]
    fn unknown_stored_labels_read_as_unlabeled() {
        let rows: Vec<ReviewRecord> = serde_json::from_str(
            r#"[
                {"id": 1, "sentiment_score": "mixed"},
                {"id": 2, "sentiment_score": "positive"},
                {"id": 3, "sentiment_score": "Positive"},
                {"id": 4, "sentiment_score": 3},
                {"id": 5, "sentiment_score": null}
            ]"#,
        )
        .unwrap();

        let labels: Vec<_> = rows.iter().map(|r| r.sentiment_score).collect();
        assert_eq!(
            labels,
            vec![None, Some(Sentiment::Positive), None, None, None]
        );
    }

    #[test]
    fn tally_counts_unlabeled_rows_in_total_only() {
        let counts = SentimentCounts::tally([
            Some(Sentiment::Positive),
            Some(Sentiment::Negative),
            None,
            Some(Sentiment::Positive),
        ]);
        assert_eq!(
            counts,
            SentimentCounts {
                total: 4,
                positive: 2,
                neutral: 0,
                negative: 1
            }
        );
    }
}
