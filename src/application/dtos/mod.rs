use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::{BatchItem, BatchItemResult, ReviewDetails, ReviewRecord, Sentiment};

/// Body of `POST /predict`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictRequest {
    #[serde(default)]
    pub text: String,
}

/// Body of `POST /predict_batch`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchPredictRequest {
    #[serde(default)]
    pub reviews: Vec<BatchItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchPredictResponse {
    pub results: Vec<BatchItemResult>,
}

/// Review form submitted by the web frontend. Field names are camelCase on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeReviewRequest {
    #[serde(default)]
    pub business_name: Option<String>,
    #[serde(default)]
    pub business_category: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub reviewer_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_rating")]
    pub review_rating: Option<i32>,
    #[serde(default)]
    pub review_text: String,
    #[serde(default)]
    pub meal_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub price_per_person: Option<String>,
}

impl AnalyzeReviewRequest {
    /// Splits the form into metadata and the text to classify.
    pub fn into_parts(self) -> (ReviewDetails, String) {
        let details = ReviewDetails {
            business_name: self.business_name,
            business_category: self.business_category,
            city: self.city,
            address: self.address,
            reviewer_name: self.reviewer_name,
            review_rating: self.review_rating,
            meal_type: self.meal_type,
            price_per_person: self.price_per_person,
            ..ReviewDetails::default()
        };
        (details, self.review_text)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeReviewResponse {
    pub message: String,
    pub sentiment: Sentiment,
    pub confidence: f32,
    pub data: Vec<ReviewRecord>,
}

/// Query string of `GET /api/reviews`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewListQuery {
    pub limit: Option<usize>,
}

/// Outcome of re-labeling reviews that had no sentiment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReanalysisSummary {
    pub analyzed: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReanalysisResponse {
    pub message: String,
    #[serde(flatten)]
    pub summary: ReanalysisSummary,
}

impl From<ReanalysisSummary> for ReanalysisResponse {
    fn from(summary: ReanalysisSummary) -> Self {
        Self {
            message: format!("Analyzed {} reviews successfully", summary.analyzed),
            summary,
        }
    }
}

/// Health/readiness report for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatusResponse {
    pub status: String,
    pub service: String,
    pub model_loaded: bool,
    pub model: String,
    pub store: String,
    pub checked_at: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TextOrNumber {
    Int(i64),
    Float(f64),
    Text(String),
}

/// Accepts `5`, `4.5` or `"5"`; anything unparseable becomes `None`.
fn lenient_rating<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<TextOrNumber>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| match value {
        TextOrNumber::Int(v) => i32::try_from(v).ok(),
        TextOrNumber::Float(v) if v.is_finite() => Some(v.round() as i32),
        TextOrNumber::Float(_) => None,
        TextOrNumber::Text(v) => v.trim().parse::<f64>().ok().map(|f| f.round() as i32),
    }))
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<TextOrNumber>::deserialize(deserializer)?;
    Ok(raw.map(|value| match value {
        TextOrNumber::Int(v) => v.to_string(),
        TextOrNumber::Float(v) => v.to_string(),
        TextOrNumber::Text(v) => v,
    }))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn review_form_accepts_loose_numbers() {
        let request: AnalyzeReviewRequest = serde_json::from_value(json!({
            "businessName": "Barista",
            "reviewRating": "4",
            "reviewText": "Nice latte",
            "pricePerPerson": 50000
        }))
        .unwrap();

        assert_eq!(request.review_rating, Some(4));
        assert_eq!(request.price_per_person.as_deref(), Some("50000"));

        let (details, text) = request.into_parts();
        assert_eq!(details.business_name.as_deref(), Some("Barista"));
        assert_eq!(text, "Nice latte");
    }

    #[test]
    fn missing_fields_default() {
        let request: AnalyzeReviewRequest = serde_json::from_value(json!({})).unwrap();
        assert!(request.review_text.is_empty());
        assert!(request.review_rating.is_none());
    }

    #[test]
    fn reanalysis_response_is_flat() {
        let body = serde_json::to_value(ReanalysisResponse::from(ReanalysisSummary {
            analyzed: 3,
            skipped: 1,
        }))
        .unwrap();
        assert_eq!(
            body,
            json!({"message": "Analyzed 3 reviews successfully", "analyzed": 3, "skipped": 1})
        );
    }
}
