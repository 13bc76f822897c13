//! Text-classification pipeline served over HTTP (Hugging Face inference style).

use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::{
    application::services::{Inference, InferenceModel, ModelInput},
    domain::{DomainError, RawPrediction},
    infrastructure::http_client::describe_http_error,
};

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct LabelScore {
    label: String,
    score: f32,
}

pub struct HostedPipelineModel {
    endpoint: String,
    token: Option<String>,
    max_input_chars: usize,
    name: String,
    agent: ureq::Agent,
}

impl HostedPipelineModel {
    pub fn new(endpoint: impl Into<String>, token: Option<String>, max_input_chars: usize) -> Self {
        let endpoint = endpoint.into();
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(30))
            .build();

        Self {
            name: format!("hosted:{endpoint}"),
            endpoint,
            token: token.filter(|t| !t.trim().is_empty()),
            max_input_chars: max_input_chars.max(1),
            agent,
        }
    }

    fn request(&self, text: &str) -> Result<Value, DomainError> {
        let mut request = self.agent.post(&self.endpoint);
        if let Some(token) = &self.token {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }

        let response = request
            .send_json(json!({
                "inputs": text,
                "options": { "wait_for_model": true }
            }))
            .map_err(|err| DomainError::inference(describe_http_error(err)))?;

        response.into_json().map_err(|err| {
            DomainError::inference(format!("failed to parse pipeline response: {err}"))
        })
    }
}

impl InferenceModel for HostedPipelineModel {
    fn infer(&self, input: ModelInput<'_>) -> Result<Inference, DomainError> {
        let text = match input {
            ModelInput::Text(text) => text,
            ModelInput::Features(_) => {
                return Err(DomainError::inference(
                    "hosted pipeline scores raw text, not feature vectors",
                ))
            }
        };

        let body = self.request(text)?;
        let scores = parse_label_scores(body)?;
        debug!(labels = scores.len(), "hosted pipeline responded");
        into_inference(scores)
    }

    fn max_input_chars(&self) -> usize {
        self.max_input_chars
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Accepts both `[[{label, score}, ..]]` and `[{label, score}, ..]`.
fn parse_label_scores(body: Value) -> Result<Vec<LabelScore>, DomainError> {
    if let Some(error) = body.get("error").and_then(Value::as_str) {
        return Err(DomainError::inference(format!("pipeline error: {error}")));
    }

    let body = match body {
        Value::Array(mut outer) if outer.len() == 1 && outer[0].is_array() => outer.remove(0),
        other => other,
    };

    serde_json::from_value(body)
        .map_err(|err| DomainError::inference(format!("unexpected pipeline response: {err}")))
}

fn into_inference(scores: Vec<LabelScore>) -> Result<Inference, DomainError> {
    let best = scores
        .iter()
        .max_by(|a, b| a.score.total_cmp(&b.score))
        .ok_or_else(|| DomainError::inference("pipeline returned no labels"))?;

    Ok(Inference {
        prediction: RawPrediction::Label(best.label.clone()),
        probabilities: Some(scores.iter().map(|s| s.score).collect()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_response() {
        let body = json!([[
            {"label": "negative", "score": 0.05},
            {"label": "POSITIVE", "score": 0.9},
            {"label": "neutral", "score": 0.05}
        ]]);

        let inference = into_inference(parse_label_scores(body).unwrap()).unwrap();
        assert_eq!(inference.prediction, RawPrediction::Label("POSITIVE".into()));
        assert_eq!(inference.probabilities, Some(vec![0.05, 0.9, 0.05]));
    }

    #[test]
    fn parses_flat_response() {
        let body = json!([{"label": "LABEL_0", "score": 0.7}, {"label": "LABEL_1", "score": 0.3}]);
        let inference = into_inference(parse_label_scores(body).unwrap()).unwrap();
        assert_eq!(inference.prediction, RawPrediction::Label("LABEL_0".into()));
    }

    #[test]
    fn surfaces_pipeline_errors() {
        let err = parse_label_scores(json!({"error": "Model is loading"})).unwrap_err();
        assert!(err.to_string().contains("Model is loading"));
    }

    #[test]
    fn empty_label_list_is_an_error() {
        let err = into_inference(parse_label_scores(json!([[]])).unwrap()).unwrap_err();
        assert!(matches!(err, DomainError::Inference(_)));
    }

    #[test]
    fn feature_input_is_rejected_without_network() {
        let model = HostedPipelineModel::new("http://127.0.0.1:9/never", None, 512);
        let err = model.infer(ModelInput::Features(&[0.1])).unwrap_err();
        assert!(matches!(err, DomainError::Inference(_)));
        assert_eq!(model.name(), "hosted:http://127.0.0.1:9/never");
    }
}
