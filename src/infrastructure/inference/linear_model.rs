use std::path::Path;

use serde::{Deserialize, Serialize};

use super::vectorizer::VectorizerSpec;
use crate::{
    application::services::{Inference, InferenceModel, ModelInput, DEFAULT_MAX_INPUT_CHARS},
    domain::{DomainError, RawPrediction},
};

/// On-disk form of an exported linear classifier.
///
/// `coef` holds one row per class. A single row is treated as a binary model
/// whose positive side is class `1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModelFile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub classes: Option<Vec<String>>,
    pub coef: Vec<Vec<f32>>,
    pub intercept: Vec<f32>,
    #[serde(default = "default_probability")]
    pub probability: bool,
    #[serde(default)]
    pub max_input_chars: Option<usize>,
    #[serde(default)]
    pub vectorizer: Option<VectorizerSpec>,
}

impl LinearModelFile {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DomainError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|err| {
            DomainError::artifact(format!("failed to read model {}: {err}", path.display()))
        })?;
        serde_json::from_slice(&bytes).map_err(|err| {
            DomainError::artifact(format!("invalid model {}: {err}", path.display()))
        })
    }

    /// Splits the file into the runtime model and its bundled vectorizer, if any.
    pub fn into_model(self) -> Result<(LinearModel, Option<VectorizerSpec>), DomainError> {
        let vectorizer = self.vectorizer;
        let model = LinearModel::try_new(
            self.name.unwrap_or_else(|| "linear".to_string()),
            self.coef,
            self.intercept,
            self.classes,
            self.probability,
            self.max_input_chars.unwrap_or(DEFAULT_MAX_INPUT_CHARS),
        )?;
        Ok((model, vectorizer))
    }
}

/// Dense linear classifier over a fixed-width feature vector.
#[derive(Debug)]
pub struct LinearModel {
    name: String,
    coef: Vec<Vec<f32>>,
    intercept: Vec<f32>,
    classes: Option<Vec<String>>,
    probability: bool,
    max_input_chars: usize,
    n_features: usize,
}

impl LinearModel {
    pub fn try_new(
        name: String,
        coef: Vec<Vec<f32>>,
        intercept: Vec<f32>,
        classes: Option<Vec<String>>,
        probability: bool,
        max_input_chars: usize,
    ) -> Result<Self, DomainError> {
        let n_features = coef.first().map(Vec::len).unwrap_or(0);
        if n_features == 0 {
            return Err(DomainError::artifact("model has no coefficients"));
        }
        if coef.iter().any(|row| row.len() != n_features) {
            return Err(DomainError::artifact("coefficient rows differ in width"));
        }
        if intercept.len() != coef.len() {
            return Err(DomainError::artifact(format!(
                "expected {} intercepts, found {}",
                coef.len(),
                intercept.len()
            )));
        }

        let n_classes = if coef.len() == 1 { 2 } else { coef.len() };
        if let Some(classes) = &classes {
            if classes.len() != n_classes {
                return Err(DomainError::artifact(format!(
                    "model scores {n_classes} classes but lists {}",
                    classes.len()
                )));
            }
        }

        Ok(Self {
            name,
            coef,
            intercept,
            classes,
            probability,
            max_input_chars: max_input_chars.max(1),
            n_features,
        })
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    fn decision(&self, features: &[f32]) -> Vec<f32> {
        self.coef
            .iter()
            .zip(&self.intercept)
            .map(|(row, bias)| {
                row.iter()
                    .zip(features)
                    .map(|(w, x)| w * x)
                    .sum::<f32>()
                    + bias
            })
            .collect()
    }
}

impl InferenceModel for LinearModel {
    fn infer(&self, input: ModelInput<'_>) -> Result<Inference, DomainError> {
        let features = match input {
            ModelInput::Features(features) => features,
            ModelInput::Text(_) => {
                return Err(DomainError::inference(
                    "linear model needs a vectorizer to score raw text",
                ))
            }
        };
        if features.len() != self.n_features {
            return Err(DomainError::inference(format!(
                "feature vector has {} dims, model expects {}",
                features.len(),
                self.n_features
            )));
        }

        let scores = self.decision(features);
        let distribution = if scores.len() == 1 {
            let p = sigmoid(scores[0]);
            vec![1.0 - p, p]
        } else {
            softmax(&scores)
        };

        let index = argmax(&distribution);
        Ok(Inference {
            prediction: RawPrediction::Index(index as i64),
            probabilities: self.probability.then_some(distribution),
        })
    }

    fn classes(&self) -> Option<&[String]> {
        self.classes.as_deref()
    }

    fn max_input_chars(&self) -> usize {
        self.max_input_chars
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

fn softmax(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
    let total: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

fn argmax(values: &[f32]) -> usize {
    values
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(index, _)| index)
        .unwrap_or(0)
}

const fn default_probability() -> bool {
    true
}
