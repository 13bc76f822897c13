use std::sync::Arc;

use tracing::{debug, warn};

use super::normalizer::normalize;
use crate::domain::{DomainError, RawPrediction, Sentiment, SentimentResult};

/// Input length (in characters) most artifacts accept; longer text is clipped.
pub const DEFAULT_MAX_INPUT_CHARS: usize = 512;

/// Confidence used when the model yields a label but no probability distribution.
pub const FALLBACK_CONFIDENCE: f32 = 0.85;

/// Results below this confidence are reported as neutral regardless of the label.
pub const NEUTRAL_THRESHOLD: f32 = 0.6;

/// Index-to-label map for three-class models that do not ship their own class list.
/// Models with a different class count and no class list are mis-mapped by this table.
const DEFAULT_INDEX_LABELS: [Sentiment; 3] =
    [Sentiment::Negative, Sentiment::Neutral, Sentiment::Positive];

/// What the classifier hands to the model: raw text for self-vectorizing pipelines, or a
/// feature vector when the artifact ships a separate vectorizer.
#[derive(Debug, Clone, Copy)]
pub enum ModelInput<'a> {
    Text(&'a str),
    Features(&'a [f32]),
}

/// Output of one model call.
#[derive(Debug, Clone, PartialEq)]
pub struct Inference {
    pub prediction: RawPrediction,
    /// `None` when the model cannot produce a probability distribution.
    pub probabilities: Option<Vec<f32>>,
}

/// Abstraction over a loaded classification model (linear JSON artifact, hosted pipeline, etc).
pub trait InferenceModel: Send + Sync {
    fn infer(&self, input: ModelInput<'_>) -> Result<Inference, DomainError>;

    /// Ordered class labels used to resolve [`RawPrediction::Index`] outputs.
    fn classes(&self) -> Option<&[String]> {
        None
    }

    fn max_input_chars(&self) -> usize {
        DEFAULT_MAX_INPUT_CHARS
    }

    fn name(&self) -> &str;
}

/// Turns normalized text into the feature space a model was trained on.
pub trait Vectorizer: Send + Sync {
    fn transform(&self, text: &str) -> Result<Vec<f32>, DomainError>;

    fn dims(&self) -> usize;
}

/// Process-scoped handle to the inference artifact, built once at startup.
#[derive(Clone)]
pub enum ClassifierArtifact {
    Loaded {
        model: Arc<dyn InferenceModel>,
        vectorizer: Option<Arc<dyn Vectorizer>>,
    },
    /// Loading failed or no model is configured; every classification degrades to neutral.
    NotLoaded { reason: String },
}

impl ClassifierArtifact {
    pub fn loaded(model: Arc<dyn InferenceModel>) -> Self {
        Self::Loaded {
            model,
            vectorizer: None,
        }
    }

    pub fn with_vectorizer(
        model: Arc<dyn InferenceModel>,
        vectorizer: Arc<dyn Vectorizer>,
    ) -> Self {
        Self::Loaded {
            model,
            vectorizer: Some(vectorizer),
        }
    }

    pub fn not_loaded(reason: impl Into<String>) -> Self {
        Self::NotLoaded {
            reason: reason.into(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded { .. })
    }

    /// Model name when loaded, otherwise the load failure reason.
    pub fn describe(&self) -> String {
        match self {
            Self::Loaded { model, vectorizer } => match vectorizer {
                Some(vectorizer) => {
                    format!("{} (+vectorizer, {} dims)", model.name(), vectorizer.dims())
                }
                None => model.name().to_string(),
            },
            Self::NotLoaded { reason } => format!("not loaded: {reason}"),
        }
    }
}

impl std::fmt::Debug for ClassifierArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ClassifierArtifact")
            .field(&self.describe())
            .finish()
    }
}

/// Maps raw model output onto `{positive, neutral, negative}` with a confidence score.
pub struct SentimentClassifier {
    artifact: ClassifierArtifact,
}

impl SentimentClassifier {
    pub fn new(artifact: ClassifierArtifact) -> Self {
        Self { artifact }
    }

    pub fn artifact(&self) -> &ClassifierArtifact {
        &self.artifact
    }

    pub fn is_ready(&self) -> bool {
        self.artifact.is_loaded()
    }

    /// Classifies `text`. Never fails: blank input, a missing artifact and inference errors
    /// all resolve to [`SentimentResult::FAIL_SAFE`].
    pub fn classify(&self, text: &str) -> SentimentResult {
        if text.trim().is_empty() {
            return SentimentResult::FAIL_SAFE;
        }

        let normalized = normalize(text);
        if normalized.is_empty() {
            return SentimentResult::FAIL_SAFE;
        }

        let (model, vectorizer) = match &self.artifact {
            ClassifierArtifact::Loaded { model, vectorizer } => (model, vectorizer),
            ClassifierArtifact::NotLoaded { .. } => return SentimentResult::FAIL_SAFE,
        };

        match Self::run_model(model.as_ref(), vectorizer.as_deref(), &normalized) {
            Ok(result) => {
                debug!(
                    model = model.name(),
                    sentiment = %result.sentiment,
                    confidence = result.confidence,
                    "classified text"
                );
                result
            }
            Err(err) => {
                warn!(model = model.name(), error = %err, "inference failed; returning neutral");
                SentimentResult::FAIL_SAFE
            }
        }
    }

    fn run_model(
        model: &dyn InferenceModel,
        vectorizer: Option<&dyn Vectorizer>,
        normalized: &str,
    ) -> Result<SentimentResult, DomainError> {
        let clipped = truncate_chars(normalized, model.max_input_chars());

        let inference = match vectorizer {
            Some(vectorizer) => {
                let features = vectorizer.transform(clipped)?;
                model.infer(ModelInput::Features(&features))?
            }
            None => model.infer(ModelInput::Text(clipped))?,
        };

        let confidence = match inference.probabilities.as_deref() {
            Some(distribution) => max_probability(distribution)?,
            None => FALLBACK_CONFIDENCE,
        };

        let sentiment = reconcile(&inference.prediction, model.classes());
        Ok(apply_threshold(sentiment, confidence))
    }
}

/// Resolves a raw prediction to a canonical label.
///
/// Strings are lowercased; indices go through `classes` when present, else the default
/// three-class map. Anything that is still not an exact canonical name falls back to
/// substring heuristics (`pos`, `neg`) and finally neutral.
pub fn reconcile(prediction: &RawPrediction, classes: Option<&[String]>) -> Sentiment {
    let candidate = match prediction {
        RawPrediction::Label(label) => label.to_lowercase(),
        RawPrediction::Index(index) => match classes {
            Some(classes) => usize::try_from(*index)
                .ok()
                .and_then(|i| classes.get(i))
                .map(|label| label.to_lowercase())
                .unwrap_or_default(),
            None => usize::try_from(*index)
                .ok()
                .and_then(|i| DEFAULT_INDEX_LABELS.get(i))
                .map(|s| s.as_str().to_string())
                .unwrap_or_default(),
        },
    };

    if let Some(sentiment) = Sentiment::from_canonical(&candidate) {
        return sentiment;
    }

    if candidate.contains("pos") {
        Sentiment::Positive
    } else if candidate.contains("neg") {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    }
}

/// Forces neutral below [`NEUTRAL_THRESHOLD`]; applied after reconciliation.
pub fn apply_threshold(sentiment: Sentiment, confidence: f32) -> SentimentResult {
    let confidence = confidence.clamp(0.0, 1.0);
    if confidence < NEUTRAL_THRESHOLD {
        SentimentResult::new(Sentiment::Neutral, confidence)
    } else {
        SentimentResult::new(sentiment, confidence)
    }
}

fn max_probability(distribution: &[f32]) -> Result<f32, DomainError> {
    let max = distribution
        .iter()
        .copied()
        .filter(|p| p.is_finite())
        .reduce(f32::max)
        .ok_or_else(|| DomainError::inference("model returned an empty probability vector"))?;
    Ok(max)
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
