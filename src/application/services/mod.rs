//! Service layer: text normalization, classification, batch orchestration and persistence.

pub mod batch_runner;
pub mod classifier;
pub mod normalizer;
mod review_service;

pub use batch_runner::{BatchRunner, SentimentScorer, EMPTY_TEXT_ERROR};
pub use classifier::{
    ClassifierArtifact, Inference, InferenceModel, ModelInput, SentimentClassifier, Vectorizer,
    DEFAULT_MAX_INPUT_CHARS, FALLBACK_CONFIDENCE, NEUTRAL_THRESHOLD,
};
pub use normalizer::normalize;
pub use review_service::{ReviewService, ReviewStore, ServiceConfig};
