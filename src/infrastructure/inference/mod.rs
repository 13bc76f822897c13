//! Model adapters behind `InferenceModel` plus the startup loader that picks one.

pub mod hosted_model;
pub mod linear_model;
pub mod vectorizer;

use std::sync::Arc;

use tracing::{info, warn};

pub use hosted_model::HostedPipelineModel;
pub use linear_model::{LinearModel, LinearModelFile};
pub use vectorizer::{HashingVectorizer, TfidfVectorizer, VectorizerSpec};

use crate::{
    application::services::{ClassifierArtifact, Vectorizer},
    domain::DomainError,
    settings::ModelBackend,
};

/// Builds the process-wide artifact. Failures are logged and produce `NotLoaded`.
pub fn load_artifact(backend: &ModelBackend) -> ClassifierArtifact {
    let artifact = match try_load(backend) {
        Ok(artifact) => artifact,
        Err(err) => {
            warn!(backend = backend.id(), error = %err, "model unavailable, predictions fall back to neutral");
            return ClassifierArtifact::not_loaded(err.to_string());
        }
    };

    match &artifact {
        ClassifierArtifact::Loaded { .. } => {
            info!(backend = backend.id(), model = %artifact.describe(), "model loaded")
        }
        ClassifierArtifact::NotLoaded { reason } => {
            warn!(backend = backend.id(), %reason, "no model configured")
        }
    }
    artifact
}

fn try_load(backend: &ModelBackend) -> Result<ClassifierArtifact, DomainError> {
    match backend {
        ModelBackend::Disabled => Ok(ClassifierArtifact::not_loaded("model backend disabled")),
        ModelBackend::Hosted {
            endpoint,
            token,
            max_input_chars,
        } => {
            if endpoint.trim().is_empty() {
                return Err(DomainError::artifact("hosted model endpoint is empty"));
            }
            let model = HostedPipelineModel::new(endpoint.trim(), token.clone(), *max_input_chars);
            Ok(ClassifierArtifact::loaded(Arc::new(model)))
        }
        ModelBackend::Linear {
            artifact,
            vectorizer,
        } => {
            let (model, bundled) = LinearModelFile::from_path(artifact)?.into_model()?;

            let vectorizer: Arc<dyn Vectorizer> = match (vectorizer, bundled) {
                (Some(path), _) => VectorizerSpec::from_path(path)?.build()?,
                (None, Some(spec)) => spec.build()?,
                (None, None) => {
                    return Err(DomainError::artifact(
                        "linear model needs a vectorizer (bundled or separate file)",
                    ))
                }
            };

            if vectorizer.dims() != model.n_features() {
                return Err(DomainError::artifact(format!(
                    "vectorizer produces {} features but model expects {}",
                    vectorizer.dims(),
                    model.n_features()
                )));
            }

            Ok(ClassifierArtifact::with_vectorizer(Arc::new(model), vectorizer))
        }
    }
}
