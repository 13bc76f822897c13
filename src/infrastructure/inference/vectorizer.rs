use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::Arc;

use ahash::AHasher;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{application::services::Vectorizer, domain::DomainError};

/// Serialized description of a feature vectorizer, as exported next to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum VectorizerSpec {
    /// Vocabulary-based term weighting with optional inverse document frequencies.
    Tfidf {
        vocabulary: HashMap<String, usize>,
        #[serde(default)]
        idf: Option<Vec<f32>>,
        #[serde(default = "default_ngram_range")]
        ngram_range: (usize, usize),
        #[serde(default)]
        sublinear_tf: bool,
        #[serde(default = "default_true")]
        l2_norm: bool,
    },
    /// Stateless feature hashing into a fixed number of buckets.
    Hashing {
        n_features: usize,
        #[serde(default = "default_ngram_range")]
        ngram_range: (usize, usize),
        #[serde(default = "default_true")]
        l2_norm: bool,
    },
}

impl VectorizerSpec {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DomainError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|err| {
            DomainError::artifact(format!("failed to read vectorizer {}: {err}", path.display()))
        })?;
        serde_json::from_slice(&bytes).map_err(|err| {
            DomainError::artifact(format!("invalid vectorizer {}: {err}", path.display()))
        })
    }

    /// Validates the description and builds the runtime vectorizer.
    pub fn build(self) -> Result<Arc<dyn Vectorizer>, DomainError> {
        match self {
            VectorizerSpec::Tfidf {
                vocabulary,
                idf,
                ngram_range,
                sublinear_tf,
                l2_norm,
            } => Ok(Arc::new(TfidfVectorizer::try_new(
                vocabulary,
                idf,
                ngram_range,
                sublinear_tf,
                l2_norm,
            )?)),
            VectorizerSpec::Hashing {
                n_features,
                ngram_range,
                l2_norm,
            } => Ok(Arc::new(HashingVectorizer::try_new(
                n_features,
                ngram_range,
                l2_norm,
            )?)),
        }
    }
}

/// Term-frequency vectorizer over a fixed vocabulary.
pub struct TfidfVectorizer {
    vocabulary: HashMap<String, usize>,
    idf: Option<Vec<f32>>,
    ngram_range: (usize, usize),
    sublinear_tf: bool,
    l2_norm: bool,
    dimensions: usize,
}

impl TfidfVectorizer {
    pub fn try_new(
        vocabulary: HashMap<String, usize>,
        idf: Option<Vec<f32>>,
        ngram_range: (usize, usize),
        sublinear_tf: bool,
        l2_norm: bool,
    ) -> Result<Self, DomainError> {
        if vocabulary.is_empty() {
            return Err(DomainError::artifact("vectorizer vocabulary is empty"));
        }
        validate_ngram_range(ngram_range)?;

        let dimensions = vocabulary
            .values()
            .copied()
            .max()
            .unwrap_or(0)
            .checked_add(1)
            .ok_or_else(|| DomainError::artifact("vocabulary index out of range"))?;
        if let Some(idf) = &idf {
            if idf.len() != dimensions {
                return Err(DomainError::artifact(format!(
                    "idf has {} entries but vocabulary spans {dimensions} features",
                    idf.len()
                )));
            }
        }

        Ok(Self {
            vocabulary,
            idf,
            ngram_range,
            sublinear_tf,
            l2_norm,
            dimensions,
        })
    }
}

impl Vectorizer for TfidfVectorizer {
    fn transform(&self, text: &str) -> Result<Vec<f32>, DomainError> {
        let mut features = vec![0.0f32; self.dimensions];
        for term in ngrams(&tokenize(text), self.ngram_range) {
            if let Some(&index) = self.vocabulary.get(&term) {
                features[index] += 1.0;
            }
        }

        for (index, value) in features.iter_mut().enumerate() {
            if *value == 0.0 {
                continue;
            }
            if self.sublinear_tf {
                *value = 1.0 + value.ln();
            }
            if let Some(idf) = &self.idf {
                *value *= idf[index];
            }
        }

        if self.l2_norm {
            l2_normalize(&mut features);
        }
        Ok(features)
    }

    fn dims(&self) -> usize {
        self.dimensions
    }
}

/// Hashes n-grams into `n_features` buckets; needs no vocabulary.
pub struct HashingVectorizer {
    n_features: usize,
    ngram_range: (usize, usize),
    l2_norm: bool,
}

impl HashingVectorizer {
    pub fn try_new(
        n_features: usize,
        ngram_range: (usize, usize),
        l2_norm: bool,
    ) -> Result<Self, DomainError> {
        if n_features == 0 {
            return Err(DomainError::artifact(
                "hashing vectorizer needs at least one feature",
            ));
        }
        validate_ngram_range(ngram_range)?;
        Ok(Self {
            n_features,
            ngram_range,
            l2_norm,
        })
    }

    fn bucket(&self, term: &str) -> usize {
        let mut hasher = AHasher::default();
        term.hash(&mut hasher);
        (hasher.finish() % self.n_features as u64) as usize
    }
}

impl Vectorizer for HashingVectorizer {
    fn transform(&self, text: &str) -> Result<Vec<f32>, DomainError> {
        let mut features = vec![0.0f32; self.n_features];
        for term in ngrams(&tokenize(text), self.ngram_range) {
            features[self.bucket(&term)] += 1.0;
        }
        if self.l2_norm {
            l2_normalize(&mut features);
        }
        Ok(features)
    }

    fn dims(&self) -> usize {
        self.n_features
    }
}

/// Word tokens of two or more characters.
fn tokenize(text: &str) -> Vec<&str> {
    static RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w\w+\b").unwrap());
    RE.find_iter(text).map(|m| m.as_str()).collect()
}

fn ngrams(tokens: &[&str], (min_n, max_n): (usize, usize)) -> Vec<String> {
    let mut terms = Vec::new();
    for n in min_n..=max_n {
        if n > tokens.len() {
            break;
        }
        terms.extend(tokens.windows(n).map(|window| window.join(" ")));
    }
    terms
}

fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

fn validate_ngram_range((min_n, max_n): (usize, usize)) -> Result<(), DomainError> {
    if min_n == 0 || min_n > max_n {
        return Err(DomainError::artifact(format!(
            "invalid ngram range ({min_n}, {max_n})"
        )));
    }
    Ok(())
}

const fn default_ngram_range() -> (usize, usize) {
    (1, 1)
}

const fn default_true() -> bool {
    true
}
