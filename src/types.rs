use std::ops::Index;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One unit-length embedding, handed to the caller by value.
///
/// Fields are private so a vector cannot drift from what the engine
/// produced; use [`into_vec`](Self::into_vec) to take the raw values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingVector {
    values: Vec<f32>,
    text: String,
}

impl EmbeddingVector {
    pub(crate) fn new(values: Vec<f32>, text: String) -> Self {
        Self { values, text }
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    /// The input string this vector was generated from, before sanitization.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Euclidean norm; ≈ 1.0 for every non-degenerate input.
    pub fn norm(&self) -> f32 {
        self.values.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    /// Cosine similarity, which for unit vectors is the dot product.
    pub fn dot(&self, other: &EmbeddingVector) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| a * b)
            .sum()
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.values
    }
}

impl AsRef<[f32]> for EmbeddingVector {
    fn as_ref(&self) -> &[f32] {
        &self.values
    }
}

/// Ordered embeddings, one per input string, in input order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GeneratedEmbeddings {
    embeddings: Vec<EmbeddingVector>,
}

impl GeneratedEmbeddings {
    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&EmbeddingVector> {
        self.embeddings.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EmbeddingVector> {
        self.embeddings.iter()
    }

    pub fn into_vec(self) -> Vec<EmbeddingVector> {
        self.embeddings
    }
}

impl From<Vec<EmbeddingVector>> for GeneratedEmbeddings {
    fn from(embeddings: Vec<EmbeddingVector>) -> Self {
        Self { embeddings }
    }
}

impl Index<usize> for GeneratedEmbeddings {
    type Output = EmbeddingVector;

    fn index(&self, index: usize) -> &Self::Output {
        &self.embeddings[index]
    }
}

impl IntoIterator for GeneratedEmbeddings {
    type Item = EmbeddingVector;
    type IntoIter = std::vec::IntoIter<EmbeddingVector>;

    fn into_iter(self) -> Self::IntoIter {
        self.embeddings.into_iter()
    }
}

impl<'a> IntoIterator for &'a GeneratedEmbeddings {
    type Item = &'a EmbeddingVector;
    type IntoIter = std::slice::Iter<'a, EmbeddingVector>;

    fn into_iter(self) -> Self::IntoIter {
        self.embeddings.iter()
    }
}

/// Static description of the loaded model. Fixed at engine construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelMetadata {
    /// Name of the runtime producing vectors (e.g. `"onnx"`).
    pub provider_name: String,
    /// Model identifier, usually the configured model name.
    pub model_id: String,
    /// Where the model was loaded from, when it came from disk.
    pub model_location: Option<PathBuf>,
    /// Native output dimension.
    pub dimensions: usize,
    /// Strings per streamed chunk.
    pub default_chunk_size: usize,
}
