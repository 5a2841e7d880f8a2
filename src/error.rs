use std::io;
use thiserror::Error;

/// Errors surfaced by the embedding engine.
///
/// Two classes matter to callers: [`Tokenization`](Self::Tokenization) and
/// [`Inference`](Self::Inference) only ever spoil the chunk they happened in,
/// everything else terminates the whole operation. See
/// [`is_chunk_recoverable`](Self::is_chunk_recoverable).
#[derive(Debug, Error)]
pub enum EmbedError {
    /// Caller asked for something the loaded model cannot produce (e.g. a
    /// 512-dim vector from a 384-dim model) or the engine config is invalid.
    #[error("invalid embedding configuration: {0}")]
    Configuration(String),
    /// The tokenizer could not encode one or more strings of a chunk.
    #[error("tokenization failure: {0}")]
    Tokenization(String),
    /// The inference runtime failed during a forward pass.
    #[error("inference failure: {0}")]
    Inference(String),
    /// A tensor did not have the shape the pipeline sized it for.
    #[error("tensor shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    /// Cooperative cancellation was observed at a checkpoint.
    #[error("embedding generation cancelled")]
    Cancelled,
    /// The engine released its tokenizer and session.
    #[error("embedding engine has been disposed")]
    Disposed,
    /// The ONNX model file does not exist at the resolved location.
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    /// The tokenizer JSON does not exist at the resolved location.
    #[error("tokenizer missing: {0}")]
    TokenizerMissing(String),
    /// Filesystem failure other than "not found" while locating model
    /// assets (permissions, a file where a directory belongs, ...).
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// The blocking worker running a chunk panicked or was aborted.
    #[error("embedding worker failed: {0}")]
    Worker(String),
}

impl EmbedError {
    /// `true` for failures confined to a single chunk. The orchestrator
    /// handles these per [`FailurePolicy`](crate::FailurePolicy) and moves on.
    pub fn is_chunk_recoverable(&self) -> bool {
        matches!(self, EmbedError::Tokenization(_) | EmbedError::Inference(_))
    }

    pub(crate) fn shape(expected: &[usize], actual: &[usize]) -> Self {
        EmbedError::ShapeMismatch {
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }
}

impl Clone for EmbedError {
    fn clone(&self) -> Self {
        match self {
            EmbedError::Configuration(s) => EmbedError::Configuration(s.clone()),
            EmbedError::Tokenization(s) => EmbedError::Tokenization(s.clone()),
            EmbedError::Inference(s) => EmbedError::Inference(s.clone()),
            EmbedError::ShapeMismatch { expected, actual } => EmbedError::ShapeMismatch {
                expected: expected.clone(),
                actual: actual.clone(),
            },
            EmbedError::Cancelled => EmbedError::Cancelled,
            EmbedError::Disposed => EmbedError::Disposed,
            EmbedError::ModelNotFound(s) => EmbedError::ModelNotFound(s.clone()),
            EmbedError::TokenizerMissing(s) => EmbedError::TokenizerMissing(s.clone()),
            EmbedError::Io(err) => EmbedError::Io(io::Error::new(err.kind(), err.to_string())),
            EmbedError::Worker(s) => EmbedError::Worker(s.clone()),
        }
    }
}
