use std::fs;
use std::io;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use tracing::info;

use crate::config::EmbedConfig;
use crate::engine::EmbeddingEngine;
use crate::inference::{OrtBackend, SessionOptions};
use crate::tokenizer::HfTokenizer;
use crate::EmbedError;

/// Opens [`EmbeddingEngine`]s from model files on local disk.
///
/// Builds through one factory are serialized; separate factories do not
/// wait on each other. Nothing is ever downloaded.
#[derive(Debug, Default)]
pub struct EngineFactory {
    build_lock: Mutex<()>,
}

impl EngineFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the tokenizer and ONNX session described by `config`.
    pub fn open(&self, config: &EmbedConfig) -> Result<EmbeddingEngine, EmbedError> {
        config
            .validate()
            .map_err(|e| EmbedError::Configuration(e.to_string()))?;

        let model_path = config.resolved_model_path();
        let tokenizer_path = config.resolved_tokenizer_path();
        ensure_file(&model_path, EmbedError::ModelNotFound)?;
        ensure_file(&tokenizer_path, EmbedError::TokenizerMissing)?;

        let _guard = self
            .build_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let start = Instant::now();

        let tokenizer = HfTokenizer::from_file(&tokenizer_path, config.max_sequence_length)?;
        let backend = OrtBackend::from_file(
            &model_path,
            SessionOptions {
                intra_threads: config.intra_threads,
            },
        )?;

        info!(
            model = %model_path.display(),
            tokenizer = %tokenizer_path.display(),
            vocab_size = tokenizer.vocab_size(),
            elapsed_micros = start.elapsed().as_micros() as u64,
            "embedding_engine_loaded"
        );

        EmbeddingEngine::assemble(
            Box::new(tokenizer),
            Box::new(backend),
            config,
            Some(model_path),
        )
    }
}

/// Absent paths map through `missing`; any other filesystem failure is
/// reported as [`EmbedError::Io`].
fn ensure_file(path: &Path, missing: fn(String) -> EmbedError) -> Result<(), EmbedError> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() => Ok(()),
        Ok(_) => Err(missing(path.display().to_string())),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            Err(missing(path.display().to_string()))
        }
        Err(err) => Err(err.into()),
    }
}
