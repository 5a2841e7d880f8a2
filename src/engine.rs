//! Chunk orchestration and the public generation API.
//!
//! Per chunk the pipeline runs sanitize → tokenize → pad → infer → pool →
//! normalize. [`EmbeddingEngine::generate`] treats the whole request as a
//! single chunk; [`EmbeddingEngine::generate_stream`] splits it into
//! `chunk_size` pieces and evaluates them lazily.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use ndarray::Array3;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::cancel::CancelFlag;
use crate::config::{EmbedConfig, FailurePolicy, GenerationOptions};
use crate::inference::InferenceBackend;
use crate::normalize::l2_normalize_rows;
use crate::pooling::mean_pool;
use crate::sanitize::{sanitize, SanitizePolicy};
use crate::stream::EmbeddingStream;
use crate::tensor::TokenizedBatch;
use crate::tokenizer::Tokenize;
use crate::types::{EmbeddingVector, GeneratedEmbeddings, ModelMetadata};
use crate::EmbedError;

/// Provider label reported through [`ModelMetadata`].
pub const PROVIDER_NAME: &str = "onnx";

/// Tokenizer and session, released together on dispose.
pub(crate) struct Pipeline {
    tokenizer: Box<dyn Tokenize>,
    backend: Box<dyn InferenceBackend>,
    hidden_dim: usize,
    sanitize: SanitizePolicy,
}

impl Pipeline {
    /// Embeds one chunk. Output order matches `texts`; each vector keeps the
    /// caller's unsanitized string.
    pub(crate) fn embed_chunk(
        &self,
        texts: &[String],
        cancel: &CancelFlag,
    ) -> Result<Vec<EmbeddingVector>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let start = Instant::now();

        cancel.check()?;
        let cleaned: Vec<String> = texts
            .iter()
            .map(|t| sanitize(t, self.sanitize).into_owned())
            .collect();
        let encoded = self.tokenizer.encode_batch(&cleaned)?;
        if encoded.len() != texts.len() {
            return Err(EmbedError::Tokenization(format!(
                "tokenizer returned {} encodings for {} inputs",
                encoded.len(),
                texts.len()
            )));
        }
        let batch = TokenizedBatch::from_encodings(encoded, self.tokenizer.pad_token_id())?;

        cancel.check()?;
        let mut hidden = Array3::<f32>::zeros((
            batch.batch_count(),
            batch.sequence_length(),
            self.hidden_dim,
        ));
        self.backend.run(&batch, hidden.view_mut())?;

        let mut pooled = mean_pool(hidden.view(), batch.attention_mask())?;
        l2_normalize_rows(&mut pooled);

        debug!(
            batch = batch.batch_count(),
            seq_len = batch.sequence_length(),
            elapsed_micros = start.elapsed().as_micros() as u64,
            "embed_chunk"
        );

        Ok(pooled
            .rows()
            .into_iter()
            .zip(texts)
            .map(|(row, text)| EmbeddingVector::new(row.to_vec(), text.clone()))
            .collect())
    }
}

pub(crate) struct EngineInner {
    metadata: ModelMetadata,
    chunk_size: usize,
    failure_policy: FailurePolicy,
    resources: RwLock<Option<Arc<Pipeline>>>,
}

impl EngineInner {
    pub(crate) fn pipeline(&self) -> Result<Arc<Pipeline>, EmbedError> {
        self.resources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(EmbedError::Disposed)
    }

    pub(crate) fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    fn check_dimensions(&self, options: &GenerationOptions) -> Result<(), EmbedError> {
        match options.dimensions {
            Some(requested) if requested != self.metadata.dimensions => {
                Err(EmbedError::Configuration(format!(
                    "only {} dimensions are supported, {requested} were requested",
                    self.metadata.dimensions
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Handle to a loaded embedding model.
///
/// Cloning is cheap and every clone drives the same tokenizer and session.
/// Calls from several tasks may overlap; each builds its own buffers.
#[derive(Clone)]
pub struct EmbeddingEngine {
    inner: Arc<EngineInner>,
}

impl EmbeddingEngine {
    /// Builds an engine over ready tokenizer and inference handles.
    pub fn new<T, B>(tokenizer: T, backend: B, config: &EmbedConfig) -> Result<Self, EmbedError>
    where
        T: Tokenize + 'static,
        B: InferenceBackend + 'static,
    {
        Self::assemble(Box::new(tokenizer), Box::new(backend), config, None)
    }

    pub(crate) fn assemble(
        tokenizer: Box<dyn Tokenize>,
        backend: Box<dyn InferenceBackend>,
        config: &EmbedConfig,
        model_location: Option<std::path::PathBuf>,
    ) -> Result<Self, EmbedError> {
        config
            .validate()
            .map_err(|e| EmbedError::Configuration(e.to_string()))?;

        let metadata = ModelMetadata {
            provider_name: PROVIDER_NAME.to_string(),
            model_id: config.model_name.clone(),
            model_location,
            dimensions: config.embedding_dim,
            default_chunk_size: config.chunk_size,
        };
        let pipeline = Pipeline {
            tokenizer,
            backend,
            hidden_dim: config.embedding_dim,
            sanitize: config.sanitize,
        };

        info!(
            model_id = %metadata.model_id,
            dimensions = metadata.dimensions,
            chunk_size = config.chunk_size,
            failure_policy = ?config.failure_policy,
            "embedding_engine_ready"
        );

        Ok(Self {
            inner: Arc::new(EngineInner {
                metadata,
                chunk_size: config.chunk_size,
                failure_policy: config.failure_policy,
                resources: RwLock::new(Some(Arc::new(pipeline))),
            }),
        })
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.inner.metadata
    }

    pub fn chunk_size(&self) -> usize {
        self.inner.chunk_size
    }

    /// Embeds every value and returns the vectors in input order.
    ///
    /// The request runs as one unit of work on Tokio's blocking pool. A
    /// tokenizer or inference failure is returned as-is under
    /// [`FailurePolicy::Report`] and becomes an empty result under
    /// [`FailurePolicy::Skip`].
    pub async fn generate<I, S>(
        &self,
        values: I,
        options: &GenerationOptions,
        cancel: &CancelFlag,
    ) -> Result<GeneratedEmbeddings, EmbedError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let texts: Vec<String> = values.into_iter().map(Into::into).collect();
        let span = info_span!("embed.generate", items = texts.len());
        self.generate_owned(texts, *options, cancel.clone())
            .instrument(span)
            .await
    }

    async fn generate_owned(
        &self,
        texts: Vec<String>,
        options: GenerationOptions,
        cancel: CancelFlag,
    ) -> Result<GeneratedEmbeddings, EmbedError> {
        let pipeline = self.inner.pipeline()?;
        self.inner.check_dimensions(&options)?;
        if texts.is_empty() {
            return Ok(GeneratedEmbeddings::default());
        }
        cancel.check()?;

        let start = Instant::now();
        let items = texts.len();
        let outcome = tokio::task::spawn_blocking(move || pipeline.embed_chunk(&texts, &cancel))
            .await
            .map_err(|e| EmbedError::Worker(e.to_string()))?;

        match outcome {
            Ok(vectors) => {
                info!(
                    items,
                    elapsed_micros = start.elapsed().as_micros() as u64,
                    "embed_generate_complete"
                );
                Ok(GeneratedEmbeddings::from(vectors))
            }
            Err(err) if err.is_chunk_recoverable() => match self.inner.failure_policy {
                FailurePolicy::Report => {
                    warn!(items, error = %err, "embed_generate_failed");
                    Err(err)
                }
                FailurePolicy::Skip => {
                    warn!(items, error = %err, "embed_generate_skipped");
                    Ok(GeneratedEmbeddings::default())
                }
            },
            Err(err) => Err(err),
        }
    }

    /// Lazily embeds `values` in chunks of [`chunk_size`](Self::chunk_size).
    ///
    /// Configuration and disposal errors come back here, before any work is
    /// scheduled. Nothing is computed until the stream is first polled.
    pub fn generate_stream<I, S>(
        &self,
        values: I,
        options: &GenerationOptions,
        cancel: CancelFlag,
    ) -> Result<EmbeddingStream, EmbedError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner.pipeline()?;
        self.inner.check_dimensions(options)?;

        let texts: Vec<String> = values.into_iter().map(Into::into).collect();
        let items = texts.len();
        let chunk_size = self.inner.chunk_size;

        // Sized from the remaining input; `chunk_size` may be huge.
        let mut chunks = Vec::with_capacity(items.div_ceil(chunk_size));
        let mut remaining = items;
        let mut texts = texts.into_iter();
        while remaining > 0 {
            let take = remaining.min(chunk_size);
            chunks.push(texts.by_ref().take(take).collect::<Vec<_>>());
            remaining -= take;
        }

        let span = info_span!("embed.stream", items, chunks = chunks.len());
        Ok(EmbeddingStream::new(
            Arc::clone(&self.inner),
            chunks,
            cancel,
            span,
        ))
    }

    /// Releases the tokenizer and session. Later calls fail with
    /// [`EmbedError::Disposed`]; work already running keeps its handles
    /// until it finishes.
    pub fn dispose(&self) {
        let released = self
            .inner
            .resources
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if released.is_some() {
            info!(model_id = %self.inner.metadata.model_id, "embedding_engine_disposed");
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.inner
            .resources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

impl std::fmt::Debug for EmbeddingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingEngine")
            .field("metadata", &self.inner.metadata)
            .field("chunk_size", &self.inner.chunk_size)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
