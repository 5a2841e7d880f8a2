//! Content Embedding Engine
//!
//! This crate turns a pile of strings into dense, unit-length `f32` vectors
//! you can throw at a similarity index. It sits between a ready-made subword
//! tokenizer and an ONNX sentence-embedding model (MiniLM-class, 384 dims)
//! and owns the numeric glue in between:
//!
//! - strip control characters that upset tokenizers
//! - batch-encode, right-pad, and lay out `[B, S]` id/mask/segment tensors
//! - run one forward pass into a `[B, S, H]` buffer
//! - attention-mask-weighted mean pooling, then L2 normalization
//!
//! Both divisions are clamped at `1e-9`, so empty strings and all-padding
//! rows come out as finite (zero-ish) vectors instead of NaN.
//!
//! ## Two ways in
//!
//! - [`EmbeddingEngine::generate`] embeds everything as one unit of work and
//!   hands back the whole ordered result.
//! - [`EmbeddingEngine::generate_stream`] splits the input into chunks
//!   (128 strings by default) and yields vectors lazily, keeping at most one
//!   chunk computed ahead of the consumer.
//!
//! Heavy lifting always happens on Tokio's blocking pool.
//!
//! ## When a chunk blows up
//!
//! Tokenizer and inference failures only spoil the chunk they happened in.
//! With [`FailurePolicy::Report`] (the default) every input of that chunk
//! gets its own `Err` so outputs still line up 1:1 with inputs. With
//! [`FailurePolicy::Skip`] the chunk quietly drops out and a warning is
//! logged. Cancellation, disposal, and shape mismatches end the operation.
//!
//! ## Quick example
//!
//! ```no_run
//! use embed::{CancelFlag, EmbedConfig, EngineFactory, GenerationOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), embed::EmbedError> {
//!     let cfg = EmbedConfig {
//!         model_dir: "models/all-MiniLM-L6-v2".into(),
//!         ..Default::default()
//!     };
//!     let engine = EngineFactory::new().open(&cfg)?;
//!
//!     let vectors = engine
//!         .generate(["hello world", "goodbye"], &GenerationOptions::default(), &CancelFlag::new())
//!         .await?;
//!     assert_eq!(vectors.len(), 2);
//!     Ok(())
//! }
//! ```
//!
//! ## Streaming example
//!
//! ```no_run
//! use embed::{CancelFlag, EmbedConfig, EngineFactory, GenerationOptions};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), embed::EmbedError> {
//!     let engine = EngineFactory::new().open(&EmbedConfig::default())?;
//!     let docs = (0..1_000).map(|i| format!("document {i}"));
//!
//!     let opts = GenerationOptions::default();
//!     let mut stream = engine.generate_stream(docs, &opts, CancelFlag::new())?;
//!     while let Some(vector) = stream.next().await {
//!         let vector = vector?;
//!         println!("{} -> {} dims", vector.text(), vector.dim());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Bring your own tokenizer or runtime
//!
//! [`Tokenize`] and [`InferenceBackend`] are the two seams. Anything that
//! implements them can be handed to [`EmbeddingEngine::new`], which is how
//! the test suite runs the whole pipeline without a native runtime.

mod cancel;
mod config;
mod engine;
mod error;
mod factory;
mod inference;
mod normalize;
mod pooling;
mod sanitize;
mod stream;
mod tensor;
mod tokenizer;
mod types;

pub use cancel::CancelFlag;
pub use config::{
    ConfigError, EmbedConfig, FailurePolicy, GenerationOptions, DEFAULT_CHUNK_SIZE,
    DEFAULT_EMBEDDING_DIM, DEFAULT_MAX_SEQUENCE_LENGTH,
};
pub use engine::{EmbeddingEngine, PROVIDER_NAME};
pub use error::EmbedError;
pub use factory::EngineFactory;
pub use inference::{InferenceBackend, OrtBackend, SessionOptions};
pub use normalize::{l2_normalize_in_place, l2_normalize_rows, NORM_EPSILON};
pub use pooling::{mean_pool, POOLING_EPSILON};
pub use sanitize::{sanitize, SanitizePolicy};
pub use stream::{EmbeddingStream, StreamState};
pub use tensor::TokenizedBatch;
pub use tokenizer::{EncodedText, HfTokenizer, Tokenize};
pub use types::{EmbeddingVector, GeneratedEmbeddings, ModelMetadata};
