//! Shared fakes for the integration tests.
//!
//! `WordTokenizer` and `HashBackend` stand in for the HuggingFace tokenizer
//! and ONNX Runtime so the full pipeline runs without model assets.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use embed::{
    EmbedConfig, EmbedError, EmbeddingEngine, EncodedText, InferenceBackend, TokenizedBatch,
    Tokenize,
};
use ndarray::ArrayViewMut3;

pub const CLS: i64 = 101;
pub const SEP: i64 = 102;
pub const PAD: i64 = 0;

/// Word that makes [`WordTokenizer`] fail the batch it appears in.
pub const TOKENIZER_POISON: &str = "untokenizable";
/// Word that makes [`HashBackend`] fail the forward pass it appears in.
pub const INFERENCE_POISON: &str = "boom";

pub fn word_id(word: &str) -> i64 {
    let hash = word
        .bytes()
        .fold(17_i64, |acc, b| (acc * 31 + i64::from(b)) % 29_989);
    1_000 + hash
}

/// Whitespace tokenizer: `[CLS] word… [SEP]`, counting every call.
#[derive(Clone, Default)]
pub struct WordTokenizer {
    pub calls: Arc<AtomicUsize>,
    pub seen: Arc<Mutex<Vec<String>>>,
}

impl Tokenize for WordTokenizer {
    fn encode_batch(&self, texts: &[String]) -> Result<Vec<EncodedText>, EmbedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().extend(texts.iter().cloned());

        texts
            .iter()
            .map(|text| {
                if text.split_whitespace().any(|w| w == TOKENIZER_POISON) {
                    return Err(EmbedError::Tokenization(format!("cannot encode '{text}'")));
                }
                let mut ids = vec![CLS];
                ids.extend(text.split_whitespace().map(word_id));
                ids.push(SEP);
                Ok(EncodedText {
                    attention_mask: vec![1; ids.len()],
                    type_ids: vec![0; ids.len()],
                    ids,
                })
            })
            .collect()
    }

    fn pad_token_id(&self) -> i64 {
        PAD
    }
}

/// Deterministic stand-in for a transformer: every token's hidden state is
/// a fixed function of its id and position-independent.
#[derive(Clone, Default)]
pub struct HashBackend {
    /// Batch size of every forward pass, in call order.
    pub batches: Arc<Mutex<Vec<usize>>>,
    /// Report a model whose hidden size disagrees with the buffer.
    pub wrong_hidden: Option<usize>,
    /// Sleep inside each forward pass.
    pub delay: Option<Duration>,
}

impl HashBackend {
    pub fn calls(&self) -> usize {
        self.batches.lock().unwrap().len()
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap().clone()
    }
}

impl InferenceBackend for HashBackend {
    fn run(
        &self,
        batch: &TokenizedBatch,
        mut output: ArrayViewMut3<'_, f32>,
    ) -> Result<(), EmbedError> {
        self.batches.lock().unwrap().push(batch.batch_count());
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }

        let (b, s, h) = output.dim();
        if let Some(actual) = self.wrong_hidden {
            return Err(EmbedError::ShapeMismatch {
                expected: vec![b, s, h],
                actual: vec![b, s, actual],
            });
        }
        let poison = word_id(INFERENCE_POISON);
        if batch.input_ids().iter().any(|&id| id == poison) {
            return Err(EmbedError::Inference("forward pass failed".into()));
        }

        let ids = batch.input_ids();
        for ((row, pos, dim), value) in output.indexed_iter_mut() {
            let id = ids[[row, pos]];
            let mixed = (id * 7_919 + dim as i64 * 104_729) % 1_009;
            *value = mixed as f32 / 1_009.0 - 0.25;
        }
        Ok(())
    }
}

pub struct Harness {
    pub engine: EmbeddingEngine,
    pub tokenizer: WordTokenizer,
    pub backend: HashBackend,
}

pub fn harness(config: &EmbedConfig) -> Harness {
    harness_with(config, HashBackend::default())
}

pub fn harness_with(config: &EmbedConfig, backend: HashBackend) -> Harness {
    let tokenizer = WordTokenizer::default();
    let engine = EmbeddingEngine::new(tokenizer.clone(), backend.clone(), config)
        .expect("engine should build over fakes");
    Harness {
        engine,
        tokenizer,
        backend,
    }
}

pub fn assert_vectors_close(a: &[f32], b: &[f32]) {
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(b) {
        assert!((x - y).abs() < 1e-5, "{x} != {y}");
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
