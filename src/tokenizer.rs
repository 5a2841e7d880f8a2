//! Tokenizer seam.
//!
//! The engine only needs "strings in, parallel id/mask/segment arrays out",
//! so that is all [`Tokenize`] asks for. [`HfTokenizer`] backs it with a
//! HuggingFace `tokenizer.json`; tests plug in their own implementations.

use std::path::Path;

use tokenizers::{Tokenizer, TruncationDirection, TruncationParams, TruncationStrategy};

use crate::EmbedError;

/// One string's encoding. All three vectors have the same length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedText {
    pub ids: Vec<i64>,
    pub attention_mask: Vec<i64>,
    pub type_ids: Vec<i64>,
}

impl EncodedText {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Batch-encodes sanitized strings for the model.
///
/// Implementations must be callable from several threads at once.
pub trait Tokenize: Send + Sync {
    /// Encodes every string independently, returning one [`EncodedText`] per
    /// input in input order. Any failure fails the whole batch with
    /// [`EmbedError::Tokenization`].
    fn encode_batch(&self, texts: &[String]) -> Result<Vec<EncodedText>, EmbedError>;

    /// Id used to right-pad shorter sequences.
    fn pad_token_id(&self) -> i64 {
        0
    }
}

/// [`Tokenize`] backed by the `tokenizers` crate.
#[derive(Clone)]
pub struct HfTokenizer {
    tokenizer: Tokenizer,
    pad_id: i64,
    max_length: usize,
}

impl HfTokenizer {
    /// Loads `tokenizer.json` and truncates inputs to `max_length` tokens.
    pub fn from_file(path: impl AsRef<Path>, max_length: usize) -> Result<Self, EmbedError> {
        let path = path.as_ref();
        let tokenizer = Tokenizer::from_file(path).map_err(|e| {
            EmbedError::TokenizerMissing(format!("{}: {e}", path.display()))
        })?;
        Self::new(tokenizer, max_length)
    }

    /// Same as [`from_file`](Self::from_file) for an in-memory `tokenizer.json`.
    pub fn from_bytes(bytes: impl AsRef<[u8]>, max_length: usize) -> Result<Self, EmbedError> {
        let tokenizer = Tokenizer::from_bytes(bytes)
            .map_err(|e| EmbedError::TokenizerMissing(e.to_string()))?;
        Self::new(tokenizer, max_length)
    }

    pub fn new(mut tokenizer: Tokenizer, max_length: usize) -> Result<Self, EmbedError> {
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length,
                stride: 0,
                strategy: TruncationStrategy::LongestFirst,
                direction: TruncationDirection::Right,
            }))
            .map_err(|e| {
                EmbedError::Configuration(format!("failed to configure truncation: {e}"))
            })?;

        let pad_id = tokenizer
            .get_padding()
            .map(|p| p.pad_id)
            .or_else(|| tokenizer.token_to_id("[PAD]"))
            .unwrap_or(0);

        Ok(Self {
            tokenizer,
            pad_id: i64::from(pad_id),
            max_length,
        })
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn vocab_size(&self) -> usize {
        self.tokenizer.get_vocab_size(true)
    }

    pub fn inner(&self) -> &Tokenizer {
        &self.tokenizer
    }
}

impl Tokenize for HfTokenizer {
    fn encode_batch(&self, texts: &[String]) -> Result<Vec<EncodedText>, EmbedError> {
        let inputs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let encodings = self
            .tokenizer
            .encode_batch(inputs, true)
            .map_err(|e| EmbedError::Tokenization(e.to_string()))?;

        Ok(encodings
            .iter()
            .map(|encoding| EncodedText {
                ids: widen(encoding.get_ids()),
                attention_mask: widen(encoding.get_attention_mask()),
                type_ids: widen(encoding.get_type_ids()),
            })
            .collect())
    }

    fn pad_token_id(&self) -> i64 {
        self.pad_id
    }
}

fn widen(values: &[u32]) -> Vec<i64> {
    values.iter().map(|&x| i64::from(x)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn encoded_text_len() {
        let encoded = EncodedText {
            ids: vec![101, 7592, 102],
            attention_mask: vec![1, 1, 1],
            type_ids: vec![0, 0, 0],
        };
        assert_eq!(encoded.len(), 3);
        assert!(!encoded.is_empty());
    }

    #[test]
    fn widen_keeps_values() {
        assert_eq!(widen(&[0, 1, u32::MAX]), vec![0, 1, i64::from(u32::MAX)]);
    }

    #[test]
    fn from_file_missing_is_tokenizer_missing() {
        let result = HfTokenizer::from_file("./missing/tokenizer.json", 512);
        assert!(matches!(result, Err(EmbedError::TokenizerMissing(_))));
    }

    #[test]
    fn from_bytes_garbage_is_tokenizer_missing() {
        let result = HfTokenizer::from_bytes(b"not json", 512);
        assert!(matches!(result, Err(EmbedError::TokenizerMissing(_))));
    }

    #[test]
    #[ignore = "requires local tokenizer assets under models/"]
    fn real_tokenizer_encodes_batch() {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("models")
            .join("all-MiniLM-L6-v2")
            .join("tokenizer.json");
        let tokenizer = HfTokenizer::from_file(&path, 512).expect("tokenizer should load");

        let texts = vec!["hello world".to_string(), "goodbye".to_string()];
        let encoded = tokenizer.encode_batch(&texts).expect("encode");

        assert_eq!(encoded.len(), 2);
        for e in &encoded {
            assert_eq!(e.ids.len(), e.attention_mask.len());
            assert_eq!(e.ids.len(), e.type_ids.len());
        }
    }
}
