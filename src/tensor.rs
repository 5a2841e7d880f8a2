use ndarray::{Array2, ArrayView2};

use crate::tokenizer::EncodedText;
use crate::EmbedError;

/// Padded, rectangular model inputs for one chunk.
///
/// Each array is `(batch_count, sequence_length)` and laid out row-major, so
/// the flat storage of every array holds exactly
/// `batch_count * sequence_length` values in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenizedBatch {
    input_ids: Array2<i64>,
    attention_mask: Array2<i64>,
    token_type_ids: Array2<i64>,
}

impl TokenizedBatch {
    /// Right-pads every encoding to the longest one in the batch.
    ///
    /// Padding uses `pad_id` for ids and `0` for mask and segment ids. The
    /// sequence length is at least 1 so an all-empty batch still forms a
    /// valid tensor.
    pub fn from_encodings(encoded: Vec<EncodedText>, pad_id: i64) -> Result<Self, EmbedError> {
        let batch = encoded.len();
        let seq_len = encoded.iter().map(EncodedText::len).max().unwrap_or(0).max(1);

        let mut id_storage = Vec::with_capacity(batch * seq_len);
        let mut mask_storage = Vec::with_capacity(batch * seq_len);
        let mut type_storage = Vec::with_capacity(batch * seq_len);

        for (row, doc) in encoded.into_iter().enumerate() {
            let EncodedText {
                ids,
                attention_mask,
                type_ids,
            } = doc;
            if ids.len() != attention_mask.len() || ids.len() != type_ids.len() {
                return Err(EmbedError::Tokenization(format!(
                    "tokenizer produced mismatched lengths for input {row}: ids={}, mask={}, type_ids={}",
                    ids.len(),
                    attention_mask.len(),
                    type_ids.len()
                )));
            }
            let pad = seq_len - ids.len();
            id_storage.extend(ids);
            mask_storage.extend(attention_mask);
            type_storage.extend(type_ids);
            if pad > 0 {
                id_storage.extend(std::iter::repeat_n(pad_id, pad));
                mask_storage.extend(std::iter::repeat_n(0, pad));
                type_storage.extend(std::iter::repeat_n(0, pad));
            }
        }

        Ok(Self {
            input_ids: shaped(batch, seq_len, id_storage)?,
            attention_mask: shaped(batch, seq_len, mask_storage)?,
            token_type_ids: shaped(batch, seq_len, type_storage)?,
        })
    }

    pub fn batch_count(&self) -> usize {
        self.input_ids.nrows()
    }

    pub fn sequence_length(&self) -> usize {
        self.input_ids.ncols()
    }

    pub fn input_ids(&self) -> ArrayView2<'_, i64> {
        self.input_ids.view()
    }

    pub fn attention_mask(&self) -> ArrayView2<'_, i64> {
        self.attention_mask.view()
    }

    pub fn token_type_ids(&self) -> ArrayView2<'_, i64> {
        self.token_type_ids.view()
    }
}

fn shaped(batch: usize, seq_len: usize, storage: Vec<i64>) -> Result<Array2<i64>, EmbedError> {
    let len = storage.len();
    Array2::from_shape_vec((batch, seq_len), storage)
        .map_err(|_| EmbedError::shape(&[batch * seq_len], &[len]))
}
