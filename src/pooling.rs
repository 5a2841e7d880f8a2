//! Attention-mask-weighted mean pooling.
//!
//! Reduces per-token hidden states `[B, S, H]` to one vector per sequence
//! `[B, H]`:
//!
//! ```text
//! numerator[b,h]   = Σ_s mask[b,s] * raw[b,s,h]
//! denominator[b,h] = max(Σ_s mask[b,s], 1e-9)
//! pooled[b,h]      = numerator[b,h] / denominator[b,h]
//! ```
//!
//! Padding positions carry mask 0 and therefore never move the mean.

use ndarray::{Array2, ArrayView2, ArrayView3, Axis};

use crate::EmbedError;

/// Lower bound for the per-row token count. A fully masked row pools to
/// zeros instead of NaN.
pub const POOLING_EPSILON: f32 = 1e-9;

pub fn mean_pool(
    raw: ArrayView3<'_, f32>,
    mask: ArrayView2<'_, i64>,
) -> Result<Array2<f32>, EmbedError> {
    let (batch, seq_len, _) = raw.dim();
    if mask.dim() != (batch, seq_len) {
        return Err(EmbedError::shape(&[batch, seq_len], mask.shape()));
    }

    // [B, S] -> [B, S, 1] so it broadcasts across the hidden axis.
    let weights = mask.mapv(|m| m as f32).insert_axis(Axis(2));
    let numerator = (&raw * &weights).sum_axis(Axis(1));
    let denominator = weights
        .sum_axis(Axis(1))
        .mapv(|count| count.max(POOLING_EPSILON));

    Ok(&numerator / &denominator)
}
