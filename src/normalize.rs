use ndarray::Array2;

/// Lower bound for a row's squared norm. Near-zero rows get scaled by
/// `1 / sqrt(1e-9)` instead of blowing up to ∞ or NaN.
pub const NORM_EPSILON: f32 = 1e-9;

/// In-place L2 normalization helper to keep allocations down during hot paths.
/// Uses f32 throughout for better SIMD auto-vectorization.
pub fn l2_normalize_in_place(v: &mut [f32]) {
    let norm_sq: f32 = v.iter().map(|x| x * x).sum();
    let inv_norm = norm_sq.max(NORM_EPSILON).sqrt().recip();
    for x in v.iter_mut() {
        *x *= inv_norm;
    }
}

/// Normalizes every row of a pooled `[B, H]` matrix to unit length.
pub fn l2_normalize_rows(pooled: &mut Array2<f32>) {
    for mut row in pooled.rows_mut() {
        match row.as_slice_mut() {
            Some(values) => l2_normalize_in_place(values),
            None => {
                let norm_sq: f32 = row.iter().map(|x| x * x).sum();
                let inv_norm = norm_sq.max(NORM_EPSILON).sqrt().recip();
                row.mapv_inplace(|x| x * inv_norm);
            }
        }
    }
}
