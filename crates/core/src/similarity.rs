//! Vector similarity.

use crate::{CoreError, CoreResult};

/// Cosine similarity between two vectors: `dot(a, b) / (|a| * |b|)`.
///
/// Returns `NaN` when either vector has zero magnitude or the lengths differ. Callers must treat
/// `NaN` as a failure rather than a low score; [`similarity_score`] does that for them.
///
/// Accumulation happens in `f64`; finite results are clamped to `[-1, 1]` so rounding error never
/// escapes the cosine range.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return f64::NAN;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let similarity = dot / (norm_a.sqrt() * norm_b.sqrt());
    if similarity.is_finite() {
        similarity.clamp(-1.0, 1.0)
    } else {
        f64::NAN
    }
}

/// Checked variant of [`cosine_similarity`].
///
/// # Errors
///
/// - [`CoreError::DimensionMismatch`] if the vectors differ in length.
/// - [`CoreError::DegenerateSimilarity`] if the similarity is undefined.
pub fn similarity_score(a: &[f32], b: &[f32]) -> CoreResult<f64> {
    if a.len() != b.len() {
        return Err(CoreError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let similarity = cosine_similarity(a, b);
    if similarity.is_nan() {
        return Err(CoreError::DegenerateSimilarity);
    }
    Ok(similarity)
}
