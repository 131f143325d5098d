//! Explicit SIMD kernels using the `wide` crate for portable vectorization.
//!
//! Every kernel processes 8 lanes at a time with fused multiply-add and
//! finishes the tail with scalar code. Callers validate dimensions first;
//! the kernels only `debug_assert!` equal lengths.

use wide::f32x8;

/// Dot product of two equal-length slices.
#[inline]
#[must_use]
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "Vector dimensions must match");

    let simd_len = a.len() / 8;
    let mut sum = f32x8::ZERO;

    for i in 0..simd_len {
        let offset = i * 8;
        let va = f32x8::from(&a[offset..offset + 8]);
        let vb = f32x8::from(&b[offset..offset + 8]);
        sum = va.mul_add(vb, sum);
    }

    let mut result = sum.reduce_add();
    for i in simd_len * 8..a.len() {
        result += a[i] * b[i];
    }
    result
}

/// Squared L2 distance. Avoids the sqrt when only ranking matters.
#[inline]
#[must_use]
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "Vector dimensions must match");

    let simd_len = a.len() / 8;
    let mut sum = f32x8::ZERO;

    for i in 0..simd_len {
        let offset = i * 8;
        let va = f32x8::from(&a[offset..offset + 8]);
        let vb = f32x8::from(&b[offset..offset + 8]);
        let diff = va - vb;
        sum = diff.mul_add(diff, sum);
    }

    let mut result = sum.reduce_add();
    for i in simd_len * 8..a.len() {
        let diff = a[i] - b[i];
        result += diff * diff;
    }
    result
}

/// L1 (Manhattan) distance.
#[inline]
#[must_use]
pub fn l1(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "Vector dimensions must match");

    let simd_len = a.len() / 8;
    let mut sum = f32x8::ZERO;

    for i in 0..simd_len {
        let offset = i * 8;
        let va = f32x8::from(&a[offset..offset + 8]);
        let vb = f32x8::from(&b[offset..offset + 8]);
        sum = sum + (va - vb).abs();
    }

    let mut result = sum.reduce_add();
    for i in simd_len * 8..a.len() {
        result += (a[i] - b[i]).abs();
    }
    result
}

/// Cosine similarity with a single fused pass over dot product and both norms.
///
/// Returns 0 when either vector has zero norm.
#[inline]
#[must_use]
#[allow(clippy::similar_names)]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "Vector dimensions must match");

    let simd_len = a.len() / 8;
    let mut dot_sum = f32x8::ZERO;
    let mut norm_a_sum = f32x8::ZERO;
    let mut norm_b_sum = f32x8::ZERO;

    for i in 0..simd_len {
        let offset = i * 8;
        let va = f32x8::from(&a[offset..offset + 8]);
        let vb = f32x8::from(&b[offset..offset + 8]);
        dot_sum = va.mul_add(vb, dot_sum);
        norm_a_sum = va.mul_add(va, norm_a_sum);
        norm_b_sum = vb.mul_add(vb, norm_b_sum);
    }

    let mut dot = dot_sum.reduce_add();
    let mut norm_a_sq = norm_a_sum.reduce_add();
    let mut norm_b_sq = norm_b_sum.reduce_add();

    for i in simd_len * 8..a.len() {
        let (ai, bi) = (a[i], b[i]);
        dot += ai * bi;
        norm_a_sq += ai * ai;
        norm_b_sq += bi * bi;
    }

    let norm_a = norm_a_sq.sqrt();
    let norm_b = norm_b_sq.sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// L2 norm of a vector.
#[inline]
#[must_use]
pub fn norm(v: &[f32]) -> f32 {
    dot_product(v, v).sqrt()
}
