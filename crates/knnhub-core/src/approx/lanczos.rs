//! Dominant direction of a centered point subset.
//!
//! Golub–Kahan–Lanczos bidiagonalization builds an s-dimensional Krylov
//! basis of the centered data matrix `X̂` without forming it:
//!
//! ```text
//! X̂ V = U B,   B upper bidiagonal (diagonal α, superdiagonal β)
//! ```
//!
//! The dominant eigenvector `y` of the tridiagonal `BᵀB` is found by power
//! iteration; `X̂ (V y)` gives each point's coordinate along the approximate
//! first principal direction.

use crate::dataset::Dataset;
use crate::simd;
use rand::Rng;

const BREAKDOWN: f32 = 1e-10;

/// Krylov basis and power iteration limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct KrylovParams {
    pub subspace_dim: usize,
    pub max_iterations: usize,
    /// L1 change per basis dimension below which power iteration stops.
    pub tolerance_per_dim: f32,
}

/// Points of a subset with their centroid subtracted on the fly.
struct CenteredSubset<'a, D: ?Sized> {
    dataset: &'a D,
    indices: &'a [usize],
    centroid: &'a [f32],
}

impl<D: Dataset + ?Sized> CenteredSubset<'_, D> {
    /// `X̂ v`: one value per member.
    fn apply(&self, v: &[f32]) -> Vec<f32> {
        let shift = simd::dot_product(self.centroid, v);
        self.indices
            .iter()
            .map(|&i| simd::dot_product(self.dataset.instance(i), v) - shift)
            .collect()
    }

    /// `X̂ᵀ u`: one value per feature.
    fn apply_transpose(&self, u: &[f32]) -> Vec<f32> {
        let mut out = vec![0.0f32; self.centroid.len()];
        for (&i, &weight) in self.indices.iter().zip(u) {
            for (o, x) in out.iter_mut().zip(self.dataset.instance(i)) {
                *o += weight * x;
            }
        }
        let total: f32 = u.iter().sum();
        for (o, c) in out.iter_mut().zip(self.centroid) {
            *o -= total * c;
        }
        out
    }
}

/// Scales `v` to unit length; returns the original norm.
fn normalize(v: &mut [f32]) -> f32 {
    let norm = simd::norm(v);
    if norm > BREAKDOWN {
        v.iter_mut().for_each(|x| *x /= norm);
    }
    norm
}

/// `y -= a * x`
fn subtract_scaled(y: &mut [f32], a: f32, x: &[f32]) {
    for (yi, xi) in y.iter_mut().zip(x) {
        *yi -= a * xi;
    }
}

/// Full reorthogonalization against an orthonormal basis.
fn reorthogonalize(r: &mut [f32], basis: &[Vec<f32>]) {
    for q in basis {
        let dot = simd::dot_product(q, r);
        subtract_scaled(r, dot, q);
    }
}

/// Projection of every member onto the approximate dominant direction.
///
/// Returns all zeros when the members coincide with their centroid.
pub(crate) fn dominant_projection<D, R>(
    dataset: &D,
    indices: &[usize],
    centroid: &[f32],
    params: KrylovParams,
    rng: &mut R,
) -> Vec<f32>
where
    D: Dataset + ?Sized,
    R: Rng,
{
    let m = indices.len();
    let dim = centroid.len();
    let s = params.subspace_dim.min(dim).min(m);
    if s == 0 {
        return vec![0.0; m];
    }
    let x = CenteredSubset {
        dataset,
        indices,
        centroid,
    };

    let mut start: Vec<f32> = (0..dim).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
    if normalize(&mut start) <= BREAKDOWN {
        start.iter_mut().for_each(|v| *v = 0.0);
        start[0] = 1.0;
    }

    let mut v_basis = vec![start];
    let mut u_basis: Vec<Vec<f32>> = Vec::with_capacity(s);
    let mut alphas = Vec::with_capacity(s);
    let mut betas = Vec::with_capacity(s);
    let mut p = x.apply(&v_basis[0]);

    loop {
        let alpha = normalize(&mut p);
        if alpha <= BREAKDOWN {
            break;
        }
        alphas.push(alpha);
        u_basis.push(p);
        let j = alphas.len() - 1;
        if alphas.len() == s {
            break;
        }

        let mut r = x.apply_transpose(&u_basis[j]);
        subtract_scaled(&mut r, alpha, &v_basis[j]);
        reorthogonalize(&mut r, &v_basis);
        let beta = normalize(&mut r);
        if beta <= BREAKDOWN {
            break;
        }
        betas.push(beta);
        v_basis.push(r);

        p = x.apply(&v_basis[j + 1]);
        subtract_scaled(&mut p, beta, &u_basis[j]);
        reorthogonalize(&mut p, &u_basis);
    }

    let s = alphas.len();
    if s == 0 {
        return vec![0.0; m];
    }
    v_basis.truncate(s);
    betas.truncate(s - 1);

    // BᵀB is symmetric tridiagonal.
    let diagonal: Vec<f32> = (0..s)
        .map(|j| alphas[j] * alphas[j] + if j > 0 { betas[j - 1] * betas[j - 1] } else { 0.0 })
        .collect();
    let off_diagonal: Vec<f32> = (0..s - 1).map(|j| alphas[j] * betas[j]).collect();
    let y = power_iteration(&diagonal, &off_diagonal, params);

    let mut direction = vec![0.0f32; dim];
    for (coefficient, v) in y.iter().zip(&v_basis) {
        for (d, vi) in direction.iter_mut().zip(v) {
            *d += coefficient * vi;
        }
    }
    x.apply(&direction)
}

/// Dominant eigenvector of a symmetric tridiagonal matrix.
///
/// Starts from the normalized ones vector; stops when the L1 change drops
/// below `s * tolerance_per_dim` or after `max_iterations`.
pub(crate) fn power_iteration(diagonal: &[f32], off_diagonal: &[f32], params: KrylovParams) -> Vec<f32> {
    let s = diagonal.len();
    if s == 0 {
        return Vec::new();
    }
    let tolerance = s as f32 * params.tolerance_per_dim;
    let mut y = vec![1.0 / (s as f32).sqrt(); s];

    for iteration in 0..params.max_iterations {
        let mut next: Vec<f32> = (0..s)
            .map(|i| {
                let mut sum = diagonal[i] * y[i];
                if i > 0 {
                    sum += off_diagonal[i - 1] * y[i - 1];
                }
                if i + 1 < s {
                    sum += off_diagonal[i] * y[i + 1];
                }
                sum
            })
            .collect();
        if normalize(&mut next) <= BREAKDOWN {
            break;
        }
        let change: f32 = next.iter().zip(&y).map(|(a, b)| (a - b).abs()).sum();
        y = next;
        if change < tolerance {
            tracing::trace!(iteration, change, "Power iteration converged");
            break;
        }
    }
    y
}
