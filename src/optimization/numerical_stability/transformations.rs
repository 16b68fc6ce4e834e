//! Numerical stability utilities.
//!
//! Provides safe implementations of common nonlinear transforms
//! that are prone to overflow/underflow in naïve form.
//! The functions here follow guarded strategies similar to those
//! in major ML libraries (e.g. PyTorch, TensorFlow), using explicit
//! cutoffs (`x > 20.0`) to keep `f64` arithmetic in a well-conditioned regime.
//!
//! # Provided items
//! - [`PROB_FLOOR`]: smallest probability admitted before taking logs.
//! - [`safe_softplus(x)`]: stable version of `ln(1 + exp(x))`,
//!   mapping ℝ → (0, ∞) without overflow.
//! - [`safe_softplus_inv(x)`]: inverse of softplus, mapping
//!   (0, ∞) → ℝ without catastrophic cancellation.
//! - [`safe_logistic(x)`]: derivative of softplus, `1 / (1 + exp(-x))`.
//! - [`log_sum_exp`]: max-shifted `ln Σ exp(xᵢ)`.
//! - [`softmax_centered`] / [`softmax_centered_inv`]: bijection between
//!   ℝ^{K−1} and the interior of the K-simplex with the last logit pinned
//!   to zero.
//!
//! # Rationale
//! These transforms are building blocks in optimization and
//! probabilistic modeling whenever parameters must be kept
//! strictly positive or on a probability simplex.
use ndarray::{ArrayView1, ArrayViewMut1};

/// Smallest probability admitted before taking a logarithm.
///
/// Probabilities produced by the simplex transforms are strictly positive in
/// exact arithmetic but can underflow to zero; clamping to this floor keeps
/// the inverse map finite.
pub const PROB_FLOOR: f64 = 1e-12;

/// Absolute tolerance used when checking that a vector sums to one.
pub const SIMPLEX_TOL: f64 = 1e-6;

/// Numerically stable softplus: `softplus(x) = ln(1 + exp(x))`.
///
/// - For sufficiently large `x`, `softplus(x) ≈ x + ln1p(exp(-x)) ≈ x`.
/// - Otherwise, it falls back to `ln1p(exp(x))`.
///
/// The cutoff used here (`x > 20.0`) is a practical threshold that
/// keeps the calculation in a well-conditioned regime for `f64`.
pub fn safe_softplus(x: f64) -> f64 {
    if x > 20.0 { x } else { x.exp().ln_1p() }
}

/// Stable inverse of softplus on `(0, ∞)`: solves for `t` in
/// `softplus(t) = x`, returning `t = ln(exp(x) - 1)`.
///
/// - For sufficiently large `x`, `ln(exp(x) - 1) ≈ x`.
/// - Otherwise, it uses `ln(expm1(x))`.
///
/// # Parameters
/// - `x`: a positive real (the softplus output), must be finite and `> 0`.
pub fn safe_softplus_inv(x: f64) -> f64 {
    if x > 20.0 { x } else { x.exp_m1().ln() }
}

/// Logistic sigmoid `σ(x) = 1 / (1 + exp(-x))`, evaluated without overflow
/// on either tail.
pub fn safe_logistic(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Logarithm with the argument clamped to [`PROB_FLOOR`].
///
/// Used for expected log-joint terms of the form `w · ln p`: a zero weight
/// against a zero probability then contributes `0` instead of `NaN`.
pub fn safe_ln(p: f64) -> f64 {
    p.max(PROB_FLOOR).ln()
}

/// Max-shifted `ln Σ exp(xᵢ)`.
///
/// Returns `-∞` for an empty view or when every entry is `-∞`.
pub fn log_sum_exp(values: ArrayView1<f64>) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    let sum: f64 = values.iter().map(|&v| (v - max).exp()).sum();
    max + sum.ln()
}

/// Map unconstrained logits `θ ∈ ℝ^{K−1}` onto the K-simplex.
///
/// `out[k] = exp(θ_k) / (1 + Σ exp(θ_j))` for `k < K−1` and
/// `out[K−1] = 1 / (1 + Σ exp(θ_j))`, computed with a max-shift that includes
/// the pinned zero logit.
///
/// Requires `out.len() == theta.len() + 1`.
pub fn softmax_centered(theta: ArrayView1<f64>, mut out: ArrayViewMut1<f64>) {
    debug_assert_eq!(out.len(), theta.len() + 1);
    let k = out.len();
    let max = theta.iter().copied().fold(0.0_f64, f64::max);
    let mut total = 0.0;
    for (dst, &logit) in out.iter_mut().take(k - 1).zip(theta.iter()) {
        *dst = (logit - max).exp();
        total += *dst;
    }
    out[k - 1] = (-max).exp();
    total += out[k - 1];
    out.mapv_inplace(|v| v / total);
}

/// Inverse of [`softmax_centered`]: `θ_k = ln p_k − ln p_{K−1}`.
///
/// Probabilities are clamped to [`PROB_FLOOR`] before taking logs.
/// Requires `out.len() + 1 == probs.len()`.
pub fn softmax_centered_inv(probs: ArrayView1<f64>, mut out: ArrayViewMut1<f64>) {
    debug_assert_eq!(out.len() + 1, probs.len());
    let last = safe_ln(probs[probs.len() - 1]);
    for (dst, &p) in out.iter_mut().zip(probs.iter()) {
        *dst = safe_ln(p) - last;
    }
}
