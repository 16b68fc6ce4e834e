//! Bijectors between constrained parameter values and unconstrained space.
//!
//! Convention: `forward` maps a constrained value to ℝⁿ and `inverse` maps
//! back. Legality of a parameter is therefore structural: whatever vector an
//! optimizer proposes, `inverse` lands inside the domain.
//!
//! [`Bijector::SoftmaxCentered`] acts on the last axis, so a K×K transition
//! matrix is stored as K×(K−1) logits and every row stays on the simplex.
use crate::optimization::numerical_stability::{
    SIMPLEX_TOL, safe_softplus, safe_softplus_inv, softmax_centered, softmax_centered_inv,
};
use ndarray::{Array, Axis, Dimension};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bijector {
    /// ℝ ↔ ℝ.
    Identity,
    /// (0, ∞) ↔ ℝ through `ln(exp(x) − 1)`.
    Softplus,
    /// K-simplex along the last axis ↔ ℝ^{K−1}.
    SoftmaxCentered,
}

impl Bijector {
    /// Shape of the unconstrained representation of a value of shape `shape`.
    pub fn unconstrained_shape(&self, shape: &[usize]) -> Vec<usize> {
        let mut out = shape.to_vec();
        if let (Bijector::SoftmaxCentered, Some(last)) = (self, out.last_mut()) {
            *last = last.saturating_sub(1);
        }
        out
    }

    /// First element violating the domain, as `(flat index, value, reason)`.
    pub fn domain_violation<D: Dimension>(
        &self, value: &Array<f64, D>,
    ) -> Option<(usize, f64, &'static str)> {
        let first_bad = |pred: &dyn Fn(f64) -> bool, reason| {
            value.iter().enumerate().find(|(_, v)| pred(**v)).map(|(i, v)| (i, *v, reason))
        };
        match self {
            Bijector::Identity => first_bad(&|v| !v.is_finite(), "value must be finite"),
            Bijector::Softplus => {
                first_bad(&|v| !(v.is_finite() && v > 0.0), "value must be finite and > 0")
            }
            Bijector::SoftmaxCentered => {
                if value.ndim() == 0 || value.len_of(Axis(value.ndim() - 1)) == 0 {
                    return Some((0, f64::NAN, "simplex axis must be non-empty"));
                }
                if let Some(bad) =
                    first_bad(&|v| !(v.is_finite() && v >= 0.0), "probabilities must be >= 0")
                {
                    return Some(bad);
                }
                let k = value.len_of(Axis(value.ndim() - 1));
                value
                    .lanes(Axis(value.ndim() - 1))
                    .into_iter()
                    .enumerate()
                    .find(|(_, lane)| (lane.sum() - 1.0).abs() > SIMPLEX_TOL)
                    .map(|(row, lane)| (row * k, lane.sum(), "probabilities must sum to 1"))
            }
        }
    }

    /// Constrained → unconstrained.
    pub fn forward<D: Dimension>(&self, value: &Array<f64, D>) -> Array<f64, D> {
        match self {
            Bijector::Identity => value.clone(),
            Bijector::Softplus => value.mapv(safe_softplus_inv),
            Bijector::SoftmaxCentered => {
                let last = Axis(value.ndim() - 1);
                let mut dim = value.raw_dim();
                dim[last.index()] -= 1;
                let mut out = Array::<f64, D>::zeros(dim);
                for (probs, logits) in value.lanes(last).into_iter().zip(out.lanes_mut(last)) {
                    softmax_centered_inv(probs, logits);
                }
                out
            }
        }
    }

    /// Unconstrained → constrained.
    pub fn inverse<D: Dimension>(&self, value: &Array<f64, D>) -> Array<f64, D> {
        match self {
            Bijector::Identity => value.clone(),
            Bijector::Softplus => value.mapv(safe_softplus),
            Bijector::SoftmaxCentered => {
                let last = Axis(value.ndim() - 1);
                let mut dim = value.raw_dim();
                dim[last.index()] += 1;
                let mut out = Array::<f64, D>::zeros(dim);
                for (logits, probs) in value.lanes(last).into_iter().zip(out.lanes_mut(last)) {
                    softmax_centered(logits, probs);
                }
                out
            }
        }
    }
}
