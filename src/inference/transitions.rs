//! Transition tensors and expected transition statistics.
//!
//! A model either has one transition matrix shared by every step
//! ([`TransitionMatrices::Homogeneous`]) or one matrix per step, driven by
//! covariates ([`TransitionMatrices::TimeVarying`]). The rank of the tensor
//! decides whether expected transition counts are summed over time or kept
//! per step; [`TransitionMatrices::reduces_over_time`] is the only place that
//! decision is made.
use crate::inference::{
    errors::{InferenceError, InferenceResult},
    smoother::SmoothedPosterior,
    validation::check_probabilities,
};
use crate::optimization::numerical_stability::safe_ln;
use ndarray::{Array2, Array3, ArrayView2, Axis, s};

/// Transition matrix (K×K) or per-step transition tensor ((T−1)×K×K).
///
/// Entry `[t, i, j]` of the time-varying form is `P(z_{t+1} = j | z_t = i)`.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionMatrices {
    Homogeneous(Array2<f64>),
    TimeVarying(Array3<f64>),
}

impl TransitionMatrices {
    /// Tensor rank: 2 for a shared matrix, 3 for per-step matrices.
    pub fn ndim(&self) -> usize {
        match self {
            TransitionMatrices::Homogeneous(_) => 2,
            TransitionMatrices::TimeVarying(_) => 3,
        }
    }

    /// `true` when expected transition counts should be summed over time.
    pub fn reduces_over_time(&self) -> bool {
        self.ndim() == 2
    }

    pub fn num_states(&self) -> usize {
        match self {
            TransitionMatrices::Homogeneous(a) => a.nrows(),
            TransitionMatrices::TimeVarying(a) => a.len_of(Axis(1)),
        }
    }

    /// Matrix governing the transition from step `t` to `t + 1`.
    pub fn at(&self, t: usize) -> ArrayView2<'_, f64> {
        match self {
            TransitionMatrices::Homogeneous(a) => a.view(),
            TransitionMatrices::TimeVarying(a) => a.index_axis(Axis(0), t),
        }
    }

    /// Check the shape against `k` states and a sequence of `t_len` steps,
    /// and that entries are valid probabilities.
    pub fn validate(&self, k: usize, t_len: usize) -> InferenceResult<()> {
        match self {
            TransitionMatrices::Homogeneous(a) => {
                if a.dim() != (k, k) {
                    return Err(InferenceError::TransitionShape {
                        expected: vec![k, k],
                        found: a.shape().to_vec(),
                    });
                }
                check_probabilities("transition matrix", a.iter().copied())
            }
            TransitionMatrices::TimeVarying(a) => {
                let expected = (t_len.saturating_sub(1), k, k);
                if a.dim() != expected {
                    return Err(InferenceError::TransitionShape {
                        expected: vec![expected.0, k, k],
                        found: a.shape().to_vec(),
                    });
                }
                check_probabilities("transition tensor", a.iter().copied())
            }
        }
    }
}

/// Expected transition statistics.
///
/// - `Summed`: `Σ_t ξ_t`, shape K×K.
/// - `PerStep`: `ξ_t` for each step, shape (T−1)×K×K.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionProbs {
    Summed(Array2<f64>),
    PerStep(Array3<f64>),
}

impl TransitionProbs {
    /// Total expected number of transitions (T − 1 for a valid posterior).
    pub fn total(&self) -> f64 {
        match self {
            TransitionProbs::Summed(x) => x.sum(),
            TransitionProbs::PerStep(x) => x.sum(),
        }
    }

    /// Sum of `ξ ⊙ ln A` against the matching transition tensor.
    ///
    /// Summed statistics pair with a homogeneous matrix and per-step
    /// statistics with a time-varying tensor; a per-step statistic can also
    /// be paired with a homogeneous matrix.
    pub fn expected_log_transitions(&self, transitions: &TransitionMatrices) -> InferenceResult<f64> {
        match (self, transitions) {
            (TransitionProbs::Summed(xi), TransitionMatrices::Homogeneous(a)) => {
                check_same_shape(xi.shape(), a.shape())?;
                Ok(weighted_log_sum(xi.iter().copied(), a.iter().copied()))
            }
            (TransitionProbs::PerStep(xi), TransitionMatrices::TimeVarying(a)) => {
                check_same_shape(xi.shape(), a.shape())?;
                Ok(weighted_log_sum(xi.iter().copied(), a.iter().copied()))
            }
            (TransitionProbs::PerStep(xi), TransitionMatrices::Homogeneous(a)) => {
                let summed = xi.sum_axis(Axis(0));
                check_same_shape(summed.shape(), a.shape())?;
                Ok(weighted_log_sum(summed.iter().copied(), a.iter().copied()))
            }
            (TransitionProbs::Summed(xi), TransitionMatrices::TimeVarying(a)) => {
                Err(InferenceError::PosteriorShape {
                    expected: a.shape().to_vec(),
                    found: xi.shape().to_vec(),
                })
            }
        }
    }
}

fn check_same_shape(found: &[usize], expected: &[usize]) -> InferenceResult<()> {
    if found != expected {
        return Err(InferenceError::PosteriorShape {
            expected: expected.to_vec(),
            found: found.to_vec(),
        });
    }
    Ok(())
}

// Σ w·ln p with 0·ln 0 = 0.
fn weighted_log_sum(weights: impl Iterator<Item = f64>, probs: impl Iterator<Item = f64>) -> f64 {
    weights.zip(probs).filter(|(w, _)| *w != 0.0).map(|(w, p)| w * safe_ln(p)).sum()
}

/// compute_transition_probs — expected transition counts from a smoothed posterior.
///
/// ξ_t(i, j) = filtered_t(i) · A_t(i, j) · smoothed_{t+1}(j) / predicted_{t+1}(j),
/// with the ratio taken as zero where the predicted mass is zero.
///
/// `reduce_sum = true` returns `Σ_t ξ_t`; otherwise every `ξ_t` is kept.
/// Callers choose `reduce_sum` with [`TransitionMatrices::reduces_over_time`].
///
/// # Errors
/// - `InferenceError::PosteriorShape` if the posterior arrays disagree.
/// - `InferenceError::TransitionShape` if the transitions do not match the
///   posterior's `T` and `K`.
pub fn compute_transition_probs(
    transitions: &TransitionMatrices, posterior: &SmoothedPosterior, reduce_sum: bool,
) -> InferenceResult<TransitionProbs> {
    let (t_len, k) = posterior.validate()?;
    transitions.validate(k, t_len)?;

    let steps = t_len - 1;
    let mut per_step = Array3::<f64>::zeros((steps, k, k));
    for t in 0..steps {
        let a = transitions.at(t);
        let filtered = posterior.filtered_probs.row(t);
        let smoothed_next = posterior.smoothed_probs.row(t + 1);
        let predicted_next = posterior.predicted_probs.row(t + 1);
        let mut xi = per_step.slice_mut(s![t, .., ..]);
        for i in 0..k {
            for j in 0..k {
                let pred = predicted_next[j];
                let ratio = if pred > 0.0 { smoothed_next[j] / pred } else { 0.0 };
                xi[[i, j]] = filtered[i] * a[[i, j]] * ratio;
            }
        }
    }

    if reduce_sum {
        Ok(TransitionProbs::Summed(per_step.sum_axis(Axis(0))))
    } else {
        Ok(TransitionProbs::PerStep(per_step))
    }
}
