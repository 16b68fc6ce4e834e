//! Shape and domain checks shared by the inference primitives.
use crate::inference::{
    errors::{InferenceError, InferenceResult},
    transitions::TransitionMatrices,
};
use ndarray::{ArrayView1, ArrayView2};

/// Check `(initial, transitions, log_likelihoods)` for a single sequence and
/// return `(T, K)`.
pub fn validate_inputs(
    initial: ArrayView1<f64>, transitions: &TransitionMatrices, log_likelihoods: ArrayView2<f64>,
) -> InferenceResult<(usize, usize)> {
    let k = initial.len();
    if k == 0 {
        return Err(InferenceError::NoStates);
    }
    let (t_len, k_ll) = log_likelihoods.dim();
    if t_len == 0 {
        return Err(InferenceError::EmptySequence);
    }
    if k_ll != k {
        return Err(InferenceError::LogLikelihoodStates { expected: k, found: k_ll });
    }
    check_probabilities("initial distribution", initial.iter().copied())?;
    transitions.validate(k, t_len)?;
    for ((t, state), &value) in log_likelihoods.indexed_iter() {
        if value.is_nan() || value == f64::INFINITY {
            return Err(InferenceError::InvalidLogLikelihood { t, state, value });
        }
    }
    Ok((t_len, k))
}

pub(crate) fn check_probabilities(
    what: &'static str, values: impl Iterator<Item = f64>,
) -> InferenceResult<()> {
    for (index, value) in values.enumerate() {
        if !value.is_finite() || value < 0.0 {
            return Err(InferenceError::InvalidProbability { what, index, value });
        }
    }
    Ok(())
}
