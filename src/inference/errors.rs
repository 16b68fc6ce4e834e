//! Errors raised by the HMM dynamic-programming primitives.
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferenceError {
    // ---- Shapes ----
    /// Sequences must contain at least one time step.
    #[error("Inference Error: sequence has no time steps")]
    EmptySequence,

    /// Models must have at least one state.
    #[error("Inference Error: model has no states")]
    NoStates,

    /// Initial distribution length must equal the number of states.
    #[error("Inference Error: initial distribution has length {found}, expected {expected}")]
    InitialLength { expected: usize, found: usize },

    /// Transition matrices must be K×K, or (T−1)×K×K when time-varying.
    #[error("Inference Error: transition tensor has shape {found:?}, expected {expected:?}")]
    TransitionShape { expected: Vec<usize>, found: Vec<usize> },

    /// Conditional log-likelihoods must be T×K.
    #[error("Inference Error: log-likelihoods have {found} states per step, expected {expected}")]
    LogLikelihoodStates { expected: usize, found: usize },

    /// Posterior arrays must agree with each other and with the transitions.
    #[error("Inference Error: posterior has shape {found:?}, expected {expected:?}")]
    PosteriorShape { expected: Vec<usize>, found: Vec<usize> },

    // ---- Numerical degeneracy ----
    /// Every state has zero predictive mass at step `t`.
    #[error("Inference Error: zero likelihood at time step {t}")]
    ZeroLikelihood { t: usize },

    /// A log-likelihood entry is NaN or +∞.
    #[error("Inference Error: invalid log-likelihood {value} at step {t}, state {state}")]
    InvalidLogLikelihood { t: usize, state: usize, value: f64 },

    /// Probabilities must be finite and non-negative.
    #[error("Inference Error: invalid probability {value} in {what} at index {index}")]
    InvalidProbability { what: &'static str, index: usize, value: f64 },
}

pub type InferenceResult<T> = Result<T, InferenceError>;
