//! Errors for HMM models (shapes, parameter domains, numerical degeneracy,
//! and optimizer failures).
//!
//! This module defines [`HmmError`], the single error type returned by the
//! model layer, and the [`HmmResult`] alias.
//!
//! ## Conventions
//! - **Indices are 0-based.** Sequence, time-step and state indices refer to
//!   positions in the batch arrays.
//! - Shape and domain violations are fatal and reported immediately; nothing
//!   is silently clamped or coerced.
//! - Numerical degeneracy (Dirichlet concentrations ≤ 0, zero-likelihood
//!   sequences, non-finite log joints) gets distinct variants so a caller
//!   running a fixed-length loop can tell it apart from bad input.
//! - Optimizer failures are wrapped as [`HmmError::Optimization`].
use crate::{inference::InferenceError, optimization::errors::OptError};
use thiserror::Error;

pub type HmmResult<T> = Result<T, HmmError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum HmmError {
    // ---- Shapes ----
    /// A batch must contain at least one sequence with at least one step.
    #[error("Batch is empty: at least one sequence with one time step is required")]
    EmptyBatch,

    /// Models need at least one state.
    #[error("Number of states must be at least 1")]
    NoStates,

    /// A parameter's array does not have the shape the model declared.
    #[error("Parameter '{name}' has shape {found:?}, expected {expected:?}")]
    ParameterShape { name: &'static str, expected: Vec<usize>, found: Vec<usize> },

    /// Emission vectors do not match the emission model dimension.
    #[error("Emission dimension is {found}, expected {expected}")]
    EmissionDim { expected: usize, found: usize },

    /// Covariates do not line up with the emissions or the model.
    #[error("Covariates have shape {found:?}, expected {expected:?}")]
    CovariateShape { expected: Vec<usize>, found: Vec<usize> },

    /// The model has homogeneous transitions and cannot use covariates.
    #[error("This model does not accept covariates")]
    CovariatesUnsupported,

    /// Flattened parameter vector has the wrong length.
    #[error("Unconstrained parameter vector has length {found}, expected {expected}")]
    ThetaLength { expected: usize, found: usize },

    /// One posterior per sequence is required.
    #[error("Got {found} posteriors for a batch of {expected} sequences")]
    PosteriorCount { expected: usize, found: usize },

    #[error("Sequence {index} is out of range for a batch of {num_sequences} sequences")]
    SequenceOutOfRange { index: usize, num_sequences: usize },

    // ---- Domain ----
    /// A value lies outside its parameter's bijector domain.
    #[error("Parameter '{name}' violates its domain at index {index} (value {value}): {reason}")]
    ParameterDomain { name: &'static str, index: usize, value: f64, reason: &'static str },

    /// A probability vector is not on the simplex.
    #[error("Invalid probability vector at index {index} (value {value}): {reason}")]
    InvalidProbabilities { index: usize, value: f64, reason: &'static str },

    /// Emissions must be finite.
    #[error("Non-finite emission at sequence {sequence}, step {t}, dim {dim}: {value}")]
    NonFiniteEmission { sequence: usize, t: usize, dim: usize, value: f64 },

    /// Covariates must be finite.
    #[error("Non-finite covariate at sequence {sequence}, step {t}, dim {dim}: {value}")]
    NonFiniteCovariate { sequence: usize, t: usize, dim: usize, value: f64 },

    /// An emission value is outside the support of its distribution family.
    #[error("Emission value {value} is outside the support: {reason}")]
    InvalidEmission { value: f64, reason: &'static str },

    /// A distribution rejected its parameters.
    #[error("Invalid distribution parameters: {text}")]
    InvalidDistribution { text: String },

    /// State index outside `0..K`.
    #[error("State {state} is out of range for a model with {num_states} states")]
    StateOutOfRange { state: usize, num_states: usize },

    // ---- Numerical degeneracy ----
    /// A Dirichlet concentration is non-positive or non-finite.
    #[error("Degenerate Dirichlet concentration at index {index}: {value}")]
    DegenerateConcentration { index: usize, value: f64 },

    /// The EM log joint became non-finite.
    #[error("Non-finite log joint {value} at EM iteration {iteration}")]
    NonFiniteLogJoint { iteration: usize, value: f64 },

    /// The emission family has no closed-form M-step.
    #[error("Closed-form emission update is not available for this emission model")]
    ClosedFormUnavailable,

    /// Filtering, smoothing or decoding failed.
    #[error(transparent)]
    Inference(#[from] InferenceError),

    // ---- Optimizer ----
    /// The gradient M-step or SGD fit failed.
    #[error("Optimization failed: {0}")]
    Optimization(#[from] OptError),
}
