//! optimization::errors — unified error surface for the optimizer layer.
//!
//! Every optimizer entrypoint in this crate (L-BFGS via argmin, minibatch
//! Adam, finite differences) reports failures as [`OptError`]. Backend errors
//! are normalized through `From<argmin::core::Error>`; model failures raised
//! inside an objective arrive through `From<HmmError>` so that nothing in the
//! optimization path needs to panic.
use argmin::core::{ArgminError, Error};
use thiserror::Error;

use crate::hmm::errors::HmmError;

/// Crate-wide result alias for optimizer operations.
pub type OptResult<T> = Result<T, OptError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptError {
    // ---- Gradient ----
    /// Implies that finite differences should be used.
    #[error("Gradient optimization not implemented")]
    GradientNotImplemented,

    /// Gradient dimensions do not match parameter dimensions.
    #[error("Gradient dimension mismatch: expected {expected}, found {found}")]
    GradientDimMismatch { expected: usize, found: usize },

    /// Gradient elements need to be finite.
    #[error("Invalid gradient at index {index}: {value}: {reason}")]
    InvalidGradient { index: usize, value: f64, reason: &'static str },

    // ---- MLEOptions ----
    /// Gradient tolerance needs to be positive and finite.
    #[error("Invalid gradient tolerance {tol}: {reason}")]
    InvalidTolGrad { tol: f64, reason: &'static str },

    /// Cost change tolerance needs to be positive and finite.
    #[error("Invalid cost function change tolerance {tol}: {reason}")]
    InvalidTolCost { tol: f64, reason: &'static str },

    /// Maximum iterations needs to be positive.
    #[error("Invalid maximum iterations {max_iter}: {reason}")]
    InvalidMaxIter { max_iter: usize, reason: &'static str },

    /// At least one tolerance must be provided.
    #[error("No tolerances provided")]
    NoTolerancesProvided,

    /// Invalid line searcher name.
    #[error("Invalid line searcher '{name}': {reason}")]
    InvalidLineSearch { name: String, reason: &'static str },

    /// lbfgs_mem needs to be at least 1.
    #[error("Invalid L-BFGS memory {mem}: {reason}")]
    InvalidLBFGSMem { mem: usize, reason: &'static str },

    // ---- SGD options ----
    /// Learning rate must be finite and > 0.
    #[error("Invalid learning rate {value}: {reason}")]
    InvalidLearningRate { value: f64, reason: &'static str },

    /// Adam moment decay rates must lie in [0, 1); eps must be finite and > 0.
    #[error("Invalid Adam hyperparameter {name} = {value}: {reason}")]
    InvalidAdamParam { name: &'static str, value: f64, reason: &'static str },

    /// Minibatches need at least one example.
    #[error("Invalid batch size {batch_size}: {reason}")]
    InvalidBatchSize { batch_size: usize, reason: &'static str },

    /// The objective has no examples to iterate over.
    #[error("Objective has no examples to draw minibatches from")]
    EmptyDataset,

    // ---- Cost function ----
    /// Cost function returned a non-finite value.
    #[error("Non-finite cost value: {value}")]
    NonFiniteCost { value: f64 },

    // ---- Optimizer outcome ----
    /// Estimated parameters must be finite.
    #[error("Invalid estimated parameter at index {index}: {value}: {reason}")]
    InvalidThetaHat { index: usize, value: f64, reason: &'static str },

    /// Theta hat is missing.
    #[error("Missing estimated parameters (theta hat)")]
    MissingThetaHat,

    /// Unconstrained optimization input must have finite values.
    #[error("Invalid theta input at index {index}: {value}, must be finite")]
    InvalidThetaInput { index: usize, value: f64 },

    // ---- Argmin ----
    /// Wrapper for argmin::InvalidParameter
    #[error("Invalid parameter: {text}")]
    InvalidParameter { text: String },
    /// Wrapper for argmin::NotImplemented
    #[error("Not implemented: {text}")]
    NotImplemented { text: String },
    /// Wrapper for argmin::NotInitialized
    #[error("Not initialized: {text}")]
    NotInitialized { text: String },
    /// Wrapper for argmin::ConditionViolated
    #[error("Condition violated: {text}")]
    ConditionViolated { text: String },
    /// Wrapper for argmin::CheckPointNotFound
    #[error("Checkpoint not found: {text}")]
    CheckPointNotFound { text: String },
    /// Wrapper for argmin::PotentialBug
    #[error("Potential bug: {text}")]
    PotentialBug { text: String },
    /// Wrapper for argmin::ImpossibleError
    #[error("Impossible error: {text}")]
    ImpossibleError { text: String },
    /// Wrapper for other argmin::Error types
    #[error("Backend error: {text}")]
    BackendError { text: String },

    // ---- Model ----
    /// The objective's model layer rejected the parameters or data.
    #[error("Model evaluation failed: {text}")]
    Model { text: String },

    // ---- Fallback ----
    #[error("Unknown error")]
    UnknownError,
}

impl From<Error> for OptError {
    fn from(original_err: Error) -> Self {
        // Our own errors travel through argmin boxed; recover them first.
        let original_err = match original_err.downcast::<OptError>() {
            Ok(opt_err) => return opt_err,
            Err(err) => err,
        };
        match original_err.downcast::<ArgminError>() {
            Ok(argmin_err) => match argmin_err {
                ArgminError::InvalidParameter { text } => OptError::InvalidParameter { text },
                ArgminError::NotImplemented { text } => OptError::NotImplemented { text },
                ArgminError::NotInitialized { text } => OptError::NotInitialized { text },
                ArgminError::ConditionViolated { text } => OptError::ConditionViolated { text },
                ArgminError::CheckpointNotFound { text } => OptError::CheckPointNotFound { text },
                ArgminError::PotentialBug { text } => OptError::PotentialBug { text },
                ArgminError::ImpossibleError { text } => OptError::ImpossibleError { text },
                _ => OptError::UnknownError,
            },
            Err(err) => OptError::BackendError { text: err.to_string() },
        }
    }
}

impl From<HmmError> for OptError {
    fn from(err: HmmError) -> Self {
        match err {
            HmmError::Optimization(inner) => inner,
            other => OptError::Model { text: other.to_string() },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    // Purpose
    // -------
    // An `OptError` raised inside an argmin cost function must come back out
    // of the backend unchanged rather than as an opaque `BackendError`.
    //
    // Given
    // -----
    // - `OptError::NonFiniteCost` boxed into `argmin::core::Error`.
    //
    // Expect
    // ------
    // - Converting back yields the same variant and payload.
    fn from_argmin_error_recovers_boxed_opt_error() {
        // Arrange
        let boxed: Error = OptError::NonFiniteCost { value: f64::INFINITY }.into();

        // Act
        let recovered = OptError::from(boxed);

        // Assert
        assert_eq!(recovered, OptError::NonFiniteCost { value: f64::INFINITY });
    }

    #[test]
    // Purpose
    // -------
    // Model-layer failures are carried as text, except when they already wrap
    // an optimizer error, which is unwrapped.
    fn from_hmm_error_unwraps_nested_optimizer_errors() {
        let nested = HmmError::Optimization(OptError::EmptyDataset);
        assert_eq!(OptError::from(nested), OptError::EmptyDataset);

        let model = HmmError::EmptyBatch;
        match OptError::from(model) {
            OptError::Model { text } => assert!(text.contains("empty"), "got {text}"),
            other => panic!("expected Model variant, got {other:?}"),
        }
    }
}
