//! optimization — optimizers, numerical helpers, and unified error surface.
//!
//! Purpose
//! -------
//! Provide the optimization layer used by HMM training: a minibatch Adam
//! runner for losses over whole sequences, an argmin-backed L-BFGS
//! log-likelihood maximizer for full-batch M-steps, numerically stable
//! transforms between constrained and unconstrained parameters, and a single
//! error/result surface.
//!
//! Key behaviors
//! -------------
//! - `sgd`: [`sgd::run_sgd`] over any [`sgd::MinibatchObjective`], with
//!   seeded shuffling and per-epoch loss trajectories.
//! - `loglik_optimizer`: [`loglik_optimizer::maximize`] over any
//!   [`loglik_optimizer::LogLikelihood`], plus the shared finite-difference
//!   gradient.
//! - `numerical_stability`: softplus, centered softmax, log-sum-exp.
//! - `errors`: configuration issues, divergence, and backend errors
//!   normalized into [`errors::OptError`].
//!
//! Invariants & assumptions
//! ------------------------
//! - Optimizers operate on a flat unconstrained vector `θ` and report
//!   invalid states as `OptError`, never panics.
//! - Model failures raised inside objectives are converted into
//!   `OptError::Model` (or unwrapped when they already carry an
//!   `OptError`).
//!
//! Conventions
//! -----------
//! - `maximize` works in log-likelihood units; `run_sgd` works in loss
//!   units. Objectives state which one they implement.
//! - Progress is reported through `tracing` events at `debug`/`trace`
//!   level; this layer never installs a subscriber.
//!
//! Testing notes
//! -------------
//! - Unit tests in the submodules cover solver wiring on toy objectives,
//!   option validation and parsing, stable transforms, and error
//!   conversions. HMM integration tests exercise both optimizers end to end.

pub mod errors;
pub mod loglik_optimizer;
pub mod numerical_stability;
pub mod sgd;

pub mod prelude {
    pub use super::errors::{OptError, OptResult};
    pub use super::loglik_optimizer::prelude::*;
    pub use super::numerical_stability::prelude::*;
    pub use super::sgd::{AdamConfig, MinibatchObjective, SgdOptions, SgdOutcome, run_sgd};
}
