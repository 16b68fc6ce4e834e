//! loglik_optimizer — argmin-powered log-likelihood maximizer.
//!
//! Purpose
//! -------
//! Provide a full-batch, quasi-Newton alternative to minibatch Adam for the
//! gradient part of the HMM M-step. Objectives implement [`LogLikelihood`]
//! and are handed to [`maximize`], which runs L-BFGS with a configurable line
//! search, tolerances, and a finite-difference gradient fallback.
//!
//! Key behaviors
//! -------------
//! - Convert log-likelihoods `ℓ(θ)` into argmin cost functions
//!   `c(θ) = -ℓ(θ)` via [`adapter::ArgMinAdapter`].
//! - Validate options and the starting point, select a solver via
//!   [`builders`], execute it via [`run::run_lbfgs`], and normalize results
//!   into an [`OptimOutcome`].
//! - Provide [`finite_diff::fd_gradient`], the shared finite-difference
//!   gradient used here and by [`crate::optimization::sgd`].
//!
//! Invariants & assumptions
//! ------------------------
//! - The optimizer always maximizes `ℓ(θ)`; objectives implement `ℓ(θ)` and
//!   `∇ℓ(θ)`, never the cost directly.
//! - [`LogLikelihood::value`] and [`LogLikelihood::grad`] report invalid
//!   inputs as [`OptError`](crate::optimization::errors::OptError) values,
//!   not panics.
//!
//! Conventions
//! -----------
//! - Parameters live in the unconstrained space as [`Theta`]. Any mapping
//!   between constrained and unconstrained space happens in the model layer
//!   (`hmm::core::bijectors`).
//! - All user-facing diagnostics (including [`OptimOutcome::value`]) are in
//!   log-likelihood units.
//!
//! Testing notes
//! -------------
//! - Unit tests in submodules cover sign conventions in [`adapter`], solver
//!   construction in [`builders`], finite differences in [`finite_diff`],
//!   option parsing in [`traits`] and a concave bowl end to end in [`api`].
//! - The HMM integration tests run an EM fit with the L-BFGS M-step.

pub mod adapter;
pub mod api;
pub mod builders;
pub mod finite_diff;
pub mod run;
pub mod traits;
pub mod types;
pub mod validation;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::api::maximize;
pub use self::finite_diff::fd_gradient;
pub use self::traits::{LineSearcher, LogLikelihood, MLEOptions, OptimOutcome, Tolerances};
pub use self::types::{Cost, DEFAULT_LBFGS_MEM, FnEvalMap, Grad, Theta};

pub mod prelude {
    pub use super::api::maximize;
    pub use super::traits::{LineSearcher, LogLikelihood, MLEOptions, OptimOutcome, Tolerances};
    pub use super::types::{Cost, Grad, Theta};
}
