//! hmm — parameter estimation for discrete-state hidden Markov models.
//!
//! Purpose
//! -------
//! Fit the initial distribution, transition structure and emission
//! parameters of an HMM to a batch of sequences, either by EM (conjugate
//! Dirichlet updates plus a gradient emission step) or by minibatch SGD on
//! the marginal likelihood, and expose read-only inference under the
//! current parameters.
//!
//! Key behaviors
//! -------------
//! - [`core`]: bijectors, parameters and their flattened unconstrained view,
//!   distributions, the validated [`Batch`](core::Batch), and options.
//! - [`models`]: the [`HiddenMarkovModel`](models::HiddenMarkovModel) trait
//!   and the concrete [`StandardHmm`](models::StandardHmm) and
//!   [`CovariateHmm`](models::CovariateHmm).
//! - [`errors`]: the [`HmmError`](errors::HmmError) taxonomy.
//!
//! Invariants & assumptions
//! ------------------------
//! - The number of states and every parameter shape are fixed at
//!   construction.
//! - Parameters stay inside their domains by construction: optimizers only
//!   see unconstrained vectors.
//! - Shape and domain violations fail fast; numerical degeneracy and
//!   optimizer divergence surface as distinct errors.
//!
//! Downstream usage
//! ----------------
//! - Build a model, wrap data in a `Batch`, call `fit_em` or `fit_sgd`, then
//!   use `filter`, `smoother`, `most_likely_states` or `marginal_log_prob`
//!   on the fitted model.
//!
//! Testing notes
//! -------------
//! - Unit tests live next to each component; `tests/` holds end-to-end
//!   recovery, monotonicity and minibatch-invariance checks.

pub mod core;
pub mod errors;
pub mod models;

pub mod prelude {
    pub use super::core::{Batch, EmOptions, MStepOptions, MStepSolver, ParamGroup};
    pub use super::errors::{HmmError, HmmResult};
    pub use super::models::{
        CategoricalEmissions, CovariateHmm, EmFit, EmissionModel, GaussianEmissions,
        HiddenMarkovModel, PoissonEmissions, SgdFit, StandardHmm,
    };
}
