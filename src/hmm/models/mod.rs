//! hmm::models — model interface, objectives and concrete HMMs.
//!
//! - [`base`]: [`HiddenMarkovModel`] with the statistic extractors, inference
//!   surface, E-step, generic M-step, and the EM / SGD loops; plus the pure
//!   [`em_step`].
//! - [`objectives`]: [`ExpectedLogJoint`] and [`MarginalLogLik`].
//! - [`emissions`]: Gaussian, Poisson and categorical emission families.
//! - [`standard`]: [`StandardHmm`] with conjugate Dirichlet updates.
//! - [`covariate`]: [`CovariateHmm`] with softmax-regression transitions.

pub mod base;
pub mod covariate;
pub mod emissions;
pub mod objectives;
pub mod standard;

pub use self::base::{EmFit, HiddenMarkovModel, HmmPosterior, SgdFit, em_step, gradient_m_step};
pub use self::covariate::CovariateHmm;
pub use self::emissions::{
    CategoricalEmissions, EmissionModel, GaussianEmissions, PoissonEmissions,
};
pub use self::objectives::{ExpectedLogJoint, MarginalLogLik};
pub use self::standard::StandardHmm;
