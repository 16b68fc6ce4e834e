//! hmm::core — building blocks shared by every HMM model.
//!
//! Purpose
//! -------
//! Hold the pieces that models are assembled from: reparameterizing
//! bijectors, parameters with a flattened unconstrained view, probability
//! distributions, the validated batch container, training options, and
//! shape checks.
//!
//! Key behaviors
//! -------------
//! - [`bijectors`]: `Identity`, `Softplus` and `SoftmaxCentered` maps between
//!   constrained values and ℝⁿ.
//! - [`parameter`]: [`Parameter`], [`AnyParameter`], [`flatten`] and
//!   [`unflatten`] over parameter groups.
//! - [`distributions`]: `Categorical`, `Dirichlet` (including the posterior
//!   mode policy) and the tagged [`EmissionDistribution`].
//! - [`data`]: [`Batch`].
//! - [`options`]: [`EmOptions`], [`MStepOptions`], [`MStepSolver`].
//!
//! Invariants & assumptions
//! ------------------------
//! - A parameter's constrained value is always inside its bijector's domain;
//!   every mutation path goes through `Parameter::set_value`.
//! - Batches are rectangular (`N×T×D`) and finite.

pub mod bijectors;
pub mod data;
pub mod distributions;
pub mod options;
pub mod parameter;
pub mod validation;

pub use self::bijectors::Bijector;
pub use self::data::Batch;
pub use self::distributions::{Categorical, Dirichlet, EmissionDistribution};
pub use self::options::{EmOptions, MStepOptions, MStepSolver};
pub use self::parameter::{AnyParameter, ParamGroup, Parameter, flatten, num_trainable, unflatten};
