//! sgd — minibatch Adam for objectives over indivisible examples.
//!
//! Purpose
//! -------
//! Minimize losses defined over subsets of whole examples (HMM sequences),
//! as used by the gradient part of the M-step and by direct marginal
//! likelihood training.
//!
//! Key behaviors
//! -------------
//! - [`run_sgd`] iterates epochs of minibatches (contiguous or seeded
//!   shuffled index chunks, last partial chunk kept) and applies [`Adam`]
//!   updates, returning the final parameters and per-epoch mean losses.
//! - Objectives without an analytic gradient fall back to
//!   [`fd_gradient`](crate::optimization::loglik_optimizer::fd_gradient).
//!
//! Conventions
//! -----------
//! - Objectives return *losses*; the runner descends.
//! - All randomness comes from one `ChaCha8Rng` seeded by
//!   [`SgdOptions::seed`], so runs are reproducible.

pub mod adam;
pub mod run;
pub mod traits;

pub use self::adam::{Adam, AdamConfig};
pub use self::run::run_sgd;
pub use self::traits::{MinibatchObjective, SgdOptions, SgdOutcome};
