//! numerical_stability — numerically robust transformations.
//!
//! Purpose
//! -------
//! Collect numerically stable scalar and vector transforms used to map
//! constrained HMM parameters (positive scales and rates, probability
//! vectors, row-stochastic matrices) to and from the unconstrained space
//! that gradient-based optimizers operate in. This module centralizes small
//! numerical tolerances and transform logic so the rest of the crate can
//! assume well-conditioned `f64` arithmetic.
//!
//! Key behaviors
//! -------------
//! - Provide stable scalar transforms (`safe_softplus`, its inverse, and
//!   `safe_logistic`) for strictly positive parameters.
//! - Provide the centered softmax bijection between ℝ^{K−1} and the
//!   K-simplex (`softmax_centered`, `softmax_centered_inv`).
//! - Provide `log_sum_exp` and a floored `safe_ln` for likelihood
//!   accumulation.
//! - Centralize tolerances (`PROB_FLOOR`, `SIMPLEX_TOL`).
//!
//! Invariants & assumptions
//! ------------------------
//! - All public transforms assume finite `f64` inputs; domain and shape
//!   validation is enforced in the model layer (`hmm::core`), not here.
//! - Simplex helpers assume the caller sized the output buffer
//!   (`K` for the forward map, `K − 1` for the inverse).
//!
//! Conventions
//! -----------
//! - All routines operate on `ndarray` views and write into caller-owned
//!   buffers to avoid allocation in hot loops.
//! - This module never logs, performs I/O, or touches global state.
//!
//! Testing notes
//! -------------
//! - Unit tests in [`transformations`] cover agreement with naïve formulas
//!   on safe grids, tail behavior, and simplex round trips.

pub mod transformations;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::transformations::{
    PROB_FLOOR, SIMPLEX_TOL, log_sum_exp, safe_ln, safe_logistic, safe_softplus,
    safe_softplus_inv, softmax_centered, softmax_centered_inv,
};

pub mod prelude {
    pub use super::transformations::{
        PROB_FLOOR, log_sum_exp, safe_ln, safe_softplus, safe_softplus_inv, softmax_centered,
        softmax_centered_inv,
    };
}
