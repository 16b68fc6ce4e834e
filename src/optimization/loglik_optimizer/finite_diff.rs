//! loglik_optimizer::finite_diff — finite-difference gradients for fallible objectives.
//!
//! Purpose
//! -------
//! Approximate the gradient of a scalar objective whose evaluation can fail
//! (an HMM loss rejects parameters that leave the model's domain, a filter
//! can hit a zero-likelihood step). Both the L-BFGS adapter and the
//! minibatch Adam runner request derivatives through [`fd_gradient`] when a
//! model does not provide an analytic gradient.
//!
//! Key behaviors
//! -------------
//! - Central differences are tried first; when any probe fails or the result
//!   is not finite, the gradient is recomputed with forward differences.
//! - The first error raised by the objective during a probe is captured in a
//!   `RefCell` side channel (the `finitediff` closures must return `f64`) and
//!   surfaced as an [`OptError`] if the forward pass fails too.
//!
//! Invariants & assumptions
//! ------------------------
//! - Returned gradients satisfy [`validate_grad`]: length equals
//!   `theta.len()` and every entry is finite.
//!
//! Testing notes
//! -------------
//! - Unit tests cover a quadratic, an objective that errors everywhere, and
//!   one that errors only on the negative side of a probe (forcing the
//!   forward fallback).
use crate::optimization::{
    errors::{OptError, OptResult},
    loglik_optimizer::{Grad, Theta, validation::validate_grad},
};
use finitediff::FiniteDiff;
use std::cell::RefCell;

/// fd_gradient — central-then-forward finite-difference gradient.
///
/// Parameters
/// ----------
/// - `theta`: point at which the gradient is approximated.
/// - `func`: fallible scalar objective.
///
/// Returns
/// -------
/// `OptResult<Grad>`
///   - `Ok(grad)` when either the central or the forward pass evaluates
///     cleanly and passes [`validate_grad`].
///   - `Err(e)` with the first error captured during the forward pass, or
///     the validation error of the forward gradient.
pub fn fd_gradient<G>(theta: &Theta, func: &G) -> OptResult<Grad>
where
    G: Fn(&Theta) -> OptResult<f64>,
{
    let dim = theta.len();
    let closure_err: RefCell<Option<OptError>> = RefCell::new(None);
    let probe = |x: &Theta| -> f64 {
        match func(x) {
            Ok(v) => v,
            Err(e) => {
                let mut slot = closure_err.borrow_mut();
                if slot.is_none() {
                    *slot = Some(e);
                }
                f64::NAN
            }
        }
    };

    let central = theta.central_diff(&probe);
    if closure_err.borrow().is_none() && validate_grad(&central, dim).is_ok() {
        return Ok(central);
    }

    closure_err.replace(None);
    let forward = theta.forward_diff(&probe);
    if let Some(err) = closure_err.take() {
        return Err(err);
    }
    validate_grad(&forward, dim)?;
    Ok(forward)
}
