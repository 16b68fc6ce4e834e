//! Numeric aliases and argmin solver types shared by the optimizer layer.
//!
//! Every optimizer in this crate works on a flat unconstrained parameter
//! vector [`Theta`]; models are responsible for mapping it back onto their
//! constrained parameters.
use argmin::solver::{
    linesearch::{HagerZhangLineSearch, MoreThuenteLineSearch},
    quasinewton::LBFGS,
};
use ndarray::Array1;
use std::collections::HashMap;

/// Flat unconstrained parameter vector.
pub type Theta = Array1<f64>;

/// Gradient with respect to [`Theta`].
pub type Grad = Array1<f64>;

/// Scalar objective value.
pub type Cost = f64;

/// argmin function-evaluation counters (`cost_count`, `gradient_count`, ...).
pub type FnEvalMap = HashMap<String, u64>;

/// L-BFGS history length used when `MLEOptions::lbfgs_mem` is `None`.
pub const DEFAULT_LBFGS_MEM: usize = 7;

pub type HagerZhangLS = HagerZhangLineSearch<Theta, Grad, Cost>;
pub type MoreThuenteLS = MoreThuenteLineSearch<Theta, Grad, Cost>;
pub type LbfgsHagerZhang = LBFGS<HagerZhangLS, Theta, Grad, Cost>;
pub type LbfgsMoreThuente = LBFGS<MoreThuenteLS, Theta, Grad, Cost>;
