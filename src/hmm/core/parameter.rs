//! Model parameters and their flattened unconstrained view.
//!
//! A [`Parameter`] stores its constrained value as the source of truth and
//! derives the unconstrained representation on demand through its
//! [`Bijector`]. Models expose their parameters as `&dyn AnyParameter` in a
//! fixed order, which is what [`flatten`] and [`unflatten`] walk to build the
//! optimization vector `θ`.
//!
//! Frozen parameters (Dirichlet concentrations) never enter `θ` but are
//! still read by the likelihood.
use crate::{
    hmm::{
        core::bijectors::Bijector,
        errors::{HmmError, HmmResult},
    },
    optimization::loglik_optimizer::Theta,
};
use ndarray::{Array, Dimension};
use std::fmt::Debug;

/// Which part of the model a parameter belongs to.
///
/// M-steps select the groups they optimize: the conjugate M-step only hands
/// the emission group to the gradient solver, the generic one all groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamGroup {
    Initial,
    Transition,
    Emission,
}

impl ParamGroup {
    pub const ALL: [ParamGroup; 3] =
        [ParamGroup::Initial, ParamGroup::Transition, ParamGroup::Emission];
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter<D: Dimension> {
    name: &'static str,
    value: Array<f64, D>,
    bijector: Bijector,
    is_frozen: bool,
    group: ParamGroup,
}

impl<D: Dimension> Parameter<D> {
    /// Build a trainable parameter, validating `value` against the bijector
    /// domain.
    ///
    /// # Errors
    /// - `HmmError::ParameterDomain` for the first violating element.
    pub fn new(
        name: &'static str, value: Array<f64, D>, bijector: Bijector, group: ParamGroup,
    ) -> HmmResult<Self> {
        check_domain(name, bijector, &value)?;
        Ok(Self { name, value, bijector, is_frozen: false, group })
    }

    /// Mark the parameter as frozen (excluded from `θ`).
    pub fn frozen(mut self) -> Self {
        self.is_frozen = true;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Constrained value.
    pub fn value(&self) -> &Array<f64, D> {
        &self.value
    }

    pub fn bijector(&self) -> Bijector {
        self.bijector
    }

    /// Replace the constrained value.
    ///
    /// # Errors
    /// - `HmmError::ParameterShape` if the shape changes.
    /// - `HmmError::ParameterDomain` if the value leaves the bijector domain.
    pub fn set_value(&mut self, value: Array<f64, D>) -> HmmResult<()> {
        if value.shape() != self.value.shape() {
            return Err(HmmError::ParameterShape {
                name: self.name,
                expected: self.value.shape().to_vec(),
                found: value.shape().to_vec(),
            });
        }
        check_domain(self.name, self.bijector, &value)?;
        self.value = value;
        Ok(())
    }

    /// Unconstrained representation, `bijector.forward(value)`.
    pub fn unconstrained_value(&self) -> Array<f64, D> {
        self.bijector.forward(&self.value)
    }

    fn unconstrained_dim(&self) -> D {
        let mut dim = self.value.raw_dim();
        if self.bijector == Bijector::SoftmaxCentered {
            let last = dim.ndim() - 1;
            dim[last] -= 1;
        }
        dim
    }
}

fn check_domain<D: Dimension>(
    name: &'static str, bijector: Bijector, value: &Array<f64, D>,
) -> HmmResult<()> {
    match bijector.domain_violation(value) {
        Some((index, value, reason)) => {
            Err(HmmError::ParameterDomain { name, index, value, reason })
        }
        None => Ok(()),
    }
}

/// Object-safe view of a [`Parameter`] of any rank.
pub trait AnyParameter: Debug {
    fn name(&self) -> &'static str;
    fn group(&self) -> ParamGroup;
    fn is_frozen(&self) -> bool;

    /// Number of unconstrained scalars.
    fn num_unconstrained(&self) -> usize;

    /// Append the unconstrained values in logical (row-major) order.
    fn write_unconstrained(&self, out: &mut Vec<f64>);

    /// Replace the value from `values.len() == num_unconstrained()`
    /// unconstrained scalars.
    fn read_unconstrained(&mut self, values: &[f64]) -> HmmResult<()>;
}

impl<D: Dimension> AnyParameter for Parameter<D> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn group(&self) -> ParamGroup {
        self.group
    }

    fn is_frozen(&self) -> bool {
        self.is_frozen
    }

    fn num_unconstrained(&self) -> usize {
        self.unconstrained_dim().size()
    }

    fn write_unconstrained(&self, out: &mut Vec<f64>) {
        out.extend(self.unconstrained_value().iter());
    }

    fn read_unconstrained(&mut self, values: &[f64]) -> HmmResult<()> {
        let expected = self.num_unconstrained();
        let unconstrained = Array::from_shape_vec(self.unconstrained_dim(), values.to_vec())
            .map_err(|_| HmmError::ThetaLength { expected, found: values.len() })?;
        if let Some((index, value)) =
            unconstrained.iter().enumerate().find(|(_, v)| !v.is_finite())
        {
            return Err(HmmError::ParameterDomain {
                name: self.name,
                index,
                value: *value,
                reason: "unconstrained value must be finite",
            });
        }
        let constrained = self.bijector.inverse(&unconstrained);
        self.set_value(constrained)
    }
}

fn is_trainable(param: &dyn AnyParameter, groups: &[ParamGroup]) -> bool {
    !param.is_frozen() && groups.contains(&param.group())
}

/// Length of `θ` for the non-frozen parameters in `groups`.
pub fn num_trainable(params: &[&dyn AnyParameter], groups: &[ParamGroup]) -> usize {
    params.iter().filter(|p| is_trainable(**p, groups)).map(|p| p.num_unconstrained()).sum()
}

/// Concatenate the unconstrained values of the non-frozen parameters in
/// `groups`, in the order given.
pub fn flatten(params: &[&dyn AnyParameter], groups: &[ParamGroup]) -> Theta {
    let mut out = Vec::with_capacity(num_trainable(params, groups));
    for param in params.iter().filter(|p| is_trainable(**p, groups)) {
        param.write_unconstrained(&mut out);
    }
    Theta::from(out)
}

/// Inverse of [`flatten`]: write `theta` back into the same parameters.
///
/// `params` must list the parameters in the same order that was used for
/// [`flatten`].
///
/// # Errors
/// - `HmmError::ThetaLength` if `theta` does not match the trainable size.
/// - `HmmError::ParameterDomain` if an entry is non-finite or maps outside
///   the domain.
pub fn unflatten(
    params: &mut [&mut dyn AnyParameter], groups: &[ParamGroup], theta: &Theta,
) -> HmmResult<()> {
    let expected: usize = params
        .iter()
        .filter(|p| is_trainable(&***p, groups))
        .map(|p| p.num_unconstrained())
        .sum();
    if theta.len() != expected {
        return Err(HmmError::ThetaLength { expected, found: theta.len() });
    }
    let flat = theta.to_vec();
    let mut offset = 0;
    for param in params.iter_mut() {
        if !is_trainable(&**param, groups) {
            continue;
        }
        let n = param.num_unconstrained();
        param.read_unconstrained(&flat[offset..offset + n])?;
        offset += n;
    }
    Ok(())
}
