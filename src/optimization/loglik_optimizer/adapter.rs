//! Bridge from a user [`LogLikelihood`] to argmin's `CostFunction` / `Gradient`.
//!
//! argmin minimizes, so the adapter exposes the cost `c(θ) = -ℓ(θ)` and the
//! gradient `∇c(θ) = -∇ℓ(θ)`. Models without an analytic gradient fall back
//! to [`fd_gradient`] on the cost.
use crate::optimization::{
    errors::OptError,
    loglik_optimizer::{
        finite_diff::fd_gradient,
        traits::LogLikelihood,
        types::{Cost, Grad, Theta},
        validation::validate_grad,
    },
};
use argmin::core::{CostFunction, Error, Gradient};

/// Argmin problem wrapper borrowing a log-likelihood and its data.
#[derive(Debug, Clone)]
pub struct ArgMinAdapter<'a, F: LogLikelihood> {
    pub f: &'a F,
    pub data: &'a F::Data,
}

impl<'a, F: LogLikelihood> ArgMinAdapter<'a, F> {
    pub fn new(f: &'a F, data: &'a F::Data) -> Self {
        Self { f, data }
    }

    fn neg_loglik(&self, theta: &Theta) -> Result<Cost, OptError> {
        let value = self.f.value(theta, self.data)?;
        if !value.is_finite() {
            return Err(OptError::NonFiniteCost { value });
        }
        Ok(-value)
    }
}

impl<'a, F: LogLikelihood> CostFunction for ArgMinAdapter<'a, F> {
    type Param = Theta;
    type Output = Cost;

    /// Evaluate `c(θ) = -ℓ(θ)`; non-finite log-likelihoods are rejected with
    /// `OptError::NonFiniteCost`.
    fn cost(&self, theta: &Self::Param) -> Result<Self::Output, Error> {
        Ok(self.neg_loglik(theta)?)
    }
}

impl<'a, F: LogLikelihood> Gradient for ArgMinAdapter<'a, F> {
    type Param = Theta;
    type Gradient = Grad;

    /// Gradient of the cost. Uses `-grad` when the model implements it,
    /// finite differences of the cost when it returns
    /// `OptError::GradientNotImplemented`, and propagates any other error.
    fn gradient(&self, theta: &Self::Param) -> Result<Self::Gradient, Error> {
        match self.f.grad(theta, self.data) {
            Ok(g) => {
                validate_grad(&g, theta.len())?;
                Ok(-g)
            }
            Err(OptError::GradientNotImplemented) => {
                Ok(fd_gradient(theta, &|x: &Theta| self.neg_loglik(x))?)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::errors::OptResult;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    // Concave quadratic ℓ(θ) = -Σ (θᵢ - cᵢ)², optionally with analytic gradient.
    struct Quadratic {
        analytic: bool,
    }

    impl LogLikelihood for Quadratic {
        type Data = Theta;

        fn value(&self, theta: &Theta, center: &Theta) -> OptResult<f64> {
            Ok(-(theta - center).mapv(|d| d * d).sum())
        }

        fn check(&self, _theta: &Theta, _center: &Theta) -> OptResult<()> {
            Ok(())
        }

        fn grad(&self, theta: &Theta, center: &Theta) -> OptResult<Grad> {
            if self.analytic {
                Ok((theta - center).mapv(|d| -2.0 * d))
            } else {
                Err(OptError::GradientNotImplemented)
            }
        }
    }

    #[test]
    // Purpose
    // -------
    // The adapter flips signs for both the value and the analytic gradient,
    // and the finite-difference path agrees with the analytic one.
    //
    // Given
    // -----
    // - ℓ(θ) = -‖θ - c‖² with c = (1, -2), evaluated at θ = (0, 0).
    //
    // Expect
    // ------
    // - cost = 5, ∇c = (-2, 4) on both gradient paths.
    fn adapter_flips_signs_for_value_and_gradient() {
        // Arrange
        let center = array![1.0, -2.0];
        let theta = array![0.0, 0.0];
        let analytic = Quadratic { analytic: true };
        let numeric = Quadratic { analytic: false };

        // Act
        let cost = ArgMinAdapter::new(&analytic, &center).cost(&theta).unwrap();
        let g_analytic = ArgMinAdapter::new(&analytic, &center).gradient(&theta).unwrap();
        let g_numeric = ArgMinAdapter::new(&numeric, &center).gradient(&theta).unwrap();

        // Assert
        assert_abs_diff_eq!(cost, 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(g_analytic, array![-2.0, 4.0], epsilon = 1e-12);
        assert_abs_diff_eq!(g_numeric, g_analytic, epsilon = 1e-5);
    }
}
