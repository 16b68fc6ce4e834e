//! High-level entrypoint for log-likelihood maximization.
use crate::optimization::{
    errors::OptResult,
    loglik_optimizer::{
        OptimOutcome, Theta,
        adapter::ArgMinAdapter,
        builders::{build_optimizer_hager_zhang, build_optimizer_more_thuente},
        run::run_lbfgs,
        traits::{LineSearcher, LogLikelihood, MLEOptions},
        validation::validate_theta_input,
    },
};

/// maximize — run L-BFGS on `ℓ(θ)` from `theta0`.
///
/// Validates `opts` (deserialized options skip the constructors), checks
/// that `theta0` is finite, calls [`LogLikelihood::check`], then dispatches
/// on the configured line search.
///
/// # Errors
/// - Configuration errors from [`MLEOptions::validate`].
/// - `OptError::InvalidThetaInput` for non-finite starting points.
/// - Any error raised by the objective or the argmin backend.
pub fn maximize<F: LogLikelihood>(
    f: &F, theta0: Theta, data: &F::Data, opts: &MLEOptions,
) -> OptResult<OptimOutcome> {
    opts.validate()?;
    validate_theta_input(&theta0)?;
    f.check(&theta0, data)?;
    let problem = ArgMinAdapter::new(f, data);
    match opts.line_searcher {
        LineSearcher::MoreThuente => {
            let solver = build_optimizer_more_thuente(opts)?;
            run_lbfgs(theta0, opts, problem, solver)
        }
        LineSearcher::HagerZhang => {
            let solver = build_optimizer_hager_zhang(opts)?;
            run_lbfgs(theta0, opts, problem, solver)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::{
        errors::OptError,
        loglik_optimizer::{Grad, Tolerances},
    };
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    // ℓ(θ) = -½ Σ wᵢ (θᵢ - 1)², maximized at θ = 1.
    struct Bowl;

    impl LogLikelihood for Bowl {
        type Data = Theta;

        fn value(&self, theta: &Theta, w: &Theta) -> OptResult<f64> {
            Ok(-0.5 * (w * &theta.mapv(|t| (t - 1.0) * (t - 1.0))).sum())
        }

        fn check(&self, theta: &Theta, w: &Theta) -> OptResult<()> {
            if theta.len() != w.len() {
                return Err(OptError::GradientDimMismatch { expected: w.len(), found: theta.len() });
            }
            Ok(())
        }

        fn grad(&self, theta: &Theta, w: &Theta) -> OptResult<Grad> {
            Ok(w * &theta.mapv(|t| 1.0 - t))
        }
    }

    #[test]
    // Purpose
    // -------
    // Both line searches drive a separable concave bowl to its maximum.
    //
    // Given
    // -----
    // - Weights (1, 10), start at (−2, 3).
    //
    // Expect
    // ------
    // - θ̂ ≈ (1, 1), ℓ(θ̂) ≈ 0 and a converged status.
    fn maximize_finds_bowl_maximum_with_both_line_searches() {
        let w = array![1.0, 10.0];
        for ls in [LineSearcher::MoreThuente, LineSearcher::HagerZhang] {
            // Arrange
            let tols = Tolerances::new(Some(1e-10), None, Some(200)).unwrap();
            let opts = MLEOptions::new(tols, ls, false, None).unwrap();

            // Act
            let out = maximize(&Bowl, array![-2.0, 3.0], &w, &opts).unwrap();

            // Assert
            assert_abs_diff_eq!(out.theta_hat, array![1.0, 1.0], epsilon = 1e-5);
            assert_abs_diff_eq!(out.value, 0.0, epsilon = 1e-8);
            assert!(out.converged, "line search {ls:?} should converge, status {}", out.status);
        }
    }

    #[test]
    // Purpose
    // -------
    // Invalid starting points are rejected before any solver work.
    fn maximize_rejects_non_finite_or_mismatched_start() {
        let w = array![1.0, 1.0];
        let opts = MLEOptions::default();
        let err = maximize(&Bowl, array![f64::NAN, 0.0], &w, &opts).expect_err("NaN start");
        assert!(matches!(err, OptError::InvalidThetaInput { index: 0, .. }));
        let err = maximize(&Bowl, array![0.0], &w, &opts).expect_err("length mismatch");
        assert!(matches!(err, OptError::GradientDimMismatch { .. }));
    }
}
