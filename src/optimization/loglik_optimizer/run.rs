//! Execution of a configured L-BFGS solver through argmin's `Executor`.
use crate::optimization::{
    errors::OptResult,
    loglik_optimizer::{Grad, LogLikelihood, MLEOptions, OptimOutcome, Theta, adapter::ArgMinAdapter},
};
use argmin::core::{CostFunction, Executor, State};

/// Run `solver` from `theta0` and normalize the final state into an
/// [`OptimOutcome`] expressed in log-likelihood units.
///
/// Logs the starting log-likelihood at `debug` and the outcome at `debug`.
/// With the `obs_slog` feature and `opts.verbose`, the argmin slog observer
/// is attached as well.
pub fn run_lbfgs<'a, F, S>(
    theta0: Theta, opts: &MLEOptions, problem: ArgMinAdapter<'a, F>, solver: S,
) -> OptResult<OptimOutcome>
where
    F: LogLikelihood,
    S: argmin::core::Solver<
            ArgMinAdapter<'a, F>,
            argmin::core::IterState<Theta, Grad, (), (), (), f64>,
        > + Send
        + 'static,
{
    let ll0 = -problem.cost(&theta0)?;
    tracing::debug!(loglik = ll0, dim = theta0.len(), "lbfgs: starting");

    let mut optimizer = Executor::new(problem, solver);
    optimizer = optimizer.configure(|state| state.param(theta0));
    #[cfg(feature = "obs_slog")]
    if opts.verbose {
        let observer = argmin_observer_slog::SlogLogger::term_noblock();
        optimizer = optimizer.add_observer(observer, argmin::core::observers::ObserverMode::Always);
    }
    if let Some(max_iter) = opts.tols.max_iter {
        optimizer = optimizer.configure(|state| state.max_iters(max_iter as u64));
    }

    let mut result = optimizer.run()?.state().clone();
    let iterations = result.get_iter();
    let function_counts = result.get_func_counts().clone();
    let termination = result.get_termination_status().clone();
    let grad = result.take_gradient();
    let outcome = OptimOutcome::new(
        result.take_best_param(),
        -result.get_best_cost(),
        termination,
        iterations,
        function_counts,
        grad,
    )?;
    tracing::debug!(
        loglik = outcome.value,
        iterations = outcome.iterations,
        status = %outcome.status,
        "lbfgs: finished"
    );
    Ok(outcome)
}
