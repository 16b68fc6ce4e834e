//! Training objectives over whole sequences.
//!
//! Both objectives evaluate a model rebuilt from `θ` and return the
//! normalized negative log joint of a minibatch of sequences:
//!
//! `loss(θ; B) = −(log p(θ) + (N / |B|) · Σ_{n ∈ B} f_n(θ)) / (N · T · D)`
//!
//! - [`ExpectedLogJoint`]: `f_n` is the expected complete-data log
//!   likelihood under fixed E-step posteriors (M-step objective).
//! - [`MarginalLogLik`]: `f_n` is `log p(y_n | θ)` from the forward filter
//!   (direct SGD objective).
//!
//! The `N / |B|` factor makes the minibatch loss an unbiased estimate of the
//! full-batch loss. As [`LogLikelihood`]s they report `−loss` over the whole
//! batch.
use crate::{
    hmm::{
        core::{
            data::Batch,
            parameter::{ParamGroup, num_trainable},
            validation::validate_posterior_count,
        },
        errors::{HmmError, HmmResult},
        models::base::{HiddenMarkovModel, HmmPosterior},
    },
    optimization::{
        errors::{OptError, OptResult},
        loglik_optimizer::{Cost, LogLikelihood, Theta},
        numerical_stability::safe_ln,
        sgd::MinibatchObjective,
    },
};
use ndarray::ArrayView2;

/// Expected complete-data log joint under fixed posteriors.
///
/// Only parameters in `groups` are read from `θ`; everything else comes from
/// `template`.
#[derive(Debug, Clone)]
pub struct ExpectedLogJoint<'a, M: HiddenMarkovModel> {
    template: &'a M,
    posteriors: &'a [HmmPosterior],
    groups: &'a [ParamGroup],
}

impl<'a, M: HiddenMarkovModel> ExpectedLogJoint<'a, M> {
    pub fn new(template: &'a M, posteriors: &'a [HmmPosterior], groups: &'a [ParamGroup]) -> Self {
        Self { template, posteriors, groups }
    }

    fn normalized_log_joint(
        &self, theta: &Theta, batch: &Batch, indices: &[usize],
    ) -> HmmResult<f64> {
        validate_posterior_count(batch.num_sequences(), self.posteriors.len())?;
        let model = self.template.with_unconstrained_params_of(theta, self.groups)?;
        let initial_probs = model.compute_initial_probs()?;
        let mut total = 0.0;
        for &n in indices {
            let post = &self.posteriors[n];
            let emissions = batch.sequence(n);
            let transitions =
                model.sequence_transitions(emissions.nrows(), batch.covariates_of(n))?;
            let ll = model.compute_conditional_logliks(emissions)?;

            let initial_weights = post.initial_probs();
            let log_initial = initial_probs.iter().map(|p| safe_ln(*p));
            total += weighted_sum(initial_weights.iter().copied(), log_initial);
            total += post.trans_probs.expected_log_transitions(&transitions)?;
            let smoothed = &post.posterior.smoothed_probs;
            total += weighted_sum(smoothed.iter().copied(), ll.iter().copied());
        }
        scaled_normalized(model.log_prior()?, total, batch, indices.len())
    }
}

// Σ w·v over entries with w ≠ 0, so impossible states (v = −∞) with zero
// posterior weight contribute nothing.
fn weighted_sum(weights: impl Iterator<Item = f64>, values: impl Iterator<Item = f64>) -> f64 {
    weights.zip(values).filter(|(w, _)| *w != 0.0).map(|(w, v)| w * v).sum()
}

fn scaled_normalized(
    log_prior: f64, batch_sum: f64, batch: &Batch, batch_len: usize,
) -> HmmResult<f64> {
    if batch_len == 0 {
        return Err(HmmError::Optimization(OptError::EmptyDataset));
    }
    let scale = batch.num_sequences() as f64 / batch_len as f64;
    Ok((log_prior + scale * batch_sum) / batch.num_elements() as f64)
}

fn all_indices(batch: &Batch) -> Vec<usize> {
    (0..batch.num_sequences()).collect()
}

fn check_theta_len(expected: usize, theta: &Theta) -> OptResult<()> {
    if theta.len() != expected {
        return Err(HmmError::ThetaLength { expected, found: theta.len() }.into());
    }
    Ok(())
}

impl<M: HiddenMarkovModel> MinibatchObjective for ExpectedLogJoint<'_, M> {
    type Data = Batch;

    fn num_examples(&self, data: &Batch) -> usize {
        data.num_sequences()
    }

    fn loss(&self, theta: &Theta, data: &Batch, indices: &[usize]) -> OptResult<f64> {
        Ok(-self.normalized_log_joint(theta, data, indices)?)
    }
}

impl<M: HiddenMarkovModel> LogLikelihood for ExpectedLogJoint<'_, M> {
    type Data = Batch;

    fn value(&self, theta: &Theta, data: &Batch) -> OptResult<Cost> {
        Ok(self.normalized_log_joint(theta, data, &all_indices(data))?)
    }

    fn check(&self, theta: &Theta, data: &Batch) -> OptResult<()> {
        check_theta_len(num_trainable(&self.template.parameters(), self.groups), theta)?;
        validate_posterior_count(data.num_sequences(), self.posteriors.len())?;
        self.template.validate_batch(data)?;
        Ok(())
    }
}

/// Marginal log likelihood of whole sequences, for direct SGD fitting.
#[derive(Debug, Clone)]
pub struct MarginalLogLik<'a, M: HiddenMarkovModel> {
    template: &'a M,
}

impl<'a, M: HiddenMarkovModel> MarginalLogLik<'a, M> {
    pub fn new(template: &'a M) -> Self {
        Self { template }
    }

    fn normalized_log_joint(
        &self, theta: &Theta, batch: &Batch, indices: &[usize],
    ) -> HmmResult<f64> {
        let model = self.template.with_unconstrained_params(theta)?;
        let mut total = 0.0;
        for &n in indices {
            let covariates: Option<ArrayView2<f64>> = batch.covariates_of(n);
            total += model.marginal_log_prob(batch.sequence(n), covariates)?;
        }
        scaled_normalized(model.log_prior()?, total, batch, indices.len())
    }
}

impl<M: HiddenMarkovModel> MinibatchObjective for MarginalLogLik<'_, M> {
    type Data = Batch;

    fn num_examples(&self, data: &Batch) -> usize {
        data.num_sequences()
    }

    fn loss(&self, theta: &Theta, data: &Batch, indices: &[usize]) -> OptResult<f64> {
        Ok(-self.normalized_log_joint(theta, data, indices)?)
    }
}

impl<M: HiddenMarkovModel> LogLikelihood for MarginalLogLik<'_, M> {
    type Data = Batch;

    fn value(&self, theta: &Theta, data: &Batch) -> OptResult<Cost> {
        Ok(self.normalized_log_joint(theta, data, &all_indices(data))?)
    }

    fn check(&self, theta: &Theta, data: &Batch) -> OptResult<()> {
        check_theta_len(self.template.unconstrained_params().len(), theta)?;
        self.template.validate_batch(data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        hmm::models::{emissions::PoissonEmissions, standard::StandardHmm},
        optimization::loglik_optimizer::{LineSearcher, MLEOptions, Tolerances, maximize},
    };
    use ndarray::{Array3, array};

    fn poisson_hmm() -> StandardHmm<PoissonEmissions> {
        let emissions = PoissonEmissions::new(array![[1.0], [2.0]]).unwrap();
        StandardHmm::new(array![0.5, 0.5], array![[0.7, 0.3], [0.3, 0.7]], emissions).unwrap()
    }

    fn count_batch() -> Batch {
        let counts = vec![
            0.0, 1.0, 0.0, 7.0, 9.0, 8.0, 1.0, 0.0, //
            6.0, 8.0, 0.0, 1.0, 2.0, 0.0, 9.0, 7.0, //
            1.0, 1.0, 0.0, 0.0, 8.0, 6.0, 9.0, 1.0,
        ];
        Batch::new(Array3::from_shape_vec((3, 8, 1), counts).unwrap(), None).unwrap()
    }

    #[test]
    // Purpose
    // -------
    // The marginal likelihood objective can be handed to the L-BFGS
    // maximizer directly, and the maximizer does not end below its start.
    //
    // Given
    // -----
    // - A two-state Poisson HMM with rates (1, 2) and counts drawn from
    //   regimes near 0 and 8.
    // - More–Thuente L-BFGS capped at 30 iterations.
    //
    // Expect
    // ------
    // - `outcome.value ≥ value(θ₀)`.
    // - The fitted rates stay positive and the high rate moves up.
    fn marginal_loglik_maximizes_with_lbfgs() {
        // Arrange
        let model = poisson_hmm();
        let batch = count_batch();
        let objective = MarginalLogLik::new(&model);
        let theta0 = model.unconstrained_params();
        let start = objective.value(&theta0, &batch).unwrap();
        let tols = Tolerances::new(Some(1e-6), None, Some(30)).unwrap();
        let opts = MLEOptions::new(tols, LineSearcher::MoreThuente, false, None).unwrap();

        // Act
        let outcome = maximize(&objective, theta0, &batch, &opts).unwrap();

        // Assert
        assert!(outcome.value >= start, "{} < {start}", outcome.value);
        let fitted = model.with_unconstrained_params(&outcome.theta_hat).unwrap();
        let rates = fitted.emissions().rates();
        assert!(rates.iter().all(|r| *r > 0.0));
        assert!(rates.iter().cloned().fold(f64::MIN, f64::max) > 2.0);
    }

    #[test]
    // Purpose
    // -------
    // `check` rejects parameter vectors of the wrong length before any
    // evaluation.
    fn marginal_loglik_check_rejects_wrong_theta_length() {
        let model = poisson_hmm();
        let objective = MarginalLogLik::new(&model);

        let err = objective.check(&array![0.0, 1.0], &count_batch()).unwrap_err();

        assert!(matches!(err, OptError::Model { .. }), "got {err:?}");
    }
}
