//! Model interface and the EM / SGD training core.
//!
//! Purpose
//! -------
//! Define [`HiddenMarkovModel`], the capability interface every HMM in this
//! crate implements, and build everything else on top of a handful of
//! required methods: the three statistic extractors, read-only inference,
//! the E-step, a generic gradient M-step, and the EM and SGD training loops.
//!
//! Key behaviors
//! -------------
//! - Models are immutable values. Training threads the unconstrained
//!   parameter vector `θ` explicitly: [`em_step`] maps `θ` to `θ'` and the
//!   log joint, and M-steps return a new model instead of mutating `self`.
//! - The E-step runs the two-filter smoother per sequence and adds pairwise
//!   transition statistics. Whether those are summed over time is decided
//!   by the rank of the transition tensor alone
//!   ([`TransitionMatrices::reduces_over_time`]).
//! - The generic M-step hands every non-frozen parameter to the configured
//!   solver (minibatch Adam or L-BFGS) on the [`ExpectedLogJoint`].
//!
//! Invariants & assumptions
//! ------------------------
//! - `parameters()` and `parameters_mut()` list the same parameters in the
//!   same order; flattening relies on it.
//! - Frozen parameters never enter `θ`; they are carried by the template
//!   model that `θ` is written into.
//! - For a sequence of length `T` with covariates `u_{0:T}`, the transition
//!   from step `t` to `t + 1` uses covariate row `t + 1`, giving `T − 1`
//!   matrices.
//!
//! Conventions
//! -----------
//! - `info!` at fit start and end, `debug!` per EM iteration.
//! - Sequences are processed one at a time; nothing is shared between
//!   sequences during the E-step.
use crate::{
    hmm::{
        core::{
            data::Batch,
            distributions::{Categorical, EmissionDistribution},
            options::{EmOptions, MStepOptions, MStepSolver},
            parameter::{AnyParameter, ParamGroup, flatten, unflatten},
            validation::{validate_covariate_dim, validate_emission_dim, validate_posterior_count},
        },
        errors::{HmmError, HmmResult},
        models::objectives::{ExpectedLogJoint, MarginalLogLik},
    },
    inference::{
        FilterPosterior, SmoothedPosterior, TransitionMatrices, TransitionProbs,
        compute_transition_probs, hmm_filter, hmm_posterior_mode, hmm_smoother,
        hmm_two_filter_smoother,
    },
    optimization::{
        loglik_optimizer::{Theta, maximize},
        sgd::{SgdOptions, run_sgd},
    },
};
use ndarray::{Array1, Array2, Array3, ArrayView1, ArrayView2, s};
use std::fmt::Debug;
use tracing::{debug, info};

/// E-step output for one sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct HmmPosterior {
    pub posterior: SmoothedPosterior,
    pub trans_probs: TransitionProbs,
}

impl HmmPosterior {
    pub fn marginal_loglik(&self) -> f64 {
        self.posterior.marginal_loglik
    }

    /// Smoothed marginal of the first step, the expected initial-state
    /// counts of this sequence.
    pub fn initial_probs(&self) -> ArrayView1<'_, f64> {
        self.posterior.smoothed_probs.row(0)
    }
}

/// Result of [`HiddenMarkovModel::fit_em`].
#[derive(Debug, Clone, PartialEq)]
pub struct EmFit<M> {
    pub model: M,
    /// Log joint `log p(θ) + Σ log p(y_n | θ)` before each iteration's M-step.
    pub log_probs: Vec<f64>,
}

/// Result of [`HiddenMarkovModel::fit_sgd`].
#[derive(Debug, Clone, PartialEq)]
pub struct SgdFit<M> {
    pub model: M,
    /// Mean normalized negative log joint per epoch.
    pub losses: Vec<f64>,
}

pub trait HiddenMarkovModel: Clone + Debug + Send + Sync + Sized {
    // ---- Required ----

    fn num_states(&self) -> usize;

    fn emission_dim(&self) -> usize;

    fn initial_distribution(&self) -> HmmResult<Categorical>;

    /// Distribution of the next state given the current `state` and an
    /// optional covariate vector.
    fn transition_distribution(
        &self, state: usize, covariate: Option<ArrayView1<f64>>,
    ) -> HmmResult<Categorical>;

    fn emission_distribution(&self, state: usize) -> HmmResult<EmissionDistribution>;

    /// Log prior density of all parameters, frozen hyperparameters included.
    fn log_prior(&self) -> HmmResult<f64>;

    fn parameters(&self) -> Vec<&dyn AnyParameter>;

    fn parameters_mut(&mut self) -> Vec<&mut dyn AnyParameter>;

    /// Number of covariate columns the transitions consume; `None` rejects
    /// covariates.
    fn covariate_dim(&self) -> Option<usize> {
        None
    }

    // ---- Parameter vector ----

    fn unconstrained_params(&self) -> Theta {
        self.unconstrained_params_of(&ParamGroup::ALL)
    }

    fn unconstrained_params_of(&self, groups: &[ParamGroup]) -> Theta {
        flatten(&self.parameters(), groups)
    }

    /// Copy of `self` with every non-frozen parameter read from `theta`.
    fn with_unconstrained_params(&self, theta: &Theta) -> HmmResult<Self> {
        self.with_unconstrained_params_of(theta, &ParamGroup::ALL)
    }

    fn with_unconstrained_params_of(&self, theta: &Theta, groups: &[ParamGroup]) -> HmmResult<Self> {
        let mut model = self.clone();
        unflatten(&mut model.parameters_mut(), groups, theta)?;
        Ok(model)
    }

    // ---- Statistic extractors ----

    /// Length-K initial distribution.
    fn compute_initial_probs(&self) -> HmmResult<Array1<f64>> {
        Ok(self.initial_distribution()?.probs_parameter().clone())
    }

    /// Transition matrices.
    ///
    /// Without covariates: one K×K matrix. With an R×C covariate array: an
    /// R×K×K tensor, outer loop over covariate rows and inner loop over
    /// origin states.
    fn compute_transition_matrices(
        &self, covariates: Option<ArrayView2<f64>>,
    ) -> HmmResult<TransitionMatrices> {
        let k = self.num_states();
        match covariates {
            None => {
                let mut a = Array2::<f64>::zeros((k, k));
                for i in 0..k {
                    a.row_mut(i).assign(self.transition_distribution(i, None)?.probs_parameter());
                }
                Ok(TransitionMatrices::Homogeneous(a))
            }
            Some(u) => {
                validate_covariate_dim(self.covariate_dim(), u.nrows(), Some(u.dim()))?;
                let mut a = Array3::<f64>::zeros((u.nrows(), k, k));
                for (r, row) in u.outer_iter().enumerate() {
                    for i in 0..k {
                        let probs = self.transition_distribution(i, Some(row))?;
                        a.slice_mut(s![r, i, ..]).assign(probs.probs_parameter());
                    }
                }
                Ok(TransitionMatrices::TimeVarying(a))
            }
        }
    }

    /// T×K matrix of `log p(y_t | z_t = k)`.
    fn compute_conditional_logliks(&self, emissions: ArrayView2<f64>) -> HmmResult<Array2<f64>> {
        validate_emission_dim(self.emission_dim(), emissions.ncols())?;
        let dists = (0..self.num_states())
            .map(|k| self.emission_distribution(k))
            .collect::<HmmResult<Vec<_>>>()?;
        let mut ll = Array2::<f64>::zeros((emissions.nrows(), dists.len()));
        for (t, y) in emissions.outer_iter().enumerate() {
            for (k, dist) in dists.iter().enumerate() {
                ll[[t, k]] = dist.log_prob(y)?;
            }
        }
        Ok(ll)
    }

    /// Transitions for one sequence: homogeneous without covariates,
    /// otherwise one matrix per step driven by covariate rows `1..T`.
    fn sequence_transitions(
        &self, t_len: usize, covariates: Option<ArrayView2<f64>>,
    ) -> HmmResult<TransitionMatrices> {
        validate_covariate_dim(self.covariate_dim(), t_len, covariates.map(|u| u.dim()))?;
        match covariates {
            None => self.compute_transition_matrices(None),
            Some(u) => self.compute_transition_matrices(Some(u.slice(s![1.., ..]))),
        }
    }

    /// Shape checks of a batch against this model.
    fn validate_batch(&self, batch: &Batch) -> HmmResult<()> {
        validate_emission_dim(self.emission_dim(), batch.emission_dim())?;
        let cov_shape = batch.covariate_dim().map(|c| (batch.num_timesteps(), c));
        validate_covariate_dim(self.covariate_dim(), batch.num_timesteps(), cov_shape)
    }

    // ---- Inference ----

    /// `log p(y_{1:T})` of one sequence.
    fn marginal_log_prob(
        &self, emissions: ArrayView2<f64>, covariates: Option<ArrayView2<f64>>,
    ) -> HmmResult<f64> {
        Ok(self.filter(emissions, covariates)?.marginal_loglik)
    }

    /// Viterbi path of one sequence.
    fn most_likely_states(
        &self, emissions: ArrayView2<f64>, covariates: Option<ArrayView2<f64>>,
    ) -> HmmResult<Vec<usize>> {
        let (initial, transitions, ll) = inference_inputs(self, emissions, covariates)?;
        Ok(hmm_posterior_mode(initial.view(), &transitions, ll.view())?)
    }

    fn filter(
        &self, emissions: ArrayView2<f64>, covariates: Option<ArrayView2<f64>>,
    ) -> HmmResult<FilterPosterior> {
        let (initial, transitions, ll) = inference_inputs(self, emissions, covariates)?;
        Ok(hmm_filter(initial.view(), &transitions, ll.view())?)
    }

    fn smoother(
        &self, emissions: ArrayView2<f64>, covariates: Option<ArrayView2<f64>>,
    ) -> HmmResult<SmoothedPosterior> {
        let (initial, transitions, ll) = inference_inputs(self, emissions, covariates)?;
        Ok(hmm_smoother(initial.view(), &transitions, ll.view())?)
    }

    // ---- Training ----

    /// Posterior of every sequence under the current parameters.
    ///
    /// Sequences are independent; with the `parallel` feature they are
    /// mapped on the rayon pool, otherwise one after another. Output order
    /// follows the batch either way.
    fn e_step(&self, batch: &Batch) -> HmmResult<Vec<HmmPosterior>> {
        self.validate_batch(batch)?;
        let initial = self.compute_initial_probs()?;
        let shared = match batch.covariates() {
            None => Some(self.compute_transition_matrices(None)?),
            Some(_) => None,
        };
        let posterior_of =
            |n: usize| posterior_of_sequence(self, batch, n, initial.view(), shared.as_ref());

        #[cfg(feature = "parallel")]
        let posteriors: HmmResult<Vec<HmmPosterior>> = {
            use rayon::prelude::*;
            (0..batch.num_sequences()).into_par_iter().map(posterior_of).collect()
        };
        #[cfg(not(feature = "parallel"))]
        let posteriors: HmmResult<Vec<HmmPosterior>> =
            (0..batch.num_sequences()).map(posterior_of).collect();

        posteriors
    }

    /// Posterior of sequence `n` alone, recomputing every input.
    ///
    /// # Errors
    /// - `HmmError::SequenceOutOfRange` if `n` is not a sequence of `batch`.
    /// - Batch validation and inference errors as in [`e_step`](Self::e_step).
    fn sequence_posterior(&self, batch: &Batch, n: usize) -> HmmResult<HmmPosterior> {
        self.validate_batch(batch)?;
        let initial = self.compute_initial_probs()?;
        posterior_of_sequence(self, batch, n, initial.view(), None)
    }

    /// Generic M-step: gradient ascent on the expected log joint over every
    /// non-frozen parameter. Returns the updated model.
    fn m_step(
        &self, batch: &Batch, posteriors: &[HmmPosterior], opts: &MStepOptions,
    ) -> HmmResult<Self> {
        gradient_m_step(self, batch, posteriors, &ParamGroup::ALL, opts)
    }

    /// Run `opts.num_iters` EM iterations.
    ///
    /// Returns the fitted model and the log joint recorded before each
    /// M-step. With `num_iters = 0` the model is returned unchanged with an
    /// empty trajectory.
    ///
    /// # Errors
    /// - Batch and option validation errors.
    /// - `HmmError::NonFiniteLogJoint` if the log joint diverges.
    /// - Any inference or optimizer failure inside an iteration.
    fn fit_em(&self, batch: &Batch, opts: &EmOptions) -> HmmResult<EmFit<Self>> {
        opts.validate()?;
        self.validate_batch(batch)?;
        if opts.num_iters == 0 {
            return Ok(EmFit { model: self.clone(), log_probs: Vec::new() });
        }
        info!(
            num_states = self.num_states(),
            num_sequences = batch.num_sequences(),
            num_iters = opts.num_iters,
            "fit_em: starting"
        );

        let mut theta = self.unconstrained_params();
        let mut log_probs = Vec::with_capacity(opts.num_iters);
        for iteration in 0..opts.num_iters {
            let (next, log_prob) = em_step(self, &theta, batch, &opts.m_step)?;
            if !log_prob.is_finite() {
                return Err(HmmError::NonFiniteLogJoint { iteration, value: log_prob });
            }
            debug!(iteration, log_prob, "fit_em: iteration finished");
            log_probs.push(log_prob);
            theta = next;
        }

        let model = self.with_unconstrained_params(&theta)?;
        info!(final_log_prob = log_probs.last().copied(), "fit_em: finished");
        Ok(EmFit { model, log_probs })
    }

    /// Fit by minibatch Adam directly on the marginal likelihood; minibatches
    /// are subsets of whole sequences.
    fn fit_sgd(&self, batch: &Batch, opts: &SgdOptions) -> HmmResult<SgdFit<Self>> {
        self.validate_batch(batch)?;
        info!(
            num_sequences = batch.num_sequences(),
            batch_size = opts.batch_size,
            num_epochs = opts.num_epochs,
            "fit_sgd: starting"
        );
        let objective = MarginalLogLik::new(self);
        let outcome = run_sgd(&objective, self.unconstrained_params(), batch, opts)?;
        let model = self.with_unconstrained_params(&outcome.theta_hat)?;
        info!(final_loss = outcome.losses.last().copied(), "fit_sgd: finished");
        Ok(SgdFit { model, losses: outcome.losses })
    }
}

// Smoother plus transition statistics for one sequence. `shared` holds the
// homogeneous matrix when the batch carries no covariates.
fn posterior_of_sequence<M: HiddenMarkovModel>(
    model: &M, batch: &Batch, n: usize, initial: ArrayView1<f64>,
    shared: Option<&TransitionMatrices>,
) -> HmmResult<HmmPosterior> {
    if n >= batch.num_sequences() {
        return Err(HmmError::SequenceOutOfRange { index: n, num_sequences: batch.num_sequences() });
    }
    let emissions = batch.sequence(n);
    let transitions = match shared {
        Some(a) => a.clone(),
        None => model.sequence_transitions(emissions.nrows(), batch.covariates_of(n))?,
    };
    let ll = model.compute_conditional_logliks(emissions)?;
    let posterior = hmm_two_filter_smoother(initial, &transitions, ll.view())?;
    let trans_probs =
        compute_transition_probs(&transitions, &posterior, transitions.reduces_over_time())?;
    Ok(HmmPosterior { posterior, trans_probs })
}

fn inference_inputs<M: HiddenMarkovModel>(
    model: &M, emissions: ArrayView2<f64>, covariates: Option<ArrayView2<f64>>,
) -> HmmResult<(Array1<f64>, TransitionMatrices, Array2<f64>)> {
    let transitions = model.sequence_transitions(emissions.nrows(), covariates)?;
    let initial = model.compute_initial_probs()?;
    let ll = model.compute_conditional_logliks(emissions)?;
    Ok((initial, transitions, ll))
}

/// em_step — one EM iteration as a pure function of `θ`.
///
/// Writes `theta` into a copy of `template`, runs the E-step, records the
/// log joint `log_prior + Σ_n marginal_loglik_n` of the current parameters,
/// runs the M-step, and returns the new `θ` with that log joint.
///
/// `template` supplies structure and frozen hyperparameters only.
pub fn em_step<M: HiddenMarkovModel>(
    template: &M, theta: &Theta, batch: &Batch, opts: &MStepOptions,
) -> HmmResult<(Theta, f64)> {
    let model = template.with_unconstrained_params(theta)?;
    let posteriors = model.e_step(batch)?;
    let log_prob =
        model.log_prior()? + posteriors.iter().map(HmmPosterior::marginal_loglik).sum::<f64>();
    let updated = model.m_step(batch, &posteriors, opts)?;
    Ok((updated.unconstrained_params(), log_prob))
}

/// Gradient M-step over the non-frozen parameters in `groups`.
///
/// Maximizes the [`ExpectedLogJoint`] with minibatch Adam or L-BFGS, as
/// selected by `opts.solver`. Parameters outside `groups` keep their values.
/// When `groups` holds no trainable parameter the model is returned as is.
pub fn gradient_m_step<M: HiddenMarkovModel>(
    model: &M, batch: &Batch, posteriors: &[HmmPosterior], groups: &[ParamGroup],
    opts: &MStepOptions,
) -> HmmResult<M> {
    validate_posterior_count(batch.num_sequences(), posteriors.len())?;
    let theta0 = model.unconstrained_params_of(groups);
    if theta0.is_empty() {
        return Ok(model.clone());
    }
    let objective = ExpectedLogJoint::new(model, posteriors, groups);
    let theta = match &opts.solver {
        MStepSolver::Sgd(sgd) => run_sgd(&objective, theta0, batch, sgd)?.theta_hat,
        MStepSolver::Lbfgs(mle) => maximize(&objective, theta0, batch, mle)?.theta_hat,
    };
    model.with_unconstrained_params_of(&theta, groups)
}
