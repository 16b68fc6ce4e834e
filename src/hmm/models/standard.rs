//! Standard HMM — homogeneous transitions with conjugate Dirichlet priors.
//!
//! Purpose
//! -------
//! Implement the classic discrete-state HMM: an initial distribution, a
//! single K×K transition matrix, and a pluggable emission family. The
//! initial distribution and every transition row carry a Dirichlet prior,
//! so their M-step is the closed-form posterior mode.
//!
//! Key behaviors
//! -------------
//! - Construction validates shapes (initial length K, transitions K×K,
//!   emissions over K states) and domains (simplex rows, positive
//!   concentrations).
//! - [`StandardHmm::m_step`] first applies the Dirichlet posterior modes
//!   using the summed expected counts, then updates the emission parameters
//!   either by their closed-form update or by the gradient solver on the
//!   expected log joint restricted to the emission group.
//!
//! Invariants & assumptions
//! ------------------------
//! - Concentrations are frozen: they are read by `log_prior` and by the
//!   conjugate update but never enter `θ`.
//! - Every transition row shares the same concentration vector.
//! - Covariates are rejected; transitions are time-homogeneous.
//!
//! Conventions
//! -----------
//! - Default concentration is `1.1` for both priors, which keeps the
//!   posterior mode well defined for every count vector.
use crate::{
    hmm::{
        core::{
            bijectors::Bijector,
            data::Batch,
            distributions::{Categorical, Dirichlet, EmissionDistribution},
            options::MStepOptions,
            parameter::{AnyParameter, ParamGroup, Parameter},
            validation::{validate_num_states, validate_posterior_count, validate_shape},
        },
        errors::{HmmError, HmmResult},
        models::{
            base::{HiddenMarkovModel, HmmPosterior, gradient_m_step},
            emissions::EmissionModel,
        },
    },
    inference::TransitionProbs,
};
use ndarray::{Array1, Array2, ArrayView1, Axis, Ix1, Ix2};

/// Default Dirichlet concentration of the initial and transition priors.
pub const DEFAULT_CONCENTRATION: f64 = 1.1;

#[derive(Debug, Clone, PartialEq)]
pub struct StandardHmm<E: EmissionModel> {
    initial_probs: Parameter<Ix1>,
    initial_concentration: Parameter<Ix1>,
    transition_matrix: Parameter<Ix2>,
    transition_concentration: Parameter<Ix1>,
    emissions: E,
}

impl<E: EmissionModel> StandardHmm<E> {
    /// Build a model with the default concentration on both priors.
    ///
    /// # Errors
    /// - `HmmError::NoStates` for an empty initial distribution.
    /// - `HmmError::ParameterShape` if the transition matrix is not K×K or
    ///   the emission model covers a different number of states.
    /// - `HmmError::ParameterDomain` if a probability vector or a transition
    ///   row leaves the simplex.
    pub fn new(
        initial_probs: Array1<f64>, transition_matrix: Array2<f64>, emissions: E,
    ) -> HmmResult<Self> {
        let k = initial_probs.len();
        validate_num_states(k)?;
        validate_shape("transition_matrix", transition_matrix.shape(), &[k, k])?;
        validate_shape("emissions", &[emissions.num_states()], &[k])?;
        Ok(Self {
            initial_probs: Parameter::new(
                "initial_probs",
                initial_probs,
                Bijector::SoftmaxCentered,
                ParamGroup::Initial,
            )?,
            initial_concentration: concentration(
                "initial_concentration",
                k,
                DEFAULT_CONCENTRATION,
                ParamGroup::Initial,
            )?,
            transition_matrix: Parameter::new(
                "transition_matrix",
                transition_matrix,
                Bijector::SoftmaxCentered,
                ParamGroup::Transition,
            )?,
            transition_concentration: concentration(
                "transition_concentration",
                k,
                DEFAULT_CONCENTRATION,
                ParamGroup::Transition,
            )?,
            emissions,
        })
    }

    /// Replace both prior concentrations with constant vectors.
    ///
    /// # Errors
    /// - `HmmError::ParameterDomain` unless both values are finite and > 0.
    pub fn with_concentrations(mut self, initial: f64, transition: f64) -> HmmResult<Self> {
        let k = self.num_states();
        self.initial_concentration =
            concentration("initial_concentration", k, initial, ParamGroup::Initial)?;
        self.transition_concentration =
            concentration("transition_concentration", k, transition, ParamGroup::Transition)?;
        Ok(self)
    }

    pub fn initial_probs(&self) -> &Array1<f64> {
        self.initial_probs.value()
    }

    pub fn transition_matrix(&self) -> &Array2<f64> {
        self.transition_matrix.value()
    }

    pub fn emissions(&self) -> &E {
        &self.emissions
    }

    fn initial_prior(&self) -> HmmResult<Dirichlet> {
        Dirichlet::new(self.initial_concentration.value().clone())
    }

    fn transition_prior(&self) -> HmmResult<Dirichlet> {
        Dirichlet::new(self.transition_concentration.value().clone())
    }

    /// Dirichlet posterior modes of the initial distribution and every
    /// transition row, from counts summed over the batch.
    fn conjugate_update(&self, posteriors: &[HmmPosterior]) -> HmmResult<Self> {
        let k = self.num_states();
        let mut initial_counts = Array1::<f64>::zeros(k);
        let mut trans_counts = Array2::<f64>::zeros((k, k));
        for post in posteriors {
            initial_counts += &post.initial_probs();
            match &post.trans_probs {
                TransitionProbs::Summed(xi) => trans_counts += xi,
                TransitionProbs::PerStep(xi) => trans_counts += &xi.sum_axis(Axis(0)),
            }
        }

        let initial = posterior_mode(self.initial_concentration.value(), initial_counts.view())?;
        let mut transition = Array2::<f64>::zeros((k, k));
        for (i, counts) in trans_counts.outer_iter().enumerate() {
            let row = posterior_mode(self.transition_concentration.value(), counts)?;
            transition.row_mut(i).assign(&row);
        }

        let mut updated = self.clone();
        updated.initial_probs.set_value(initial)?;
        updated.transition_matrix.set_value(transition)?;
        Ok(updated)
    }
}

fn concentration(
    name: &'static str, k: usize, value: f64, group: ParamGroup,
) -> HmmResult<Parameter<Ix1>> {
    Ok(Parameter::new(name, Array1::from_elem(k, value), Bijector::Softplus, group)?.frozen())
}

fn posterior_mode(prior: &Array1<f64>, counts: ArrayView1<f64>) -> HmmResult<Array1<f64>> {
    Ok(Dirichlet::new(prior + &counts)?.mode())
}

impl<E: EmissionModel> HiddenMarkovModel for StandardHmm<E> {
    fn num_states(&self) -> usize {
        self.initial_probs.value().len()
    }

    fn emission_dim(&self) -> usize {
        self.emissions.emission_dim()
    }

    fn initial_distribution(&self) -> HmmResult<Categorical> {
        Categorical::new(self.initial_probs.value().clone())
    }

    fn transition_distribution(
        &self, state: usize, covariate: Option<ArrayView1<f64>>,
    ) -> HmmResult<Categorical> {
        if covariate.is_some() {
            return Err(HmmError::CovariatesUnsupported);
        }
        let k = self.num_states();
        if state >= k {
            return Err(HmmError::StateOutOfRange { state, num_states: k });
        }
        Categorical::new(self.transition_matrix.value().row(state).to_owned())
    }

    fn emission_distribution(&self, state: usize) -> HmmResult<EmissionDistribution> {
        self.emissions.distribution(state)
    }

    fn log_prior(&self) -> HmmResult<f64> {
        let mut lp = self.initial_prior()?.log_prob(self.initial_probs.value().view())?;
        let row_prior = self.transition_prior()?;
        for row in self.transition_matrix.value().outer_iter() {
            lp += row_prior.log_prob(row)?;
        }
        Ok(lp + self.emissions.log_prior()?)
    }

    fn parameters(&self) -> Vec<&dyn AnyParameter> {
        let mut params: Vec<&dyn AnyParameter> = vec![
            &self.initial_probs,
            &self.initial_concentration,
            &self.transition_matrix,
            &self.transition_concentration,
        ];
        params.extend(self.emissions.parameters());
        params
    }

    fn parameters_mut(&mut self) -> Vec<&mut dyn AnyParameter> {
        let mut params: Vec<&mut dyn AnyParameter> = vec![
            &mut self.initial_probs,
            &mut self.initial_concentration,
            &mut self.transition_matrix,
            &mut self.transition_concentration,
        ];
        params.extend(self.emissions.parameters_mut());
        params
    }

    /// Conjugate update of the discrete-state parameters followed by the
    /// emission update.
    ///
    /// With `closed_form_emissions` the emission family's weighted MLE is
    /// used when available; otherwise (or when the family has none) the
    /// configured solver runs on the expected log joint over the emission
    /// group only.
    fn m_step(
        &self, batch: &Batch, posteriors: &[HmmPosterior], opts: &MStepOptions,
    ) -> HmmResult<Self> {
        validate_posterior_count(batch.num_sequences(), posteriors.len())?;
        let mut updated = self.conjugate_update(posteriors)?;

        if opts.closed_form_emissions {
            match updated.emissions.closed_form_update(batch, posteriors) {
                Ok(emissions) => {
                    updated.emissions = emissions;
                    return Ok(updated);
                }
                Err(HmmError::ClosedFormUnavailable) => {}
                Err(err) => return Err(err),
            }
        }
        gradient_m_step(&updated, batch, posteriors, &[ParamGroup::Emission], opts)
    }
}
