//! Covariate-driven HMM — transitions from a softmax regression.
//!
//! `P(z_{t+1} = j | z_t = i, u_{t+1}) = softmax_j(b_ij + Σ_c W_ijc · u_{t+1,c})`
//!
//! Without covariates the bias alone defines a homogeneous matrix. With
//! covariates the model produces one matrix per step, so its E-step keeps
//! per-step transition statistics and its M-step runs the generic gradient
//! update over every trainable parameter.
use crate::{
    hmm::{
        core::{
            bijectors::Bijector,
            distributions::{Categorical, Dirichlet, EmissionDistribution},
            parameter::{AnyParameter, ParamGroup, Parameter},
            validation::{validate_num_states, validate_shape},
        },
        errors::{HmmError, HmmResult},
        models::{
            base::HiddenMarkovModel, emissions::EmissionModel, standard::DEFAULT_CONCENTRATION,
        },
    },
    optimization::numerical_stability::log_sum_exp,
};
use ndarray::{Array1, Array2, Array3, ArrayView1, Ix1, Ix2, Ix3, s};

#[derive(Debug, Clone, PartialEq)]
pub struct CovariateHmm<E: EmissionModel> {
    initial_probs: Parameter<Ix1>,
    initial_concentration: Parameter<Ix1>,
    transition_bias: Parameter<Ix2>,
    transition_weights: Parameter<Ix3>,
    emissions: E,
}

impl<E: EmissionModel> CovariateHmm<E> {
    /// # Errors
    /// - `HmmError::NoStates` for an empty initial distribution.
    /// - `HmmError::ParameterShape` if `bias` is not K×K, `weights` is not
    ///   K×K×C with `C ≥ 1`, or the emissions cover a different `K`.
    /// - `HmmError::ParameterDomain` for non-finite entries or an initial
    ///   distribution off the simplex.
    pub fn new(
        initial_probs: Array1<f64>, bias: Array2<f64>, weights: Array3<f64>, emissions: E,
    ) -> HmmResult<Self> {
        let k = initial_probs.len();
        validate_num_states(k)?;
        validate_shape("transition_bias", bias.shape(), &[k, k])?;
        let c = weights.dim().2;
        validate_shape("transition_weights", weights.shape(), &[k, k, c.max(1)])?;
        validate_shape("emissions", &[emissions.num_states()], &[k])?;
        Ok(Self {
            initial_probs: Parameter::new(
                "initial_probs",
                initial_probs,
                Bijector::SoftmaxCentered,
                ParamGroup::Initial,
            )?,
            initial_concentration: Parameter::new(
                "initial_concentration",
                Array1::from_elem(k, DEFAULT_CONCENTRATION),
                Bijector::Softplus,
                ParamGroup::Initial,
            )?
            .frozen(),
            transition_bias: Parameter::new(
                "transition_bias",
                bias,
                Bijector::Identity,
                ParamGroup::Transition,
            )?,
            transition_weights: Parameter::new(
                "transition_weights",
                weights,
                Bijector::Identity,
                ParamGroup::Transition,
            )?,
            emissions,
        })
    }

    pub fn initial_probs(&self) -> &Array1<f64> {
        self.initial_probs.value()
    }

    pub fn transition_bias(&self) -> &Array2<f64> {
        self.transition_bias.value()
    }

    pub fn transition_weights(&self) -> &Array3<f64> {
        self.transition_weights.value()
    }

    pub fn emissions(&self) -> &E {
        &self.emissions
    }

    fn num_covariates(&self) -> usize {
        self.transition_weights.value().dim().2
    }
}

impl<E: EmissionModel> HiddenMarkovModel for CovariateHmm<E> {
    fn num_states(&self) -> usize {
        self.initial_probs.value().len()
    }

    fn emission_dim(&self) -> usize {
        self.emissions.emission_dim()
    }

    fn covariate_dim(&self) -> Option<usize> {
        Some(self.num_covariates())
    }

    fn initial_distribution(&self) -> HmmResult<Categorical> {
        Categorical::new(self.initial_probs.value().clone())
    }

    fn transition_distribution(
        &self, state: usize, covariate: Option<ArrayView1<f64>>,
    ) -> HmmResult<Categorical> {
        let k = self.num_states();
        if state >= k {
            return Err(HmmError::StateOutOfRange { state, num_states: k });
        }
        let mut logits = self.transition_bias.value().row(state).to_owned();
        if let Some(u) = covariate {
            let c = self.num_covariates();
            if u.len() != c {
                return Err(HmmError::CovariateShape { expected: vec![c], found: vec![u.len()] });
            }
            let w = self.transition_weights.value().slice(s![state, .., ..]);
            logits += &w.dot(&u);
        }
        let norm = log_sum_exp(logits.view());
        Categorical::new(logits.mapv(|l| (l - norm).exp()))
    }

    fn emission_distribution(&self, state: usize) -> HmmResult<EmissionDistribution> {
        self.emissions.distribution(state)
    }

    fn log_prior(&self) -> HmmResult<f64> {
        let prior = Dirichlet::new(self.initial_concentration.value().clone())?;
        Ok(prior.log_prob(self.initial_probs.value().view())? + self.emissions.log_prior()?)
    }

    fn parameters(&self) -> Vec<&dyn AnyParameter> {
        let mut params: Vec<&dyn AnyParameter> = vec![
            &self.initial_probs,
            &self.initial_concentration,
            &self.transition_bias,
            &self.transition_weights,
        ];
        params.extend(self.emissions.parameters());
        params
    }

    fn parameters_mut(&mut self) -> Vec<&mut dyn AnyParameter> {
        let mut params: Vec<&mut dyn AnyParameter> = vec![
            &mut self.initial_probs,
            &mut self.initial_concentration,
            &mut self.transition_bias,
            &mut self.transition_weights,
        ];
        params.extend(self.emissions.parameters_mut());
        params
    }
}
