//! Emission families.
//!
//! Each family owns its per-state parameters and hands out an
//! [`EmissionDistribution`] per state. All three families also provide a
//! weighted maximum-likelihood update from smoothed state marginals, used
//! when `MStepOptions::closed_form_emissions` is set.
//!
//! | family                   | parameters              | bijector          |
//! |--------------------------|-------------------------|-------------------|
//! | [`GaussianEmissions`]    | means K×D, scales K×D   | identity/softplus |
//! | [`PoissonEmissions`]     | rates K×D               | softplus          |
//! | [`CategoricalEmissions`] | probs K×C               | softmax-centered  |
use crate::{
    hmm::{
        core::{
            bijectors::Bijector,
            data::Batch,
            distributions::{Categorical, EmissionDistribution},
            parameter::{AnyParameter, ParamGroup, Parameter},
            validation::{validate_emission_dim, validate_num_states, validate_posterior_count},
        },
        errors::{HmmError, HmmResult},
        models::base::HmmPosterior,
    },
    optimization::numerical_stability::PROB_FLOOR,
};
use ndarray::{Array2, ArrayView1, Ix2};
use std::fmt::Debug;

/// Smallest standard deviation produced by the Gaussian closed-form update.
pub const MIN_SCALE: f64 = 1e-6;

/// Smallest rate produced by the Poisson closed-form update.
pub const MIN_RATE: f64 = 1e-8;

// States with less total posterior weight keep their previous parameters.
const MIN_STATE_WEIGHT: f64 = 1e-12;

pub trait EmissionModel: Clone + Debug + Send + Sync {
    fn num_states(&self) -> usize;

    /// Length of one emission vector.
    fn emission_dim(&self) -> usize;

    /// Emission distribution of `state`.
    fn distribution(&self, state: usize) -> HmmResult<EmissionDistribution>;

    /// Emission parameters in a fixed order (the same order as
    /// [`parameters_mut`](Self::parameters_mut)).
    fn parameters(&self) -> Vec<&dyn AnyParameter>;

    fn parameters_mut(&mut self) -> Vec<&mut dyn AnyParameter>;

    /// Log prior density of the emission parameters; flat by default.
    fn log_prior(&self) -> HmmResult<f64> {
        Ok(0.0)
    }

    /// Weighted maximum-likelihood update from the smoothed marginals.
    ///
    /// # Errors
    /// - `HmmError::ClosedFormUnavailable` for families without one.
    fn closed_form_update(&self, _batch: &Batch, _posteriors: &[HmmPosterior]) -> HmmResult<Self> {
        Err(HmmError::ClosedFormUnavailable)
    }
}

fn check_state(state: usize, num_states: usize) -> HmmResult<()> {
    if state >= num_states {
        return Err(HmmError::StateOutOfRange { state, num_states });
    }
    Ok(())
}

fn check_inputs(dim: usize, batch: &Batch, posteriors: &[HmmPosterior]) -> HmmResult<()> {
    validate_emission_dim(dim, batch.emission_dim())?;
    validate_posterior_count(batch.num_sequences(), posteriors.len())
}

/// Calls `f(state, weight, emission)` for every sequence, step and state with positive weight.
fn for_each_weighted(
    batch: &Batch, posteriors: &[HmmPosterior], mut f: impl FnMut(usize, f64, ArrayView1<f64>),
) {
    for (n, post) in posteriors.iter().enumerate() {
        let seq = batch.sequence(n);
        for (y, weights) in seq.outer_iter().zip(post.posterior.smoothed_probs.outer_iter()) {
            for (k, &w) in weights.iter().enumerate() {
                if w > 0.0 {
                    f(k, w, y);
                }
            }
        }
    }
}

// ---- Gaussian ----

/// Diagonal Gaussian emissions, one mean and standard deviation per state
/// and dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianEmissions {
    means: Parameter<Ix2>,
    scales: Parameter<Ix2>,
}

impl GaussianEmissions {
    /// # Errors
    /// - Shape errors if `means` and `scales` differ or are empty.
    /// - `HmmError::ParameterDomain` for non-finite means or non-positive
    ///   scales.
    pub fn new(means: Array2<f64>, scales: Array2<f64>) -> HmmResult<Self> {
        validate_num_states(means.nrows())?;
        if means.ncols() == 0 {
            return Err(HmmError::EmissionDim { expected: 1, found: 0 });
        }
        if scales.dim() != means.dim() {
            return Err(HmmError::ParameterShape {
                name: "emission_scales",
                expected: means.shape().to_vec(),
                found: scales.shape().to_vec(),
            });
        }
        Ok(Self {
            means: Parameter::new("emission_means", means, Bijector::Identity, ParamGroup::Emission)?,
            scales: Parameter::new(
                "emission_scales",
                scales,
                Bijector::Softplus,
                ParamGroup::Emission,
            )?,
        })
    }

    pub fn means(&self) -> &Array2<f64> {
        self.means.value()
    }

    pub fn scales(&self) -> &Array2<f64> {
        self.scales.value()
    }
}

impl EmissionModel for GaussianEmissions {
    fn num_states(&self) -> usize {
        self.means.value().nrows()
    }

    fn emission_dim(&self) -> usize {
        self.means.value().ncols()
    }

    fn distribution(&self, state: usize) -> HmmResult<EmissionDistribution> {
        check_state(state, self.num_states())?;
        Ok(EmissionDistribution::DiagonalGaussian {
            means: self.means.value().row(state).to_owned(),
            scales: self.scales.value().row(state).to_owned(),
        })
    }

    fn parameters(&self) -> Vec<&dyn AnyParameter> {
        vec![&self.means, &self.scales]
    }

    fn parameters_mut(&mut self) -> Vec<&mut dyn AnyParameter> {
        vec![&mut self.means, &mut self.scales]
    }

    fn closed_form_update(&self, batch: &Batch, posteriors: &[HmmPosterior]) -> HmmResult<Self> {
        check_inputs(self.emission_dim(), batch, posteriors)?;
        let (k, d) = self.means.value().dim();
        let mut weight = vec![0.0; k];
        let mut sum = Array2::<f64>::zeros((k, d));
        let mut sum_sq = Array2::<f64>::zeros((k, d));
        for_each_weighted(batch, posteriors, |state, w, y| {
            weight[state] += w;
            let mut s = sum.row_mut(state);
            s.scaled_add(w, &y);
            let mut s2 = sum_sq.row_mut(state);
            s2.scaled_add(w, &y.mapv(|v| v * v));
        });

        let mut means = self.means.value().clone();
        let mut scales = self.scales.value().clone();
        for state in (0..k).filter(|s| weight[*s] > MIN_STATE_WEIGHT) {
            for j in 0..d {
                let mean = sum[[state, j]] / weight[state];
                let var = (sum_sq[[state, j]] / weight[state] - mean * mean).max(0.0);
                means[[state, j]] = mean;
                scales[[state, j]] = var.sqrt().max(MIN_SCALE);
            }
        }

        let mut updated = self.clone();
        updated.means.set_value(means)?;
        updated.scales.set_value(scales)?;
        Ok(updated)
    }
}

// ---- Poisson ----

/// Independent Poisson counts per dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct PoissonEmissions {
    rates: Parameter<Ix2>,
}

impl PoissonEmissions {
    pub fn new(rates: Array2<f64>) -> HmmResult<Self> {
        validate_num_states(rates.nrows())?;
        if rates.ncols() == 0 {
            return Err(HmmError::EmissionDim { expected: 1, found: 0 });
        }
        Ok(Self {
            rates: Parameter::new("emission_rates", rates, Bijector::Softplus, ParamGroup::Emission)?,
        })
    }

    pub fn rates(&self) -> &Array2<f64> {
        self.rates.value()
    }
}

impl EmissionModel for PoissonEmissions {
    fn num_states(&self) -> usize {
        self.rates.value().nrows()
    }

    fn emission_dim(&self) -> usize {
        self.rates.value().ncols()
    }

    fn distribution(&self, state: usize) -> HmmResult<EmissionDistribution> {
        check_state(state, self.num_states())?;
        Ok(EmissionDistribution::Poisson { rates: self.rates.value().row(state).to_owned() })
    }

    fn parameters(&self) -> Vec<&dyn AnyParameter> {
        vec![&self.rates]
    }

    fn parameters_mut(&mut self) -> Vec<&mut dyn AnyParameter> {
        vec![&mut self.rates]
    }

    fn closed_form_update(&self, batch: &Batch, posteriors: &[HmmPosterior]) -> HmmResult<Self> {
        check_inputs(self.emission_dim(), batch, posteriors)?;
        let (k, d) = self.rates.value().dim();
        let mut weight = vec![0.0; k];
        let mut sum = Array2::<f64>::zeros((k, d));
        for_each_weighted(batch, posteriors, |state, w, y| {
            weight[state] += w;
            sum.row_mut(state).scaled_add(w, &y);
        });

        let mut rates = self.rates.value().clone();
        for state in (0..k).filter(|s| weight[*s] > MIN_STATE_WEIGHT) {
            for j in 0..d {
                rates[[state, j]] = (sum[[state, j]] / weight[state]).max(MIN_RATE);
            }
        }

        let mut updated = self.clone();
        updated.rates.set_value(rates)?;
        Ok(updated)
    }
}

// ---- Categorical ----

/// One categorical observation per step, stored as a category index in a
/// single emission column.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoricalEmissions {
    probs: Parameter<Ix2>,
}

impl CategoricalEmissions {
    pub fn new(probs: Array2<f64>) -> HmmResult<Self> {
        validate_num_states(probs.nrows())?;
        Ok(Self {
            probs: Parameter::new(
                "emission_probs",
                probs,
                Bijector::SoftmaxCentered,
                ParamGroup::Emission,
            )?,
        })
    }

    pub fn num_categories(&self) -> usize {
        self.probs.value().ncols()
    }

    pub fn probs(&self) -> &Array2<f64> {
        self.probs.value()
    }
}

impl EmissionModel for CategoricalEmissions {
    fn num_states(&self) -> usize {
        self.probs.value().nrows()
    }

    fn emission_dim(&self) -> usize {
        1
    }

    fn distribution(&self, state: usize) -> HmmResult<EmissionDistribution> {
        check_state(state, self.num_states())?;
        Ok(EmissionDistribution::Categorical(Categorical::new(
            self.probs.value().row(state).to_owned(),
        )?))
    }

    fn parameters(&self) -> Vec<&dyn AnyParameter> {
        vec![&self.probs]
    }

    fn parameters_mut(&mut self) -> Vec<&mut dyn AnyParameter> {
        vec![&mut self.probs]
    }

    fn closed_form_update(&self, batch: &Batch, posteriors: &[HmmPosterior]) -> HmmResult<Self> {
        check_inputs(1, batch, posteriors)?;
        let (k, c) = self.probs.value().dim();
        let mut counts = Array2::<f64>::zeros((k, c));
        let mut invalid = None;
        for_each_weighted(batch, posteriors, |state, w, y| {
            let v = y[0];
            if v.is_finite() && v >= 0.0 && v.fract() == 0.0 && (v as usize) < c {
                counts[[state, v as usize]] += w;
            } else if invalid.is_none() {
                invalid = Some(v);
            }
        });
        if let Some(value) = invalid {
            return Err(HmmError::InvalidEmission { value, reason: "category index out of range" });
        }

        let mut probs = self.probs.value().clone();
        for (state, row) in counts.outer_iter().enumerate() {
            let total = row.sum();
            if total <= MIN_STATE_WEIGHT {
                continue;
            }
            let floored = row.mapv(|x| (x / total).max(PROB_FLOOR));
            let norm = floored.sum();
            probs.row_mut(state).assign(&(floored / norm));
        }

        let mut updated = self.clone();
        updated.probs.set_value(probs)?;
        Ok(updated)
    }
}
