//! Probability distributions used by the HMM models.
//!
//! - [`Categorical`] and [`Dirichlet`] describe the discrete-state part of
//!   the model (initial and transition rows and their conjugate priors).
//! - [`EmissionDistribution`] is a tagged variant over the supported
//!   emission families; scalar densities come from `statrs`.
//!
//! Constructors validate their parameters; `log_prob` methods validate the
//! observation against the family's support.
use crate::{
    hmm::errors::{HmmError, HmmResult},
    optimization::numerical_stability::{PROB_FLOOR, SIMPLEX_TOL},
};
use ndarray::{Array1, ArrayView1};
use statrs::{
    distribution::{Continuous, Discrete, Normal, Poisson},
    function::gamma::ln_gamma,
};
use tracing::warn;

/// Categorical distribution over `0..K`.
#[derive(Debug, Clone, PartialEq)]
pub struct Categorical {
    probs: Array1<f64>,
}

impl Categorical {
    /// # Errors
    /// - `HmmError::InvalidProbabilities` if `probs` is empty, has a negative
    ///   or non-finite entry, or does not sum to one.
    pub fn new(probs: Array1<f64>) -> HmmResult<Self> {
        if probs.is_empty() {
            return Err(HmmError::InvalidProbabilities {
                index: 0,
                value: f64::NAN,
                reason: "at least one category is required",
            });
        }
        if let Some((index, &value)) =
            probs.iter().enumerate().find(|(_, p)| !(p.is_finite() && **p >= 0.0))
        {
            return Err(HmmError::InvalidProbabilities {
                index,
                value,
                reason: "probabilities must be finite and >= 0",
            });
        }
        let total = probs.sum();
        if (total - 1.0).abs() > SIMPLEX_TOL {
            return Err(HmmError::InvalidProbabilities {
                index: 0,
                value: total,
                reason: "probabilities must sum to 1",
            });
        }
        Ok(Self { probs })
    }

    pub fn num_categories(&self) -> usize {
        self.probs.len()
    }

    pub fn probs_parameter(&self) -> &Array1<f64> {
        &self.probs
    }

    /// `ln p_k`; `−∞` for a zero-probability category.
    ///
    /// # Errors
    /// - `HmmError::StateOutOfRange` if `k ≥ K`.
    pub fn log_prob(&self, k: usize) -> HmmResult<f64> {
        self.probs
            .get(k)
            .map(|p| p.ln())
            .ok_or(HmmError::StateOutOfRange { state: k, num_states: self.probs.len() })
    }

    /// Most probable category (lowest index on ties).
    pub fn mode(&self) -> usize {
        self.probs
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |acc, (i, &p)| if p > acc.1 { (i, p) } else { acc })
            .0
    }
}

/// Dirichlet distribution with concentration `α ∈ (0, ∞)^K`.
#[derive(Debug, Clone, PartialEq)]
pub struct Dirichlet {
    concentration: Array1<f64>,
}

impl Dirichlet {
    /// # Errors
    /// - `HmmError::DegenerateConcentration` for the first entry that is
    ///   non-finite or ≤ 0, or an empty vector.
    pub fn new(concentration: Array1<f64>) -> HmmResult<Self> {
        if concentration.is_empty() {
            return Err(HmmError::DegenerateConcentration { index: 0, value: f64::NAN });
        }
        if let Some((index, &value)) =
            concentration.iter().enumerate().find(|(_, a)| !(a.is_finite() && **a > 0.0))
        {
            return Err(HmmError::DegenerateConcentration { index, value });
        }
        Ok(Self { concentration })
    }

    pub fn concentration(&self) -> &Array1<f64> {
        &self.concentration
    }

    /// Log density at a point of the simplex.
    ///
    /// Components are floored at `PROB_FLOOR` before taking logs so a
    /// boundary point yields a large finite penalty instead of `−∞`.
    ///
    /// # Errors
    /// - `HmmError::InvalidProbabilities` on a length mismatch.
    pub fn log_prob(&self, x: ArrayView1<f64>) -> HmmResult<f64> {
        if x.len() != self.concentration.len() {
            return Err(HmmError::InvalidProbabilities {
                index: x.len(),
                value: f64::NAN,
                reason: "point length must match the concentration length",
            });
        }
        let alpha_sum = self.concentration.sum();
        let norm = ln_gamma(alpha_sum) - self.concentration.iter().map(|&a| ln_gamma(a)).sum::<f64>();
        let kernel: f64 = self
            .concentration
            .iter()
            .zip(x.iter())
            .map(|(&a, &xi)| (a - 1.0) * xi.max(PROB_FLOOR).ln())
            .sum();
        Ok(norm + kernel)
    }

    pub fn mean(&self) -> Array1<f64> {
        &self.concentration / self.concentration.sum()
    }

    /// Posterior-mode policy used by the conjugate M-step.
    ///
    /// - Every `α_i > 1`: the exact mode `(α_i − 1) / (Σα − K)`.
    /// - Every `α_i ≤ 1`: the mode is undefined; the mean is returned.
    /// - Otherwise: `max(α_i − 1, 0)` normalized, each component floored at
    ///   `PROB_FLOOR`, then renormalized.
    ///
    /// The two fallback branches emit a `warn!` event.
    pub fn mode(&self) -> Array1<f64> {
        let k = self.concentration.len() as f64;
        if self.concentration.iter().all(|&a| a > 1.0) {
            return self.concentration.mapv(|a| a - 1.0) / (self.concentration.sum() - k);
        }

        let clamped = self.concentration.mapv(|a| (a - 1.0).max(0.0));
        let total = clamped.sum();
        if total <= 0.0 {
            warn!(
                concentration = ?self.concentration.as_slice(),
                "Dirichlet mode undefined (all concentrations <= 1); using the mean"
            );
            return self.mean();
        }

        warn!(
            concentration = ?self.concentration.as_slice(),
            "Dirichlet concentration <= 1 in some component; flooring the mode at {PROB_FLOOR:e}"
        );
        let floored = (clamped / total).mapv(|p| p.max(PROB_FLOOR));
        let norm = floored.sum();
        floored / norm
    }
}

/// Emission distribution of one state, dispatched by family.
#[derive(Debug, Clone, PartialEq)]
pub enum EmissionDistribution {
    /// Independent normal components, `D` means and standard deviations.
    DiagonalGaussian { means: Array1<f64>, scales: Array1<f64> },
    /// Independent Poisson counts, `D` rates.
    Poisson { rates: Array1<f64> },
    /// One category index per step (`D = 1`).
    Categorical(Categorical),
}

impl EmissionDistribution {
    /// Dimension of one emission vector.
    pub fn event_dim(&self) -> usize {
        match self {
            EmissionDistribution::DiagonalGaussian { means, .. } => means.len(),
            EmissionDistribution::Poisson { rates } => rates.len(),
            EmissionDistribution::Categorical(_) => 1,
        }
    }

    /// Log density (or mass) of one emission vector.
    ///
    /// # Errors
    /// - `HmmError::EmissionDim` if `y.len()` differs from
    ///   [`event_dim`](Self::event_dim).
    /// - `HmmError::InvalidEmission` for a count that is not a non-negative
    ///   integer or a category index out of range.
    /// - `HmmError::InvalidDistribution` if `statrs` rejects the parameters.
    pub fn log_prob(&self, y: ArrayView1<f64>) -> HmmResult<f64> {
        let expected = self.event_dim();
        if y.len() != expected {
            return Err(HmmError::EmissionDim { expected, found: y.len() });
        }
        match self {
            EmissionDistribution::DiagonalGaussian { means, scales } => {
                let mut total = 0.0;
                for ((&m, &s), &v) in means.iter().zip(scales.iter()).zip(y.iter()) {
                    let normal = Normal::new(m, s)
                        .map_err(|e| HmmError::InvalidDistribution { text: e.to_string() })?;
                    total += normal.ln_pdf(v);
                }
                Ok(total)
            }
            EmissionDistribution::Poisson { rates } => {
                let mut total = 0.0;
                for (&rate, &v) in rates.iter().zip(y.iter()) {
                    let count = as_count(v)?;
                    let poisson = Poisson::new(rate)
                        .map_err(|e| HmmError::InvalidDistribution { text: e.to_string() })?;
                    total += poisson.ln_pmf(count);
                }
                Ok(total)
            }
            EmissionDistribution::Categorical(cat) => {
                let index = as_count(y[0])? as usize;
                if index >= cat.num_categories() {
                    return Err(HmmError::InvalidEmission {
                        value: y[0],
                        reason: "category index out of range",
                    });
                }
                cat.log_prob(index)
            }
        }
    }
}

fn as_count(v: f64) -> HmmResult<u64> {
    if !(v.is_finite() && v >= 0.0 && v.fract() == 0.0) {
        return Err(HmmError::InvalidEmission {
            value: v,
            reason: "expected a non-negative integer",
        });
    }
    Ok(v as u64)
}
