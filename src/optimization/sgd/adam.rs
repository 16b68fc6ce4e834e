//! Adam optimizer state and update rule.
//!
//! Standard Adam (Kingma & Ba) with bias-corrected first and second moments:
//!
//! ```text
//! m ← β₁ m + (1 − β₁) g
//! v ← β₂ v + (1 − β₂) g²
//! θ ← θ − η · m̂ / (√v̂ + ε),   m̂ = m / (1 − β₁ᵗ),  v̂ = v / (1 − β₂ᵗ)
//! ```
//!
//! The runner calls [`Adam::step`] with the gradient of the *loss*, so the
//! update descends.
use crate::optimization::{
    errors::{OptError, OptResult},
    loglik_optimizer::{Grad, Theta},
};
use serde::{Deserialize, Serialize};

/// Adam hyperparameters.
///
/// Default: `learning_rate = 1e-3`, `beta1 = 0.9`, `beta2 = 0.999`,
/// `eps = 1e-8`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdamConfig {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub eps: f64,
}

impl AdamConfig {
    /// Build a validated configuration.
    ///
    /// # Errors
    /// - `OptError::InvalidLearningRate` unless `learning_rate` is finite and
    ///   positive.
    /// - `OptError::InvalidAdamParam` unless `beta1, beta2 ∈ [0, 1)` and `eps`
    ///   is finite and positive.
    pub fn new(learning_rate: f64, beta1: f64, beta2: f64, eps: f64) -> OptResult<Self> {
        let cfg = Self { learning_rate, beta1, beta2, eps };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Default moments with a custom learning rate.
    pub fn with_learning_rate(learning_rate: f64) -> OptResult<Self> {
        Self::new(learning_rate, 0.9, 0.999, 1e-8)
    }

    pub fn validate(&self) -> OptResult<()> {
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(OptError::InvalidLearningRate {
                value: self.learning_rate,
                reason: "Learning rate must be finite and positive.",
            });
        }
        for (name, value) in [("beta1", self.beta1), ("beta2", self.beta2)] {
            if !(0.0..1.0).contains(&value) {
                return Err(OptError::InvalidAdamParam {
                    name,
                    value,
                    reason: "Moment decay rates must lie in [0, 1).",
                });
            }
        }
        if !self.eps.is_finite() || self.eps <= 0.0 {
            return Err(OptError::InvalidAdamParam {
                name: "eps",
                value: self.eps,
                reason: "eps must be finite and positive.",
            });
        }
        Ok(())
    }
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self { learning_rate: 1e-3, beta1: 0.9, beta2: 0.999, eps: 1e-8 }
    }
}

/// Running Adam state for a parameter vector of fixed length.
#[derive(Debug, Clone)]
pub struct Adam {
    cfg: AdamConfig,
    t: u64,
    m: Grad,
    v: Grad,
}

impl Adam {
    pub fn new(cfg: AdamConfig, dim: usize) -> Self {
        Self { cfg, t: 0, m: Grad::zeros(dim), v: Grad::zeros(dim) }
    }

    /// Number of updates applied so far.
    pub fn steps(&self) -> u64 {
        self.t
    }

    /// Apply one descent update to `theta` in place.
    ///
    /// # Errors
    /// - `OptError::GradientDimMismatch` if `grad.len()` differs from the
    ///   state dimension.
    pub fn step(&mut self, theta: &mut Theta, grad: &Grad) -> OptResult<()> {
        if grad.len() != self.m.len() || theta.len() != self.m.len() {
            return Err(OptError::GradientDimMismatch { expected: self.m.len(), found: grad.len() });
        }
        self.t += 1;
        let AdamConfig { learning_rate, beta1, beta2, eps } = self.cfg;
        let bc1 = 1.0 - beta1.powi(self.t as i32);
        let bc2 = 1.0 - beta2.powi(self.t as i32);

        ndarray::Zip::from(theta)
            .and(&mut self.m)
            .and(&mut self.v)
            .and(grad)
            .for_each(|th, m, v, &g| {
                *m = beta1 * *m + (1.0 - beta1) * g;
                *v = beta2 * *v + (1.0 - beta2) * g * g;
                let m_hat = *m / bc1;
                let v_hat = *v / bc2;
                *th -= learning_rate * m_hat / (v_hat.sqrt() + eps);
            });
        Ok(())
    }
}
