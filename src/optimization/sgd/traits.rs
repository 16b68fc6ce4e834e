//! Minibatch objective interface and runner configuration.
use crate::optimization::{
    errors::{OptError, OptResult},
    loglik_optimizer::{Grad, Theta},
    sgd::adam::AdamConfig,
};
use serde::{Deserialize, Serialize};

/// Loss over subsets of indivisible examples.
///
/// Examples are whatever the objective treats as atomic (for HMMs, whole
/// sequences). Minibatches are index slices into `0..num_examples(data)`.
///
/// Unlike [`LogLikelihood`](crate::optimization::loglik_optimizer::LogLikelihood)
/// this is a *loss*: the runner minimizes it.
pub trait MinibatchObjective {
    type Data: 'static;

    fn num_examples(&self, data: &Self::Data) -> usize;

    /// Loss of the minibatch `indices` at `theta`.
    fn loss(&self, theta: &Theta, data: &Self::Data, indices: &[usize]) -> OptResult<f64>;

    /// Gradient of [`loss`](Self::loss). Finite differences are used when
    /// this returns `OptError::GradientNotImplemented`.
    fn grad(&self, _theta: &Theta, _data: &Self::Data, _indices: &[usize]) -> OptResult<Grad> {
        Err(OptError::GradientNotImplemented)
    }
}

/// Minibatch runner configuration.
///
/// Default: Adam with learning rate `1e-3`, `batch_size = 1`,
/// `num_epochs = 50`, no shuffling, `seed = 0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SgdOptions {
    pub optimizer: AdamConfig,
    pub batch_size: usize,
    pub num_epochs: usize,
    /// Permute examples every epoch with a `ChaCha8Rng` seeded from `seed`.
    pub shuffle: bool,
    pub seed: u64,
}

impl SgdOptions {
    pub fn new(
        optimizer: AdamConfig, batch_size: usize, num_epochs: usize, shuffle: bool, seed: u64,
    ) -> OptResult<Self> {
        let opts = Self { optimizer, batch_size, num_epochs, shuffle, seed };
        opts.validate()?;
        Ok(opts)
    }

    pub fn validate(&self) -> OptResult<()> {
        self.optimizer.validate()?;
        if self.batch_size == 0 {
            return Err(OptError::InvalidBatchSize {
                batch_size: 0,
                reason: "Minibatches must contain at least one example.",
            });
        }
        Ok(())
    }
}

impl Default for SgdOptions {
    fn default() -> Self {
        Self {
            optimizer: AdamConfig::default(),
            batch_size: 1,
            num_epochs: 50,
            shuffle: false,
            seed: 0,
        }
    }
}

/// Result of [`run_sgd`](super::run_sgd).
///
/// - `theta_hat`: parameters after the last update.
/// - `losses`: mean minibatch loss of each epoch, evaluated before each
///   minibatch's update.
#[derive(Debug, Clone, PartialEq)]
pub struct SgdOutcome {
    pub theta_hat: Theta,
    pub losses: Vec<f64>,
}
