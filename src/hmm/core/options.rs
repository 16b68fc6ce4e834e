//! HMM training options — configuration for the M-step and the EM loop.
//!
//! Purpose
//! -------
//! Bundle the knobs of EM training in one serializable place: which solver
//! runs the gradient part of the M-step, whether emission families with a
//! closed-form update should use it, and how many EM iterations to run.
//!
//! Key behaviors
//! -------------
//! - [`MStepSolver`] selects minibatch Adam ([`SgdOptions`]) or full-batch
//!   L-BFGS ([`MLEOptions`]).
//! - [`MStepOptions`] pairs the solver with the closed-form switch.
//! - [`EmOptions`] fixes the EM trip count; there is no automatic
//!   convergence test.
//!
//! Invariants & assumptions
//! ------------------------
//! - Component options are validated by their own constructors;
//!   [`EmOptions::validate`] re-runs those checks for deserialized values.
//! - With the Adam solver, `num_epochs = 0` disables the gradient sub-step
//!   and leaves only the conjugate updates.
//!
//! Conventions
//! -----------
//! - All structs use `#[serde(default)]`, so a partial JSON/TOML document
//!   fills the rest from `Default`.
//! - Defaults: 50 EM iterations and a 50-epoch Adam M-step with learning
//!   rate `1e-2` and `batch_size = 1`.
use crate::{
    hmm::errors::HmmResult,
    optimization::{
        loglik_optimizer::MLEOptions,
        sgd::{AdamConfig, SgdOptions},
    },
};
use serde::{Deserialize, Serialize};

/// Solver used for the gradient part of the M-step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MStepSolver {
    Sgd(SgdOptions),
    Lbfgs(MLEOptions),
}

impl Default for MStepSolver {
    fn default() -> Self {
        MStepSolver::Sgd(SgdOptions {
            optimizer: AdamConfig { learning_rate: 1e-2, ..AdamConfig::default() },
            batch_size: 1,
            num_epochs: 50,
            shuffle: false,
            seed: 0,
        })
    }
}

/// M-step configuration.
///
/// - `solver`: gradient solver for parameters without a conjugate update.
/// - `closed_form_emissions`: use the emission family's weighted-MLE update
///   instead of the gradient solver when the family provides one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MStepOptions {
    pub solver: MStepSolver,
    pub closed_form_emissions: bool,
}

impl MStepOptions {
    pub fn new(solver: MStepSolver, closed_form_emissions: bool) -> HmmResult<Self> {
        let opts = Self { solver, closed_form_emissions };
        opts.validate()?;
        Ok(opts)
    }

    pub fn validate(&self) -> HmmResult<()> {
        match &self.solver {
            MStepSolver::Sgd(opts) => opts.validate()?,
            MStepSolver::Lbfgs(opts) => opts.validate()?,
        }
        Ok(())
    }
}

/// EM loop configuration: a fixed number of iterations and the M-step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmOptions {
    pub num_iters: usize,
    pub m_step: MStepOptions,
}

impl EmOptions {
    pub fn new(num_iters: usize, m_step: MStepOptions) -> HmmResult<Self> {
        let opts = Self { num_iters, m_step };
        opts.validate()?;
        Ok(opts)
    }

    pub fn validate(&self) -> HmmResult<()> {
        self.m_step.validate()
    }
}

impl Default for EmOptions {
    fn default() -> Self {
        Self { num_iters: 50, m_step: MStepOptions::default() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{hmm::errors::HmmError, optimization::errors::OptError};

    #[test]
    // Purpose
    // -------
    // Defaults match the documented EM configuration.
    //
    // Expect
    // ------
    // - 50 EM iterations, closed form off, Adam 1e-2 for 50 epochs with
    //   batch size 1.
    fn em_options_default_matches_documented_values() {
        // Arrange / Act
        let opts = EmOptions::default();

        // Assert
        assert_eq!(opts.num_iters, 50);
        assert!(!opts.m_step.closed_form_emissions);
        match opts.m_step.solver {
            MStepSolver::Sgd(sgd) => {
                assert_eq!(sgd.optimizer.learning_rate, 1e-2);
                assert_eq!(sgd.num_epochs, 50);
                assert_eq!(sgd.batch_size, 1);
            }
            other => panic!("expected the Adam solver, got {other:?}"),
        }
    }

    #[test]
    // Purpose
    // -------
    // Partial JSON fills the rest from defaults and invalid solver settings
    // are caught by `validate`.
    fn em_options_deserialize_partial_json() {
        let opts: EmOptions = serde_json::from_str(
            r#"{ "num_iters": 5, "m_step": { "solver": { "lbfgs": { "verbose": false } } } }"#,
        )
        .unwrap();
        assert_eq!(opts.num_iters, 5);
        assert_eq!(opts.m_step.solver, MStepSolver::Lbfgs(MLEOptions::default()));
        assert!(opts.validate().is_ok());

        let bad: EmOptions = serde_json::from_str(
            r#"{ "m_step": { "solver": { "sgd": { "batch_size": 0 } } } }"#,
        )
        .unwrap();
        assert!(matches!(
            bad.validate().unwrap_err(),
            HmmError::Optimization(OptError::InvalidBatchSize { batch_size: 0, .. })
        ));
    }
}
