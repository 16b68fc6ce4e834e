//! Batch containers for HMM training and inference.
//!
//! Purpose
//! -------
//! Provide a validated, rectangular container for `N` independent emission
//! sequences of common length `T`, with optional per-step covariates. All
//! training entrypoints take a [`Batch`] so that shape and finiteness checks
//! happen once, at the boundary.
//!
//! Key behaviors
//! -------------
//! - [`Batch::new`] enforces non-emptiness, finiteness, and matching leading
//!   dimensions between emissions and covariates.
//! - Accessors return views of single sequences; nothing is copied.
//! - [`Batch::num_elements`] is the normalizer `N · T · D` applied to every
//!   training loss.
//!
//! Invariants & assumptions
//! ------------------------
//! - `emissions` has shape `N×T×D` with `N ≥ 1`, `T ≥ 1`, `D ≥ 1`.
//! - `covariates`, when present, has shape `N×T×C` with the same `N` and `T`
//!   and `C ≥ 1`.
//! - All entries are finite. Family-specific support (integer counts,
//!   category indices) is checked later by the emission distributions.
//!
//! Conventions
//! -----------
//! - Sequences are never split: minibatches are subsets of sequence indices.
//! - Variable-length sequences must be padded upstream.
//! - Covariate row `t` is the input observed at step `t`; the transition
//!   from `t` to `t + 1` is driven by row `t + 1`.
//!
//! Testing notes
//! -------------
//! - Unit tests cover the happy path, empty batches, non-finite values and
//!   covariate shape mismatches.
use crate::hmm::errors::{HmmError, HmmResult};
use ndarray::{Array3, ArrayView2, Axis};

/// `Batch` — `N` emission sequences of length `T`, with optional covariates.
///
/// Fields
/// ------
/// - `emissions`: `Array3<f64>`, shape `N×T×D`.
/// - `covariates`: `Option<Array3<f64>>`, shape `N×T×C`.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    emissions: Array3<f64>,
    covariates: Option<Array3<f64>>,
}

impl Batch {
    /// Construct a validated batch.
    ///
    /// Errors
    /// ------
    /// - `HmmError::EmptyBatch` if `N`, `T` or `D` is zero.
    /// - `HmmError::NonFiniteEmission` / `HmmError::NonFiniteCovariate` for
    ///   the first non-finite entry.
    /// - `HmmError::CovariateShape` if covariates disagree on `N` or `T`, or
    ///   have no columns.
    ///
    /// Examples
    /// --------
    /// ```rust
    /// # use ndarray::Array3;
    /// # use rust_hmm::hmm::core::data::Batch;
    /// let batch = Batch::new(Array3::zeros((4, 10, 2)), None).unwrap();
    /// assert_eq!(batch.num_sequences(), 4);
    /// assert_eq!(batch.num_elements(), 80);
    /// ```
    pub fn new(emissions: Array3<f64>, covariates: Option<Array3<f64>>) -> HmmResult<Self> {
        let (n, t_len, d) = emissions.dim();
        if n == 0 || t_len == 0 || d == 0 {
            return Err(HmmError::EmptyBatch);
        }
        if let Some(((sequence, t, dim), &value)) =
            emissions.indexed_iter().find(|(_, v)| !v.is_finite())
        {
            return Err(HmmError::NonFiniteEmission { sequence, t, dim, value });
        }

        if let Some(cov) = &covariates {
            let (cn, ct, cc) = cov.dim();
            if cn != n || ct != t_len || cc == 0 {
                return Err(HmmError::CovariateShape {
                    expected: vec![n, t_len, cc.max(1)],
                    found: cov.shape().to_vec(),
                });
            }
            if let Some(((sequence, t, dim), &value)) =
                cov.indexed_iter().find(|(_, v)| !v.is_finite())
            {
                return Err(HmmError::NonFiniteCovariate { sequence, t, dim, value });
            }
        }

        Ok(Self { emissions, covariates })
    }

    /// `N`.
    pub fn num_sequences(&self) -> usize {
        self.emissions.len_of(Axis(0))
    }

    /// `T`.
    pub fn num_timesteps(&self) -> usize {
        self.emissions.len_of(Axis(1))
    }

    /// `D`.
    pub fn emission_dim(&self) -> usize {
        self.emissions.len_of(Axis(2))
    }

    /// `C`, or `None` without covariates.
    pub fn covariate_dim(&self) -> Option<usize> {
        self.covariates.as_ref().map(|c| c.len_of(Axis(2)))
    }

    /// Total number of emission scalars, `N · T · D`.
    pub fn num_elements(&self) -> usize {
        self.emissions.len()
    }

    pub fn emissions(&self) -> &Array3<f64> {
        &self.emissions
    }

    pub fn covariates(&self) -> Option<&Array3<f64>> {
        self.covariates.as_ref()
    }

    /// Emissions of sequence `i` as a `T×D` view.
    ///
    /// Panics
    /// ------
    /// - If `i ≥ N`; callers iterate over `0..num_sequences()`.
    pub fn sequence(&self, i: usize) -> ArrayView2<'_, f64> {
        self.emissions.index_axis(Axis(0), i)
    }

    /// Covariates of sequence `i` as a `T×C` view.
    pub fn covariates_of(&self, i: usize) -> Option<ArrayView2<'_, f64>> {
        self.covariates.as_ref().map(|c| c.index_axis(Axis(0), i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    // Purpose
    // -------
    // A well-formed batch exposes its dimensions and per-sequence views.
    //
    // Given
    // -----
    // - Emissions 3×5×2 filled with the flat index, covariates 3×5×1.
    //
    // Expect
    // ------
    // - Dimensions (3, 5, 2), 30 elements, covariate dim 1.
    // - `sequence(1)` starts at flat index 10.
    fn batch_new_accepts_valid_input() {
        // Arrange
        let emissions = Array3::from_shape_fn((3, 5, 2), |(i, t, d)| (i * 10 + t * 2 + d) as f64);
        let covariates = Array3::<f64>::ones((3, 5, 1));

        // Act
        let batch = Batch::new(emissions, Some(covariates)).unwrap();

        // Assert
        assert_eq!(
            (batch.num_sequences(), batch.num_timesteps(), batch.emission_dim()),
            (3, 5, 2)
        );
        assert_eq!(batch.num_elements(), 30);
        assert_eq!(batch.covariate_dim(), Some(1));
        assert_eq!(batch.sequence(1)[[0, 0]], 10.0);
        assert_eq!(batch.covariates_of(2).unwrap().dim(), (5, 1));
    }

    #[test]
    // Purpose
    // -------
    // Invalid batches are rejected with the offending location.
    fn batch_new_rejects_invalid_input() {
        assert_eq!(Batch::new(Array3::zeros((0, 5, 1)), None).unwrap_err(), HmmError::EmptyBatch);
        assert_eq!(Batch::new(Array3::zeros((2, 0, 1)), None).unwrap_err(), HmmError::EmptyBatch);

        let mut emissions = Array3::<f64>::zeros((2, 3, 1));
        emissions[[1, 2, 0]] = f64::INFINITY;
        assert!(matches!(
            Batch::new(emissions, None).unwrap_err(),
            HmmError::NonFiniteEmission { sequence: 1, t: 2, dim: 0, .. }
        ));

        let err = Batch::new(Array3::zeros((2, 3, 1)), Some(Array3::zeros((2, 4, 1)))).unwrap_err();
        assert_eq!(
            err,
            HmmError::CovariateShape { expected: vec![2, 3, 1], found: vec![2, 4, 1] }
        );

        let mut cov = Array3::<f64>::zeros((2, 3, 2));
        cov[[0, 1, 1]] = f64::NAN;
        assert!(matches!(
            Batch::new(Array3::zeros((2, 3, 1)), Some(cov)).unwrap_err(),
            HmmError::NonFiniteCovariate { sequence: 0, t: 1, dim: 1, .. }
        ));
    }
}
