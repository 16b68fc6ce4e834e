//! Smoothing: one-pass backward smoother and two-filter smoother.
//!
//! Both produce the same [`SmoothedPosterior`]; the two-filter variant is the
//! one used by the E-step because it does not divide by predicted
//! probabilities when forming the smoothed marginals.
use crate::inference::{
    errors::{InferenceError, InferenceResult},
    filter::{FilterPosterior, hmm_filter},
    transitions::TransitionMatrices,
};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// Filtered, predicted and smoothed marginals of one sequence.
///
/// All three arrays are T×K and every row sums to one.
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothedPosterior {
    pub marginal_loglik: f64,
    pub filtered_probs: Array2<f64>,
    pub predicted_probs: Array2<f64>,
    pub smoothed_probs: Array2<f64>,
}

impl SmoothedPosterior {
    /// Number of time steps.
    pub fn num_timesteps(&self) -> usize {
        self.smoothed_probs.nrows()
    }

    pub fn num_states(&self) -> usize {
        self.smoothed_probs.ncols()
    }

    /// Check that the three arrays agree; returns `(T, K)`.
    pub fn validate(&self) -> InferenceResult<(usize, usize)> {
        let dim = self.smoothed_probs.dim();
        for arr in [&self.filtered_probs, &self.predicted_probs] {
            if arr.dim() != dim {
                return Err(InferenceError::PosteriorShape {
                    expected: vec![dim.0, dim.1],
                    found: arr.shape().to_vec(),
                });
            }
        }
        if dim.0 == 0 {
            return Err(InferenceError::EmptySequence);
        }
        Ok(dim)
    }

    fn from_filter(filter: FilterPosterior, smoothed_probs: Array2<f64>) -> Self {
        Self {
            marginal_loglik: filter.marginal_loglik,
            filtered_probs: filter.filtered_probs,
            predicted_probs: filter.predicted_probs,
            smoothed_probs,
        }
    }
}

/// hmm_smoother — forward filter followed by one backward pass over the
/// filtered and predicted probabilities:
///
/// `smoothed_t = filtered_t ⊙ A_t (smoothed_{t+1} ⊘ predicted_{t+1})`.
pub fn hmm_smoother(
    initial: ArrayView1<f64>, transitions: &TransitionMatrices, log_likelihoods: ArrayView2<f64>,
) -> InferenceResult<SmoothedPosterior> {
    let filter = hmm_filter(initial, transitions, log_likelihoods)?;
    let (t_len, k) = filter.filtered_probs.dim();
    let mut smoothed = Array2::<f64>::zeros((t_len, k));
    smoothed.row_mut(t_len - 1).assign(&filter.filtered_probs.row(t_len - 1));

    for t in (0..t_len - 1).rev() {
        let relative: Array1<f64> = smoothed
            .row(t + 1)
            .iter()
            .zip(filter.predicted_probs.row(t + 1))
            .map(|(&s, &p)| if p > 0.0 { s / p } else { 0.0 })
            .collect();
        let mut row = &filter.filtered_probs.row(t) * &transitions.at(t).dot(&relative);
        normalize(&mut row, t)?;
        smoothed.row_mut(t).assign(&row);
    }

    Ok(SmoothedPosterior::from_filter(filter, smoothed))
}

/// hmm_two_filter_smoother — combine the forward filter with a normalized
/// backward filter:
///
/// `β_{T−1} = 1`, `β_t ∝ A_t (β_{t+1} ⊙ exp(ll_{t+1} − max ll_{t+1}))`,
/// `smoothed_t ∝ filtered_t ⊙ β_t`.
pub fn hmm_two_filter_smoother(
    initial: ArrayView1<f64>, transitions: &TransitionMatrices, log_likelihoods: ArrayView2<f64>,
) -> InferenceResult<SmoothedPosterior> {
    let filter = hmm_filter(initial, transitions, log_likelihoods)?;
    let (t_len, k) = filter.filtered_probs.dim();
    let mut smoothed = Array2::<f64>::zeros((t_len, k));
    let mut backward = Array1::<f64>::from_elem(k, 1.0 / k as f64);
    smoothed.row_mut(t_len - 1).assign(&filter.filtered_probs.row(t_len - 1));

    for t in (0..t_len - 1).rev() {
        let ll = log_likelihoods.row(t + 1);
        let shift = ll.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let emitted = &backward * &ll.mapv(|l| (l - shift).exp());
        backward = transitions.at(t).dot(&emitted);
        normalize(&mut backward, t)?;
        let mut row = &filter.filtered_probs.row(t) * &backward;
        normalize(&mut row, t)?;
        smoothed.row_mut(t).assign(&row);
    }

    Ok(SmoothedPosterior::from_filter(filter, smoothed))
}

fn normalize(v: &mut Array1<f64>, t: usize) -> InferenceResult<()> {
    let total = v.sum();
    if !(total > 0.0) || !total.is_finite() {
        return Err(InferenceError::ZeroLikelihood { t });
    }
    *v /= total;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{Array3, array};

    #[test]
    // Purpose
    // -------
    // The one-pass and two-filter smoothers agree on marginals and
    // log-likelihood for homogeneous and time-varying transitions.
    //
    // Given
    // -----
    // - A 3-state model over 5 steps; the time-varying tensor repeats two
    //   distinct matrices.
    //
    // Expect
    // ------
    // - Smoothed marginals agree to 1e-10 and rows sum to one.
    fn smoothers_agree_for_both_transition_kinds() {
        // Arrange
        let initial = array![0.5, 0.3, 0.2];
        let a = array![[0.8, 0.1, 0.1], [0.2, 0.6, 0.2], [0.25, 0.25, 0.5]];
        let b = array![[0.1, 0.8, 0.1], [0.3, 0.3, 0.4], [0.6, 0.2, 0.2]];
        let ll = array![
            [-0.1, -1.2, -3.0],
            [-2.0, -0.4, -0.9],
            [-0.7, -0.7, -0.1],
            [-5.0, -0.2, -1.0],
            [-0.3, -2.2, -0.6]
        ];
        let mut tv = Array3::<f64>::zeros((4, 3, 3));
        for t in 0..4 {
            tv.index_axis_mut(ndarray::Axis(0), t).assign(if t % 2 == 0 { &a } else { &b });
        }

        for trans in [TransitionMatrices::Homogeneous(a.clone()), TransitionMatrices::TimeVarying(tv)]
        {
            // Act
            let one_pass = hmm_smoother(initial.view(), &trans, ll.view()).unwrap();
            let two_filter = hmm_two_filter_smoother(initial.view(), &trans, ll.view()).unwrap();

            // Assert
            assert_abs_diff_eq!(one_pass.smoothed_probs, two_filter.smoothed_probs, epsilon = 1e-10);
            assert_abs_diff_eq!(one_pass.marginal_loglik, two_filter.marginal_loglik);
            for row in two_filter.smoothed_probs.rows() {
                assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-12);
            }
        }
    }

    #[test]
    // Purpose
    // -------
    // With a single time step the smoothed marginal is the filtered one.
    fn single_step_smoothed_equals_filtered() {
        let initial = array![0.25, 0.75];
        let trans = TransitionMatrices::Homogeneous(array![[0.9, 0.1], [0.1, 0.9]]);
        let ll = array![[-1.0, -0.5]];
        let post = hmm_two_filter_smoother(initial.view(), &trans, ll.view()).unwrap();
        assert_eq!(post.smoothed_probs, post.filtered_probs);
        assert_eq!(post.validate().unwrap(), (1, 2));
    }
}
