//! Forward filtering for a single sequence.
use crate::inference::{
    errors::{InferenceError, InferenceResult},
    transitions::TransitionMatrices,
    validation::validate_inputs,
};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// Output of [`hmm_filter`].
///
/// - `marginal_loglik`: `ln p(y_{1:T})`.
/// - `filtered_probs[t]`: `p(z_t | y_{1:t})`, shape T×K.
/// - `predicted_probs[t]`: `p(z_t | y_{1:t−1})`, shape T×K; row 0 is the
///   initial distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterPosterior {
    pub marginal_loglik: f64,
    pub filtered_probs: Array2<f64>,
    pub predicted_probs: Array2<f64>,
}

/// hmm_filter — scaled forward recursion.
///
/// At each step the predicted distribution is reweighted by the
/// max-shifted emission likelihoods and normalized; the log of the
/// normalizer plus the shift accumulates into the marginal log-likelihood.
///
/// # Errors
/// - Shape and domain errors from input validation.
/// - `InferenceError::ZeroLikelihood { t }` if no state has positive
///   predictive mass and finite likelihood at step `t`.
pub fn hmm_filter(
    initial: ArrayView1<f64>, transitions: &TransitionMatrices, log_likelihoods: ArrayView2<f64>,
) -> InferenceResult<FilterPosterior> {
    let (t_len, k) = validate_inputs(initial, transitions, log_likelihoods)?;
    let mut filtered_probs = Array2::<f64>::zeros((t_len, k));
    let mut predicted_probs = Array2::<f64>::zeros((t_len, k));
    let mut marginal_loglik = 0.0;
    let mut predicted: Array1<f64> = initial.to_owned();

    for t in 0..t_len {
        predicted_probs.row_mut(t).assign(&predicted);
        let ll = log_likelihoods.row(t);
        let shift = ll.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if !shift.is_finite() {
            return Err(InferenceError::ZeroLikelihood { t });
        }
        let mut weights = &predicted * &ll.mapv(|l| (l - shift).exp());
        let norm = weights.sum();
        if !(norm > 0.0) || !norm.is_finite() {
            return Err(InferenceError::ZeroLikelihood { t });
        }
        weights /= norm;
        marginal_loglik += shift + norm.ln();
        if t + 1 < t_len {
            predicted = weights.dot(&transitions.at(t));
        }
        filtered_probs.row_mut(t).assign(&weights);
    }

    Ok(FilterPosterior { marginal_loglik, filtered_probs, predicted_probs })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::numerical_stability::log_sum_exp;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    // Brute-force ln p(y) by enumerating every state path.
    fn brute_force_loglik(initial: &Array1<f64>, a: &Array2<f64>, ll: &Array2<f64>) -> f64 {
        let (t_len, k) = ll.dim();
        let mut terms = Vec::new();
        for code in 0..k.pow(t_len as u32) {
            let mut path = Vec::with_capacity(t_len);
            let mut c = code;
            for _ in 0..t_len {
                path.push(c % k);
                c /= k;
            }
            let mut lp = initial[path[0]].ln() + ll[[0, path[0]]];
            for t in 1..t_len {
                lp += a[[path[t - 1], path[t]]].ln() + ll[[t, path[t]]];
            }
            terms.push(lp);
        }
        log_sum_exp(Array1::from(terms).view())
    }

    #[test]
    // Purpose
    // -------
    // The scaled forward recursion reproduces the path-enumeration marginal
    // log-likelihood, and filtered rows lie on the simplex.
    //
    // Given
    // -----
    // - 2 states, 4 steps, log-likelihoods spanning several orders of
    //   magnitude.
    //
    // Expect
    // ------
    // - `marginal_loglik` equals the brute-force value.
    // - `predicted_probs[0]` equals the initial distribution.
    fn filter_matches_brute_force_marginal() {
        // Arrange
        let initial = array![0.6, 0.4];
        let a = array![[0.7, 0.3], [0.2, 0.8]];
        let ll = array![[-0.5, -2.0], [-1.5, -0.3], [-40.0, -41.0], [-2.5, -0.1]];
        let trans = TransitionMatrices::Homogeneous(a.clone());

        // Act
        let post = hmm_filter(initial.view(), &trans, ll.view()).unwrap();

        // Assert
        assert_abs_diff_eq!(
            post.marginal_loglik,
            brute_force_loglik(&initial, &a, &ll),
            epsilon = 1e-10
        );
        assert_abs_diff_eq!(post.predicted_probs.row(0), initial, epsilon = 1e-15);
        for row in post.filtered_probs.rows() {
            assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    // Purpose
    // -------
    // Impossible observations are reported with the offending step.
    //
    // Given
    // -----
    // - State 0 is certain (initial and absorbing), but step 1 has zero
    //   likelihood under state 0.
    //
    // Expect
    // ------
    // - `ZeroLikelihood { t: 1 }`.
    fn filter_reports_zero_likelihood_step() {
        let initial = array![1.0, 0.0];
        let trans = TransitionMatrices::Homogeneous(array![[1.0, 0.0], [0.0, 1.0]]);
        let ll = array![[0.0, 0.0], [f64::NEG_INFINITY, 0.0]];
        let err = hmm_filter(initial.view(), &trans, ll.view()).expect_err("impossible step");
        assert_eq!(err, InferenceError::ZeroLikelihood { t: 1 });
    }

    #[test]
    // Purpose
    // -------
    // Shape mismatches surface as structured errors.
    fn filter_rejects_shape_mismatches() {
        let trans = TransitionMatrices::Homogeneous(array![[0.5, 0.5], [0.5, 0.5]]);
        let ll = Array2::<f64>::zeros((3, 2));
        let err = hmm_filter(array![1.0].view(), &trans, ll.view()).unwrap_err();
        assert!(matches!(err, InferenceError::LogLikelihoodStates { expected: 1, found: 2 }));
        let empty = Array2::<f64>::zeros((0, 2));
        let err = hmm_filter(array![0.5, 0.5].view(), &trans, empty.view()).unwrap_err();
        assert_eq!(err, InferenceError::EmptySequence);
    }
}
