//! Most likely state path (Viterbi) in log space.
use crate::inference::{
    errors::{InferenceError, InferenceResult},
    transitions::TransitionMatrices,
    validation::validate_inputs,
};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// hmm_posterior_mode — `argmax_z p(z_{1:T} | y_{1:T})`.
///
/// Ties are broken toward the lower state index.
///
/// # Errors
/// - Shape and domain errors from input validation.
/// - `InferenceError::ZeroLikelihood { t }` when every path has zero
///   probability by step `t`.
pub fn hmm_posterior_mode(
    initial: ArrayView1<f64>, transitions: &TransitionMatrices, log_likelihoods: ArrayView2<f64>,
) -> InferenceResult<Vec<usize>> {
    let (t_len, k) = validate_inputs(initial, transitions, log_likelihoods)?;
    let mut delta: Array1<f64> = &initial.mapv(f64::ln) + &log_likelihoods.row(0);
    let mut backpointers = Array2::<usize>::zeros((t_len, k));
    check_reachable(&delta, 0)?;

    for t in 1..t_len {
        let log_a = transitions.at(t - 1).mapv(f64::ln);
        let mut next = Array1::<f64>::from_elem(k, f64::NEG_INFINITY);
        for j in 0..k {
            let (best_i, best) = (0..k)
                .map(|i| (i, delta[i] + log_a[[i, j]]))
                .fold((0, f64::NEG_INFINITY), |acc, cur| if cur.1 > acc.1 { cur } else { acc });
            backpointers[[t, j]] = best_i;
            next[j] = best + log_likelihoods[[t, j]];
        }
        check_reachable(&next, t)?;
        delta = next;
    }

    let mut state = argmax(&delta);
    let mut path = vec![0usize; t_len];
    path[t_len - 1] = state;
    for t in (1..t_len).rev() {
        state = backpointers[[t, state]];
        path[t - 1] = state;
    }
    Ok(path)
}

fn check_reachable(delta: &Array1<f64>, t: usize) -> InferenceResult<()> {
    if delta.iter().all(|d| *d == f64::NEG_INFINITY) {
        return Err(InferenceError::ZeroLikelihood { t });
    }
    Ok(())
}

fn argmax(v: &Array1<f64>) -> usize {
    v.iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |acc, (i, &x)| if x > acc.1 { (i, x) } else { acc })
        .0
}
