//! Integration tests for HMM parameter estimation.
//!
//! Purpose
//! -------
//! - Validate the end-to-end training pipeline: from a validated `Batch`,
//!   through model construction and EM / SGD fitting, to inference on the
//!   fitted model.
//! - Check the properties the training loop promises on realistic data:
//!   parameter recovery, a non-decreasing log joint under exact updates,
//!   hand-computable conjugate updates, and unbiased minibatch losses.
//!
//! Coverage
//! --------
//! - `hmm::models::standard::StandardHmm` with Gaussian and Poisson
//!   emissions, through `fit_em` (closed-form, Adam and L-BFGS M-steps,
//!   including the default options) and `fit_sgd`.
//! - `hmm::models::covariate::CovariateHmm` through `fit_em` with per-step
//!   transition statistics.
//! - `hmm::models::objectives::ExpectedLogJoint` minibatch scaling of the
//!   loss and of its gradient.
//!
//! Exclusions
//! ----------
//! - Low-level filter/smoother recursions, bijectors and distributions are
//!   covered by unit tests next to their implementations.
use approx::assert_abs_diff_eq;
use ndarray::{Array1, Array2, Array3, Axis, array};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_hmm::{
    hmm::{
        core::{
            data::Batch,
            options::{EmOptions, MStepOptions, MStepSolver},
            parameter::ParamGroup,
        },
        models::{
            CovariateHmm, ExpectedLogJoint, GaussianEmissions, HiddenMarkovModel,
            PoissonEmissions, StandardHmm,
        },
    },
    optimization::{
        loglik_optimizer::{MLEOptions, Tolerances, fd_gradient, traits::LineSearcher},
        sgd::{AdamConfig, MinibatchObjective, SgdOptions},
    },
};

/// Purpose
/// -------
/// Draw one state from a discrete distribution by inverse CDF.
fn sample_state(rng: &mut ChaCha8Rng, probs: &[f64]) -> usize {
    let u: f64 = rng.random();
    let mut acc = 0.0;
    for (k, p) in probs.iter().enumerate() {
        acc += p;
        if u < acc {
            return k;
        }
    }
    probs.len() - 1
}

/// Standard normal draw by Box–Muller.
fn sample_normal(rng: &mut ChaCha8Rng) -> f64 {
    let u1: f64 = 1.0 - rng.random::<f64>();
    let u2: f64 = rng.random();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Poisson draw by multiplication of uniforms; fine for small rates.
fn sample_poisson(rng: &mut ChaCha8Rng, rate: f64) -> f64 {
    let limit = (-rate).exp();
    let mut count = 0.0;
    let mut prod: f64 = rng.random();
    while prod > limit {
        count += 1.0;
        prod *= rng.random::<f64>();
    }
    count
}

/// Purpose
/// -------
/// Simulate `n` sequences of length `t_len` from a homogeneous chain and
/// return the latent paths next to the state sequence.
///
/// Returns
/// -------
/// - An `n × t_len` array of states; emissions are drawn by the caller.
fn simulate_states(
    rng: &mut ChaCha8Rng, n: usize, t_len: usize, initial: &[f64], transition: &Array2<f64>,
) -> Array2<usize> {
    let mut states = Array2::<usize>::zeros((n, t_len));
    for i in 0..n {
        let mut z = sample_state(rng, initial);
        states[[i, 0]] = z;
        for t in 1..t_len {
            let row: Vec<f64> = transition.row(z).to_vec();
            z = sample_state(rng, &row);
            states[[i, t]] = z;
        }
    }
    states
}

fn gaussian_batch(seed: u64, n: usize, t_len: usize) -> Batch {
    gaussian_batch_from(seed, n, t_len, &array![[0.9, 0.1], [0.2, 0.8]])
}

/// Gaussian sequences with means (−2, 2) and unit scale, driven by
/// `transition` from a uniform initial state.
fn gaussian_batch_from(seed: u64, n: usize, t_len: usize, transition: &Array2<f64>) -> Batch {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let means = [-2.0, 2.0];
    let states = simulate_states(&mut rng, n, t_len, &[0.5, 0.5], transition);
    let mut emissions = Array3::<f64>::zeros((n, t_len, 1));
    for ((i, t, _), y) in emissions.indexed_iter_mut() {
        *y = means[states[[i, t]]] + sample_normal(&mut rng);
    }
    Batch::new(emissions, None).expect("simulated Gaussian batch should be valid")
}

fn poisson_batch(seed: u64, n: usize, t_len: usize) -> Batch {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let transition = array![[0.85, 0.15], [0.15, 0.85]];
    let rates = [1.0, 8.0];
    let states = simulate_states(&mut rng, n, t_len, &[0.5, 0.5], &transition);
    let mut emissions = Array3::<f64>::zeros((n, t_len, 1));
    for ((i, t, _), y) in emissions.indexed_iter_mut() {
        *y = sample_poisson(&mut rng, rates[states[[i, t]]]);
    }
    Batch::new(emissions, None).expect("simulated Poisson batch should be valid")
}

fn gaussian_model(
    transition: Array2<f64>, means: Array2<f64>, scale: f64,
) -> StandardHmm<GaussianEmissions> {
    let scales = Array2::from_elem(means.raw_dim(), scale);
    let emissions = GaussianEmissions::new(means, scales).expect("valid Gaussian emissions");
    StandardHmm::new(array![0.5, 0.5], transition, emissions).expect("valid standard HMM")
}

fn adam_m_step(num_epochs: usize, closed_form_emissions: bool) -> MStepOptions {
    let sgd = SgdOptions::new(AdamConfig::default(), 1, num_epochs, false, 0)
        .expect("valid SGD options");
    MStepOptions::new(MStepSolver::Sgd(sgd), closed_form_emissions).expect("valid M-step options")
}

fn assert_rows_on_simplex(probs: &Array2<f64>) {
    for row in probs.outer_iter() {
        assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-9);
        assert!(row.iter().all(|p| *p >= 0.0));
    }
}

#[test]
// Purpose
// -------
// EM with closed-form Gaussian emissions recovers the generating transition
// matrix and emission means from a moderately sized batch.
//
// Given
// -----
// - 20 sequences of length 100 from A = [[0.9, 0.1], [0.2, 0.8]], means
//   (−2, 2), unit scales.
// - Initialization A₀ = [[0.6, 0.4], [0.4, 0.6]], means (−1, 1), scale 1.5.
//
// Expect
// ------
// - 50 recorded log joints, all finite.
// - Every transition entry within 0.05 of the truth, means within 0.2.
fn fit_em_recovers_gaussian_hmm() {
    // Arrange
    let batch = gaussian_batch(7, 20, 100);
    let model = gaussian_model(array![[0.6, 0.4], [0.4, 0.6]], array![[-1.0], [1.0]], 1.5);
    let opts = EmOptions::new(50, adam_m_step(0, true)).unwrap();

    // Act
    let fit = model.fit_em(&batch, &opts).unwrap();

    // Assert
    assert_eq!(fit.log_probs.len(), 50);
    assert!(fit.log_probs.iter().all(|lp| lp.is_finite()));
    let truth = array![[0.9, 0.1], [0.2, 0.8]];
    for (est, tru) in fit.model.transition_matrix().iter().zip(truth.iter()) {
        assert!((est - tru).abs() < 0.05, "transition estimate {est} vs {tru}");
    }
    let means = fit.model.emissions().means();
    assert!((means[[0, 0]] + 2.0).abs() < 0.2);
    assert!((means[[1, 0]] - 2.0).abs() < 0.2);
    assert_rows_on_simplex(fit.model.transition_matrix());
    assert_abs_diff_eq!(fit.model.initial_probs().sum(), 1.0, epsilon = 1e-9);
}

#[test]
// Purpose
// -------
// EM with default options, i.e. conjugate transition updates followed by
// the minibatch-Adam emission step, recovers a sticky transition matrix.
//
// Given
// -----
// - 50 sequences of length 20 from A = [[0.9, 0.1], [0.1, 0.9]], means
//   (−2, 2), unit scales.
// - Initialization A₀ = [[0.7, 0.3], [0.3, 0.7]], means (−1, 1), scale 1.5.
// - `EmOptions::default()`: 50 iterations, 50 Adam epochs per M-step.
//
// Expect
// ------
// - 50 finite log joints.
// - Every entry of the fitted A within 0.05 of the truth.
// - Means on the correct side of zero with positive scales.
fn fit_em_with_default_options_recovers_transitions() {
    // Arrange
    let truth = array![[0.9, 0.1], [0.1, 0.9]];
    let batch = gaussian_batch_from(1, 50, 20, &truth);
    let model = gaussian_model(array![[0.7, 0.3], [0.3, 0.7]], array![[-1.0], [1.0]], 1.5);

    // Act
    let fit = model.fit_em(&batch, &EmOptions::default()).unwrap();

    // Assert
    assert_eq!(fit.log_probs.len(), 50);
    assert!(fit.log_probs.iter().all(|lp| lp.is_finite()));
    for (est, tru) in fit.model.transition_matrix().iter().zip(truth.iter()) {
        assert!((est - tru).abs() < 0.05, "transition estimate {est} vs {tru}");
    }
    let means = fit.model.emissions().means();
    assert!(means[[0, 0]] < 0.0 && means[[1, 0]] > 0.0);
    assert!(fit.model.emissions().scales().iter().all(|s| *s > 0.0));
    assert_rows_on_simplex(fit.model.transition_matrix());
}

#[test]
// Purpose
// -------
// With exact conjugate and closed-form updates, every EM iteration is a
// full maximization, so the log joint never decreases.
//
// Given
// -----
// - A small Gaussian batch and a poor initialization.
//
// Expect
// ------
// - `log_probs[i + 1] ≥ log_probs[i]` up to floating-point noise.
fn fit_em_log_joint_is_non_decreasing_with_exact_updates() {
    // Arrange
    let batch = gaussian_batch(11, 6, 40);
    let model = gaussian_model(array![[0.5, 0.5], [0.5, 0.5]], array![[-0.5], [0.5]], 2.0);
    let opts = EmOptions::new(25, adam_m_step(0, true)).unwrap();

    // Act
    let fit = model.fit_em(&batch, &opts).unwrap();

    // Assert
    for pair in fit.log_probs.windows(2) {
        let tol = 1e-8 * pair[0].abs().max(1.0);
        assert!(pair[1] >= pair[0] - tol, "log joint decreased: {} -> {}", pair[0], pair[1]);
    }
}

#[test]
// Purpose
// -------
// Zero EM iterations return the input model unchanged with an empty
// trajectory.
fn fit_em_with_zero_iterations_is_identity() {
    let batch = gaussian_batch(3, 2, 10);
    let model = gaussian_model(array![[0.7, 0.3], [0.4, 0.6]], array![[-1.0], [1.0]], 1.0);
    let opts = EmOptions::new(0, adam_m_step(0, true)).unwrap();

    let fit = model.fit_em(&batch, &opts).unwrap();

    assert!(fit.log_probs.is_empty());
    assert_eq!(fit.model, model);
}

#[test]
// Purpose
// -------
// A single EM iteration with the gradient sub-step disabled applies only
// the Dirichlet posterior-mode updates, which can be computed by hand when
// the posterior is effectively certain.
//
// Given
// -----
// - Means ±10 with unit scale, one sequence y = (−10, −10, −10, 10, 10).
// - Concentration 1.1 on both priors; uniform initial and transition.
//
// Expect
// ------
// - Initial counts (1, 0) → π = (1.1, 0.1) / 1.2.
// - Transition counts [[2, 1], [0, 1]] → rows (2.1, 1.1) / 3.2 and
//   (0.1, 1.1) / 1.2.
// - Emission parameters unchanged up to the unconstrained round trip.
fn conjugate_only_em_step_matches_hand_computed_mode() {
    // Arrange
    let emissions = Array3::from_shape_vec((1, 5, 1), vec![-10.0, -10.0, -10.0, 10.0, 10.0])
        .unwrap();
    let batch = Batch::new(emissions, None).unwrap();
    let model = gaussian_model(array![[0.5, 0.5], [0.5, 0.5]], array![[-10.0], [10.0]], 1.0);
    let opts = EmOptions::new(1, adam_m_step(0, false)).unwrap();

    // Act
    let fit = model.fit_em(&batch, &opts).unwrap();

    // Assert
    let pi = fit.model.initial_probs();
    assert_abs_diff_eq!(pi[0], 1.1 / 1.2, epsilon = 1e-9);
    assert_abs_diff_eq!(pi[1], 0.1 / 1.2, epsilon = 1e-9);
    let a = fit.model.transition_matrix();
    assert_abs_diff_eq!(a[[0, 0]], 2.1 / 3.2, epsilon = 1e-9);
    assert_abs_diff_eq!(a[[0, 1]], 1.1 / 3.2, epsilon = 1e-9);
    assert_abs_diff_eq!(a[[1, 0]], 0.1 / 1.2, epsilon = 1e-9);
    assert_abs_diff_eq!(a[[1, 1]], 1.1 / 1.2, epsilon = 1e-9);
    let fitted = fit.model.emissions();
    assert_abs_diff_eq!(fitted.means(), model.emissions().means(), epsilon = 1e-9);
    assert_abs_diff_eq!(fitted.scales(), model.emissions().scales(), epsilon = 1e-9);
}

#[test]
// Purpose
// -------
// The minibatch loss is scaled by N / |B|, so averaging it over a partition
// of the sequences reproduces the full-batch loss exactly.
//
// Given
// -----
// - N = 6 sequences, posteriors from one E-step, blocks of 2 contiguous
//   sequences.
//
// Expect
// ------
// - mean(block losses) = full loss.
fn minibatch_losses_average_to_full_batch_loss() {
    // Arrange
    let batch = gaussian_batch(21, 6, 15);
    let model = gaussian_model(array![[0.8, 0.2], [0.3, 0.7]], array![[-1.5], [1.5]], 1.2);
    let posteriors = model.e_step(&batch).unwrap();
    let objective = ExpectedLogJoint::new(&model, &posteriors, &ParamGroup::ALL);
    let theta = model.unconstrained_params_of(&ParamGroup::ALL);

    // Act
    let full: Vec<usize> = (0..6).collect();
    let full_loss = objective.loss(&theta, &batch, &full).unwrap();
    let block_losses: Vec<f64> = full
        .chunks(2)
        .map(|block| objective.loss(&theta, &batch, block).unwrap())
        .collect();

    // Assert
    let mean = block_losses.iter().sum::<f64>() / block_losses.len() as f64;
    assert_abs_diff_eq!(mean, full_loss, epsilon = 1e-10);
}

#[test]
// Purpose
// -------
// Because each minibatch loss is an unbiased estimate of the full loss, the
// average of the minibatch gradients equals the full-batch gradient.
//
// Given
// -----
// - N = 6 sequences, posteriors from one E-step, blocks of 2 and of 3
//   contiguous sequences.
// - Finite-difference gradients over every trainable parameter.
//
// Expect
// ------
// - For both block sizes, mean(block gradients) = full gradient.
fn minibatch_gradients_average_to_full_batch_gradient() {
    // Arrange
    let batch = gaussian_batch(21, 6, 15);
    let model = gaussian_model(array![[0.8, 0.2], [0.3, 0.7]], array![[-1.5], [1.5]], 1.2);
    let posteriors = model.e_step(&batch).unwrap();
    let objective = ExpectedLogJoint::new(&model, &posteriors, &ParamGroup::ALL);
    let theta = model.unconstrained_params_of(&ParamGroup::ALL);
    let all: Vec<usize> = (0..6).collect();
    let gradient_of = |indices: &[usize]| {
        fd_gradient(&theta, &|x: &Array1<f64>| objective.loss(x, &batch, indices)).unwrap()
    };

    // Act
    let full = gradient_of(&all);

    // Assert
    for block_size in [2, 3] {
        let blocks: Vec<Array1<f64>> = all.chunks(block_size).map(|b| gradient_of(b)).collect();
        let mut mean = Array1::<f64>::zeros(theta.len());
        for g in &blocks {
            mean += g;
        }
        mean /= blocks.len() as f64;
        assert_abs_diff_eq!(mean, full, epsilon = 1e-5);
    }
}

#[test]
// Purpose
// -------
// The L-BFGS M-step path runs inside EM and yields a valid model whose log
// joint improves over the run.
//
// Given
// -----
// - A small Gaussian batch, the gradient emission step on L-BFGS with a
//   20-iteration cap.
//
// Expect
// ------
// - Finite log joints, last ≥ first.
// - Valid probabilities and positive scales after fitting.
fn fit_em_with_lbfgs_m_step_improves_log_joint() {
    // Arrange
    let batch = gaussian_batch(5, 4, 30);
    let model = gaussian_model(array![[0.6, 0.4], [0.4, 0.6]], array![[-1.0], [1.0]], 1.5);
    let tols = Tolerances::new(Some(1e-6), None, Some(20)).unwrap();
    let mle = MLEOptions::new(tols, LineSearcher::MoreThuente, false, None).unwrap();
    let m_step = MStepOptions::new(MStepSolver::Lbfgs(mle), false).unwrap();
    let opts = EmOptions::new(3, m_step).unwrap();

    // Act
    let fit = model.fit_em(&batch, &opts).unwrap();

    // Assert
    assert_eq!(fit.log_probs.len(), 3);
    assert!(fit.log_probs.iter().all(|lp| lp.is_finite()));
    assert!(fit.log_probs[2] >= fit.log_probs[0] - 1e-6);
    assert_rows_on_simplex(fit.model.transition_matrix());
    assert!(fit.model.emissions().scales().iter().all(|s| *s > 0.0));
}

#[test]
// Purpose
// -------
// Direct minibatch SGD on the marginal likelihood reduces the loss and
// keeps every parameter inside its domain.
//
// Given
// -----
// - Poisson data with rates (1, 8); initialization at rates (1, 2).
// - Batches of 2 sequences, 15 epochs, Adam learning rate 0.05.
//
// Expect
// ------
// - One loss per epoch, the last below the first.
// - Valid probabilities and positive rates.
fn fit_sgd_reduces_marginal_loss() {
    // Arrange
    let batch = poisson_batch(13, 4, 25);
    let emissions = PoissonEmissions::new(array![[1.0], [2.0]]).unwrap();
    let model =
        StandardHmm::new(array![0.5, 0.5], array![[0.7, 0.3], [0.3, 0.7]], emissions).unwrap();
    let adam = AdamConfig { learning_rate: 0.05, ..AdamConfig::default() };
    let opts = SgdOptions::new(adam, 2, 15, false, 0).unwrap();

    // Act
    let fit = model.fit_sgd(&batch, &opts).unwrap();

    // Assert
    assert_eq!(fit.losses.len(), 15);
    assert!(fit.losses.iter().all(|l| l.is_finite()));
    assert!(fit.losses[14] < fit.losses[0]);
    assert_rows_on_simplex(fit.model.transition_matrix());
    assert!(fit.model.emissions().rates().iter().all(|r| *r > 0.0));
}

#[test]
// Purpose
// -------
// The covariate-driven model trains through EM with per-step transition
// statistics, and the fitted model still decodes and filters sequences.
//
// Given
// -----
// - Poisson counts with a single covariate, 3 sequences of length 12.
// - Two EM iterations with a short Adam M-step over every parameter.
//
// Expect
// ------
// - Two finite log joints.
// - Time-varying transition rows on the simplex for the fitted model.
// - A decoded path of length 12 with states in range.
fn covariate_hmm_trains_through_em() {
    // Arrange
    let mut rng = ChaCha8Rng::seed_from_u64(17);
    let covariates = Array3::from_shape_fn((3, 12, 1), |(_, t, _)| (t as f64 / 6.0).sin());
    let mut counts = Array3::<f64>::zeros((3, 12, 1));
    for ((_, t, _), y) in counts.indexed_iter_mut() {
        let rate = if t % 6 < 3 { 1.0 } else { 6.0 };
        *y = sample_poisson(&mut rng, rate);
    }
    let batch = Batch::new(counts, Some(covariates.clone())).unwrap();
    let model = CovariateHmm::new(
        array![0.5, 0.5],
        array![[1.0, 0.0], [0.0, 1.0]],
        Array3::zeros((2, 2, 1)),
        PoissonEmissions::new(array![[1.5], [4.0]]).unwrap(),
    )
    .unwrap();
    let sgd = SgdOptions::new(AdamConfig::default(), 3, 5, false, 0).unwrap();
    let opts = EmOptions::new(2, MStepOptions::new(MStepSolver::Sgd(sgd), false).unwrap()).unwrap();

    // Act
    let fit = model.fit_em(&batch, &opts).unwrap();

    // Assert
    assert_eq!(fit.log_probs.len(), 2);
    assert!(fit.log_probs.iter().all(|lp| lp.is_finite()));

    let u = covariates.index_axis(Axis(0), 0);
    let transitions = fit.model.compute_transition_matrices(Some(u)).unwrap();
    let tensor = match transitions {
        rust_hmm::inference::TransitionMatrices::TimeVarying(a) => a,
        other => panic!("expected time-varying transitions, got {other:?}"),
    };
    for row in tensor.lanes(Axis(2)) {
        assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-9);
    }

    let path = fit.model.most_likely_states(batch.sequence(0), batch.covariates_of(0)).unwrap();
    assert_eq!(path.len(), 12);
    assert!(path.iter().all(|z| *z < 2));
    let filtered = fit.model.filter(batch.sequence(0), batch.covariates_of(0)).unwrap();
    let expected_rows: Array1<f64> = filtered.filtered_probs.sum_axis(Axis(1));
    for s in expected_rows.iter() {
        assert_abs_diff_eq!(*s, 1.0, epsilon = 1e-9);
    }
}
