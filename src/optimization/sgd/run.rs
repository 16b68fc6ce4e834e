//! Epoch/minibatch loop driving [`Adam`] over a [`MinibatchObjective`].
use crate::optimization::{
    errors::{OptError, OptResult},
    loglik_optimizer::{
        Grad, Theta, fd_gradient,
        validation::{validate_grad, validate_theta_input, validate_value},
    },
    sgd::{
        adam::Adam,
        traits::{MinibatchObjective, SgdOptions, SgdOutcome},
    },
};
use rand::{SeedableRng, seq::SliceRandom};
use rand_chacha::ChaCha8Rng;

/// run_sgd — minimize a minibatch loss with Adam.
///
/// Each epoch visits every example exactly once. Indices are taken in order,
/// or permuted by a single `ChaCha8Rng` seeded from `opts.seed` when
/// `opts.shuffle` is set, then cut into chunks of `opts.batch_size`; the last
/// chunk may be smaller. For every chunk the loss and gradient are evaluated
/// at the current `θ` and one Adam step is applied.
///
/// Returns the final parameters and the per-epoch mean loss. With
/// `num_epochs = 0` the starting point is returned unchanged.
///
/// # Errors
/// - Configuration errors from [`SgdOptions::validate`].
/// - `OptError::InvalidThetaInput` for a non-finite start.
/// - `OptError::EmptyDataset` when the objective has no examples.
/// - `OptError::NonFiniteCost` / `OptError::InvalidGradient` when a loss or
///   gradient diverges, plus any error raised by the objective.
pub fn run_sgd<F: MinibatchObjective>(
    f: &F, theta0: Theta, data: &F::Data, opts: &SgdOptions,
) -> OptResult<SgdOutcome> {
    opts.validate()?;
    validate_theta_input(&theta0)?;
    let n = f.num_examples(data);
    if n == 0 {
        return Err(OptError::EmptyDataset);
    }

    let mut theta = theta0;
    let mut adam = Adam::new(opts.optimizer, theta.len());
    let mut rng = ChaCha8Rng::seed_from_u64(opts.seed);
    let mut order: Vec<usize> = (0..n).collect();
    let mut losses = Vec::with_capacity(opts.num_epochs);

    for epoch in 0..opts.num_epochs {
        if opts.shuffle {
            order.shuffle(&mut rng);
        }
        let mut total = 0.0;
        let mut num_batches = 0usize;
        for indices in order.chunks(opts.batch_size) {
            let loss = f.loss(&theta, data, indices)?;
            validate_value(loss)?;
            let grad = minibatch_gradient(f, &theta, data, indices)?;
            adam.step(&mut theta, &grad)?;
            tracing::trace!(epoch, batch = num_batches, loss, "sgd: step");
            total += loss;
            num_batches += 1;
        }
        let mean = total / num_batches as f64;
        tracing::debug!(epoch, loss = mean, "sgd: epoch finished");
        losses.push(mean);
    }

    validate_theta_input(&theta).map_err(|_| divergence(&theta))?;
    Ok(SgdOutcome { theta_hat: theta, losses })
}

fn minibatch_gradient<F: MinibatchObjective>(
    f: &F, theta: &Theta, data: &F::Data, indices: &[usize],
) -> OptResult<Grad> {
    match f.grad(theta, data, indices) {
        Ok(g) => {
            validate_grad(&g, theta.len())?;
            Ok(g)
        }
        Err(OptError::GradientNotImplemented) => {
            fd_gradient(theta, &|x: &Theta| f.loss(x, data, indices))
        }
        Err(e) => Err(e),
    }
}

fn divergence(theta: &Theta) -> OptError {
    match theta.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        Some((index, &value)) => OptError::InvalidThetaHat {
            index,
            value,
            reason: "Adam iterates diverged.",
        },
        None => OptError::UnknownError,
    }
}
