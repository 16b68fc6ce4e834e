//! Shape checks shared by model constructors and training entrypoints.
use crate::hmm::errors::{HmmError, HmmResult};

/// Reject models with zero states.
pub fn validate_num_states(k: usize) -> HmmResult<()> {
    if k == 0 {
        return Err(HmmError::NoStates);
    }
    Ok(())
}

/// Require `found == expected` for parameter `name`.
pub fn validate_shape(name: &'static str, found: &[usize], expected: &[usize]) -> HmmResult<()> {
    if found != expected {
        return Err(HmmError::ParameterShape {
            name,
            expected: expected.to_vec(),
            found: found.to_vec(),
        });
    }
    Ok(())
}

/// Require the emission dimension of the data to match the model's.
pub fn validate_emission_dim(model_dim: usize, data_dim: usize) -> HmmResult<()> {
    if model_dim != data_dim {
        return Err(HmmError::EmissionDim { expected: model_dim, found: data_dim });
    }
    Ok(())
}

/// One posterior per sequence.
pub fn validate_posterior_count(num_sequences: usize, num_posteriors: usize) -> HmmResult<()> {
    if num_sequences != num_posteriors {
        return Err(HmmError::PosteriorCount { expected: num_sequences, found: num_posteriors });
    }
    Ok(())
}

/// Covariate columns must match what the model was built for.
pub fn validate_covariate_dim(
    model_dim: Option<usize>, t_len: usize, found: Option<(usize, usize)>,
) -> HmmResult<()> {
    match (model_dim, found) {
        (_, None) => Ok(()),
        (None, Some(_)) => Err(HmmError::CovariatesUnsupported),
        (Some(c), Some((rows, cols))) if rows == t_len && cols == c => Ok(()),
        (Some(c), Some((rows, cols))) => Err(HmmError::CovariateShape {
            expected: vec![t_len, c],
            found: vec![rows, cols],
        }),
    }
}
