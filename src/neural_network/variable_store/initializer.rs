use super::*;
use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};

/// Strategy used to fill a variable the first time it is created.
///
/// # Variants
///
/// - `Zeros` - Every element is `0.0`
/// - `Ones` - Every element is `1.0`
/// - `Constant` - Every element is the given value
/// - `Uniform` - Samples from `U(low, high)`
/// - `Normal` - Samples from `N(mean, std_dev)`
/// - `GlorotUniform` - Samples from `U(-limit, limit)` with `limit = sqrt(6 / (fan_in + fan_out))`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Initializer {
    Zeros,
    Ones,
    Constant(f32),
    Uniform { low: f32, high: f32 },
    Normal { mean: f32, std_dev: f32 },
    #[default]
    GlorotUniform,
}

impl Initializer {
    /// Creates a tensor of the given shape filled according to this initializer.
    ///
    /// # Parameters
    ///
    /// - `shape` - Shape of the tensor to create
    /// - `rng` - Random number generator used by the random initializers
    ///
    /// # Returns
    ///
    /// - `Ok(Tensor)` - The initialized tensor
    /// - `Err(ModelError::InputValidationError)` - If the distribution parameters are invalid
    pub fn initialize<R: Rng + ?Sized>(
        &self,
        shape: &[usize],
        rng: &mut R,
    ) -> Result<Tensor, ModelError> {
        match *self {
            Initializer::Zeros => Ok(Tensor::zeros(shape)),
            Initializer::Ones => Ok(Tensor::ones(shape)),
            Initializer::Constant(value) => Ok(Tensor::from_elem(shape, value)),
            Initializer::Uniform { low, high } => {
                let dist = Uniform::new(low, high).map_err(|e| {
                    ModelError::InputValidationError(format!(
                        "invalid uniform range [{}, {}): {}",
                        low, high, e
                    ))
                })?;
                sample_tensor(shape, &dist, rng)
            }
            Initializer::Normal { mean, std_dev } => {
                // Normal::new only rejects a non-finite std_dev
                if !(std_dev >= 0.0) {
                    return Err(ModelError::InputValidationError(format!(
                        "std_dev must be non-negative, got {}",
                        std_dev
                    )));
                }
                let dist = Normal::new(mean, std_dev).map_err(|e| {
                    ModelError::InputValidationError(format!(
                        "invalid normal distribution (mean {}, std_dev {}): {}",
                        mean, std_dev, e
                    ))
                })?;
                sample_tensor(shape, &dist, rng)
            }
            Initializer::GlorotUniform => {
                let (fan_in, fan_out) = compute_fans(shape);
                let limit = (6.0 / (fan_in + fan_out).max(1.0)).sqrt();
                Initializer::Uniform {
                    low: -limit,
                    high: limit,
                }
                .initialize(shape, rng)
            }
        }
    }
}

/// Computes `(fan_in, fan_out)` for a weight shape.
///
/// Vectors use their length for both fans, matrices use `(rows, cols)`, and higher rank
/// shapes multiply the last two dimensions by the receptive field size.
fn compute_fans(shape: &[usize]) -> (f32, f32) {
    match shape.len() {
        0 => (1.0, 1.0),
        1 => (shape[0] as f32, shape[0] as f32),
        2 => (shape[0] as f32, shape[1] as f32),
        n => {
            let receptive_field: usize = shape[..n - 2].iter().product();
            (
                (shape[n - 2] * receptive_field) as f32,
                (shape[n - 1] * receptive_field) as f32,
            )
        }
    }
}

fn sample_tensor<D, R>(shape: &[usize], dist: &D, rng: &mut R) -> Result<Tensor, ModelError>
where
    D: Distribution<f32>,
    R: Rng + ?Sized,
{
    let len: usize = shape.iter().product();
    let data: Vec<f32> = (0..len).map(|_| dist.sample(rng)).collect();
    Ok(Tensor::from_shape_vec(shape, data)?)
}
