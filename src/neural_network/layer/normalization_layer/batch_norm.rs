use super::input_validation_function::*;
use super::*;
use ndarray::parallel::prelude::*;
use ndarray::{Array1, ArrayView1, Axis};
use tracing::{debug, trace};

/// Threshold for switching between sequential and parallel moment computation.
/// Based on the total number of elements in the input.
const BATCH_NORM_PARALLEL_THRESHOLD: usize = 1024;

/// Small constant added to the variance before taking the square root
pub const BATCH_NORM_EPSILON: f32 = 1e-8;

/// Default weight of the previous running statistics in the moving average
pub const BATCH_NORM_DEFAULT_ALPHA: f32 = 0.9;

/// Initial value of the scale parameter `gamma`
const GAMMA_INIT: f32 = 0.1;

/// Sequence-wise batch normalization over the last axis of its input.
///
/// Statistics are computed over every axis but the last one, so the same helper works for
/// `[batch, features]` and `[batch, time, features]` inputs. All parameters and running
/// statistics live in a [`VariableStore`] under this helper's scope:
///
/// - `beta` - Shift, initialized to zeros, trainable only if `shift` is set
/// - `gamma` - Scale, initialized to 0.1
/// - `mean`, `var` - Running statistics, initialized to zeros and ones, frozen
/// - `counter`, `zero_cnt` - Number of training updates and the zero sentinel it is compared to
///
/// On the first call (while `counter == zero_cnt`) the running statistics are seeded with the
/// batch statistics. In training mode they are then blended with
/// `running = (1 - alpha) * batch + alpha * running` and the counter is incremented; in
/// deterministic (evaluation) mode they are used unchanged.
///
/// # Fields
///
/// - `scope` - Scope under which the variables are stored
/// - `alpha` - Weight of the previous running statistics in the moving average
/// - `shift` - Whether `beta` is trainable
///
/// # Example
/// ```rust
/// use bnlstm::neural_network::*;
/// use ndarray::array;
///
/// let mut store = VariableStore::with_seed(0);
/// let bn = SequenceBatchNorm::new("bn");
///
/// let x = array![[1.0, 2.0], [3.0, 4.0]].into_dyn();
/// let y = bn.forward(&mut store, &x, false).unwrap();
/// assert_eq!(y.shape(), &[2, 2]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceBatchNorm {
    scope: String,
    alpha: f32,
    shift: bool,
}

impl SequenceBatchNorm {
    /// Creates a helper with `alpha = 0.9` and a trainable shift.
    pub fn new(scope: &str) -> Self {
        Self {
            scope: scope.to_string(),
            alpha: BATCH_NORM_DEFAULT_ALPHA,
            shift: true,
        }
    }

    /// Sets the weight of the previous running statistics in the moving average.
    ///
    /// # Errors
    ///
    /// - `ModelError::InputValidationError` - If `alpha` is not within `[0, 1]`
    pub fn with_alpha(mut self, alpha: f32) -> Result<Self, ModelError> {
        validate_rate(alpha, "alpha")?;
        self.alpha = alpha;
        Ok(self)
    }

    /// Sets whether `beta` is trainable.
    pub fn with_shift(mut self, shift: bool) -> Self {
        self.shift = shift;
        self
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn shift(&self) -> bool {
        self.shift
    }

    /// Normalizes `x` and updates the running statistics in training mode.
    ///
    /// # Parameters
    ///
    /// - `store` - Variable store holding the parameters and statistics
    /// - `x` - Input tensor with shape `[..., feature_dim]`
    /// - `deterministic` - `true` in evaluation mode (statistics frozen), `false` in training mode
    ///
    /// # Returns
    ///
    /// - `Ok(Tensor)` - Normalized tensor with the same shape as `x`
    /// - `Err(ModelError::InputValidationError)` - If `x` is a scalar, is empty, or its feature
    ///   width differs from the statistics already stored under this scope
    pub fn forward(
        &self,
        store: &mut VariableStore,
        x: &Tensor,
        deterministic: bool,
    ) -> Result<Tensor, ModelError> {
        let feat_dim = validate_feature_axis(x, "SequenceBatchNorm")?;
        let param_shape = [feat_dim];
        let scope = self.scope.as_str();

        let beta = store.get_or_create(scope, "beta", &param_shape, Initializer::Zeros, self.shift)?;
        let gamma = store.get_or_create(
            scope,
            "gamma",
            &param_shape,
            Initializer::Constant(GAMMA_INIT),
            true,
        )?;
        let mut mean = store.get_or_create(scope, "mean", &param_shape, Initializer::Zeros, false)?;
        let mut var = store.get_or_create(scope, "var", &param_shape, Initializer::Ones, false)?;
        let counter = store.counter(scope, "counter");
        let zero_cnt = store.counter(scope, "zero_cnt");

        let (batch_mean, batch_var) = moments(x, feat_dim)?;

        if counter == zero_cnt {
            mean = batch_mean.clone();
            var = batch_var.clone();
            store.assign(scope, "mean", mean.clone())?;
            store.assign(scope, "var", var.clone())?;
            debug!(scope, feat_dim, "seeded running statistics from batch");
        }

        if !deterministic {
            mean = &batch_mean * (1.0 - self.alpha) + &mean * self.alpha;
            var = &batch_var * (1.0 - self.alpha) + &var * self.alpha;
            store.assign(scope, "mean", mean.clone())?;
            store.assign(scope, "var", var.clone())?;
            store.set_counter(scope, "counter", counter + 1);
            trace!(scope, counter = counter + 1, "updated running statistics");
        }

        // (x - mean) / sqrt(var + eps) * gamma + beta, folded into one scale and one offset
        let scale = &gamma / &var.mapv(|v| (v + BATCH_NORM_EPSILON).sqrt());
        let offset = &beta - &(&mean * &scale);
        Ok(x * &scale + &offset)
    }

    /// Returns the running `(mean, var)` stored under this scope, if they exist yet.
    pub fn running_statistics<'a>(&self, store: &'a VariableStore) -> Option<(&'a Tensor, &'a Tensor)> {
        Some((store.get(&self.scope, "mean")?, store.get(&self.scope, "var")?))
    }
}

/// Applies [`SequenceBatchNorm`] once under `scope`.
///
/// # Parameters
///
/// - `store` - Variable store holding the parameters and statistics
/// - `x` - Input tensor with shape `[..., feature_dim]`
/// - `deterministic` - `true` in evaluation mode, `false` in training mode
/// - `alpha` - Weight of the previous running statistics in the moving average
/// - `shift` - Whether `beta` is trainable
/// - `scope` - Scope under which the variables are stored
///
/// # Returns
///
/// - `Ok(Tensor)` - Normalized tensor with the same shape as `x`
/// - `Err(ModelError)` - See [`SequenceBatchNorm::forward`]
pub fn batch_norm(
    store: &mut VariableStore,
    x: &Tensor,
    deterministic: bool,
    alpha: f32,
    shift: bool,
    scope: &str,
) -> Result<Tensor, ModelError> {
    SequenceBatchNorm::new(scope)
        .with_alpha(alpha)?
        .with_shift(shift)
        .forward(store, x, deterministic)
}

/// Population mean and variance of every feature over all axes but the last.
///
/// # Returns
///
/// - `Ok((Tensor, Tensor))` - Mean and variance, each with shape `[feat_dim]`
/// - `Err(ModelError::InputValidationError)` - If `feat_dim` is 0
/// - `Err(ModelError::ProcessingError)` - If the input cannot be viewed as `[rows, feat_dim]`
pub fn moments(x: &Tensor, feat_dim: usize) -> Result<(Tensor, Tensor), ModelError> {
    if feat_dim == 0 {
        return Err(ModelError::InputValidationError(
            "feat_dim must be greater than 0".to_string(),
        ));
    }
    let rows = x.len() / feat_dim;
    let x2 = x.to_shape((rows, feat_dim))?;

    let stats: Vec<(f32, f32)> = if x.len() >= BATCH_NORM_PARALLEL_THRESHOLD {
        x2.axis_iter(Axis(1))
            .into_par_iter()
            .map(column_moments)
            .collect()
    } else {
        x2.axis_iter(Axis(1)).map(column_moments).collect()
    };

    let (mean, var): (Vec<f32>, Vec<f32>) = stats.into_iter().unzip();
    Ok((
        Array1::from(mean).into_dyn(),
        Array1::from(var).into_dyn(),
    ))
}

fn column_moments(column: ArrayView1<f32>) -> (f32, f32) {
    let n = column.len() as f32;
    let mean = column.sum() / n;
    let var = column.iter().map(|&v| (v - mean) * (v - mean)).sum::<f32>() / n;
    (mean, var)
}
