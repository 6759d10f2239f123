use super::*;
use ndarray::{Array2, Ix2};

/// Validates that a dimension value is greater than 0
///
/// # Parameters
///
/// - `value` - The dimension value to validate
/// - `name` - The name of the dimension for error messages
///
/// # Returns
///
/// * `Ok(())` if validation passes
/// * `Err(ModelError)` if validation fails
pub(super) fn validate_dimension_greater_than_zero(
    value: usize,
    name: &str,
) -> Result<(), ModelError> {
    if value == 0 {
        return Err(ModelError::InputValidationError(format!(
            "{} must be greater than 0",
            name
        )));
    }
    Ok(())
}

/// Validates that a matrix with `rows` rows can be split into `num_shards` shards
pub(super) fn validate_shard_count(
    num_shards: usize,
    rows: usize,
    name: &str,
) -> Result<(), ModelError> {
    if num_shards > rows {
        return Err(ModelError::InputValidationError(format!(
            "{} ({}) must not exceed the {} rows of the sharded matrix",
            name, num_shards, rows
        )));
    }
    Ok(())
}

/// Validates that an optional clipping bound is finite and not negative
pub(super) fn validate_cell_clip(cell_clip: Option<f32>) -> Result<(), ModelError> {
    if let Some(clip) = cell_clip {
        if !clip.is_finite() || clip < 0.0 {
            return Err(ModelError::InputValidationError(format!(
                "cell_clip must be a finite non-negative value, got {}",
                clip
            )));
        }
    }
    Ok(())
}

/// Infers the input feature width of a step input
///
/// The input must be a rank 2 tensor `[batch, input_size]` with a known (non-zero) last axis.
///
/// # Returns
///
/// * `Ok(usize)` - The input width
/// * `Err(ModelError::ShapeInferenceError)` - If the rank is not 2 or the last axis is empty
pub(super) fn infer_input_size(input: &Tensor) -> Result<usize, ModelError> {
    if input.ndim() != 2 {
        return Err(ModelError::ShapeInferenceError(format!(
            "expected a rank 2 input [batch, input_size], got shape {:?}",
            input.shape()
        )));
    }

    match input.shape()[1] {
        0 => Err(ModelError::ShapeInferenceError(
            "could not infer input size from the last axis of the input".to_string(),
        )),
        input_size => Ok(input_size),
    }
}

/// Converts one half of a state pair to a matrix and checks its shape
///
/// # Parameters
///
/// - `tensor` - State tensor to check
/// - `batch` - Expected number of rows
/// - `width` - Expected number of columns
/// - `name` - Name of the state half for error messages
///
/// # Returns
///
/// * `Ok(Array2<f32>)` - The state as a matrix
/// * `Err(ModelError::InputValidationError)` - If the shape is not `[batch, width]`
pub(super) fn validate_state_matrix(
    tensor: &Tensor,
    batch: usize,
    width: usize,
    name: &str,
) -> Result<Array2<f32>, ModelError> {
    if tensor.shape() != [batch, width] {
        return Err(ModelError::InputValidationError(format!(
            "state {} must have shape [{}, {}], got {:?}",
            name,
            batch,
            width,
            tensor.shape()
        )));
    }
    Ok(tensor.view().into_dimensionality::<Ix2>()?.to_owned())
}

/// Validates that input tensor is 3D for sequence helpers
///
/// # Parameters
///
/// - `input` - The input tensor to validate
///
/// # Returns
///
/// * `Ok(())` if validation passes
/// * `Err(ModelError)` if validation fails
pub(super) fn validate_input_3d(input: &Tensor) -> Result<(), ModelError> {
    if input.ndim() != 3 {
        return Err(ModelError::InputValidationError(
            "input tensor is not 3D".to_string(),
        ));
    }
    Ok(())
}
