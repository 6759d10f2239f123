use super::*;

/// Validates that a rate parameter is between 0.0 and 1.0 (inclusive)
pub(super) fn validate_rate(rate: f32, param_name: &str) -> Result<(), ModelError> {
    if !(0.0..=1.0).contains(&rate) {
        return Err(ModelError::InputValidationError(format!(
            "{} must be between 0 and 1, got {}",
            param_name, rate
        )));
    }
    Ok(())
}

/// Validates that a tensor has a non-empty feature axis and at least one row
///
/// # Returns
///
/// - `Ok(usize)` - The feature width (size of the last axis)
/// - `Err(ModelError::InputValidationError)` - If the tensor is a scalar or empty
pub(super) fn validate_feature_axis(input: &Tensor, layer_name: &str) -> Result<usize, ModelError> {
    let feat_dim = match input.shape().last() {
        Some(&d) if d > 0 => d,
        _ => {
            return Err(ModelError::InputValidationError(format!(
                "{} expects an input with a non-empty last axis, got shape {:?}",
                layer_name,
                input.shape()
            )));
        }
    };

    if input.is_empty() {
        return Err(ModelError::InputValidationError(format!(
            "{} received an empty input with shape {:?}",
            layer_name,
            input.shape()
        )));
    }
    Ok(feat_dim)
}
