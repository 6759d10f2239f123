use super::*;

/// Sequence-wise batch normalization with running statistics kept in a variable store
pub mod batch_norm;
/// Input validation functions for normalization helpers
mod input_validation_function;

pub use batch_norm::*;
