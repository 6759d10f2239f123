/// Module that contains the activation functions applied to the inner states of a cell
pub mod activation;
/// Module that contains the cell and normalization implementations
pub mod layer;
/// Module that contains the explicit variable registry shared by cells and normalization helpers
pub mod variable_store;

pub use activation::*;
pub use layer::*;
pub use variable_store::*;

use ndarray::ArrayD;

/// Type alias for n-dimensional arrays used as tensors throughout the crate
pub type Tensor = ArrayD<f32>;

pub use crate::traits::RecurrentCell;
