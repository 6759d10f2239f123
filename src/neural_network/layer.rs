/// Normalization helpers applied inside recurrent cells
pub mod normalization_layer;
/// Recurrent cells and the helpers to run them over sequences
pub mod recurrent_layer;

pub use normalization_layer::*;
pub use recurrent_layer::*;

use crate::ModelError;
use crate::neural_network::Tensor;
use crate::neural_network::variable_store::{Initializer, VariableStore};
