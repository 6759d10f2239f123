pub use crate::error::{IoError, ModelError};
pub use crate::neural_network::Tensor;
pub use crate::neural_network::activation::Activation;
pub use crate::neural_network::layer::normalization_layer::*;
pub use crate::neural_network::layer::recurrent_layer::*;
pub use crate::neural_network::variable_store::*;
pub use crate::traits::RecurrentCell;
