use super::*;
use crate::neural_network::activation::sigmoid;
use ndarray::{Array, Dimension};

/// Threshold for using parallel computation in recurrent cells.
/// When batch_size * units < this value, sequential execution is used.
const RECURRENT_PARALLEL_THRESHOLD: usize = 1024;

/// Applies stable sigmoid activation to an array
///
/// Uses clipping to prevent numerical overflow before computing sigmoid.
#[inline]
fn apply_sigmoid<D: Dimension>(arr: Array<f32, D>) -> Array<f32, D> {
    arr.mapv_into(sigmoid)
}

/// Gate pre-activations and their computation
pub mod gate;
/// Input validation functions for recurrent cells
mod input_validation_function;
/// A customized LSTM cell with peepholes, projection, sharding and batch normalization
pub mod lstm_cell;
/// State and output types threaded through LSTM steps
pub mod lstm_state;
/// Runs a recurrent cell over a whole sequence
pub mod unroll;

pub use gate::*;
pub use lstm_cell::*;
pub use lstm_state::*;
pub use unroll::*;
