use crate::ModelError;
use crate::neural_network::Tensor;
use crate::neural_network::layer::recurrent_layer::{LSTMStateTuple, LSTMStepOutput, StateSize};
use crate::neural_network::variable_store::VariableStore;

/// Defines the interface for recurrent cells that carry a `(c, h)` state pair.
///
/// A cell does not own its parameters. Every call to [`RecurrentCell::step`] receives the
/// variable store explicitly, and the cell creates its variables there on first use and
/// looks them up on every later call.
pub trait RecurrentCell {
    /// Returns the widths of the cell state and the output state.
    ///
    /// # Returns
    ///
    /// * `StateSize` - `c` is the width of the cell memory, `h` the width of the output state
    fn state_size(&self) -> StateSize;

    /// Returns the width of the output produced by one step.
    ///
    /// # Returns
    ///
    /// * `usize` - The output width (the projection width when the cell projects its output)
    fn output_size(&self) -> usize;

    /// Builds an all-zero state for the given batch size.
    ///
    /// # Parameters
    ///
    /// * `batch_size` - Number of rows in the state tensors
    ///
    /// # Returns
    ///
    /// * `LSTMStateTuple` - Zero-filled `c` of shape `[batch_size, state_size().c]` and
    ///   `h` of shape `[batch_size, state_size().h]`
    fn zero_state(&self, batch_size: usize) -> LSTMStateTuple {
        let size = self.state_size();
        LSTMStateTuple::new(
            Tensor::zeros(vec![batch_size, size.c]),
            Tensor::zeros(vec![batch_size, size.h]),
        )
    }

    /// Runs one step of the cell.
    ///
    /// # Parameters
    ///
    /// - `store` - Variable store holding (or receiving) the cell parameters
    /// - `input` - Input batch with shape `[batch, input_size]`
    /// - `state` - Previous `(c, h)` state pair
    ///
    /// # Returns
    ///
    /// - `Ok(LSTMStepOutput)` - The new output, the new state and, if requested, the gate pre-activations
    /// - `Err(ModelError)` - If the input width cannot be inferred or the shapes are inconsistent
    fn step(
        &self,
        store: &mut VariableStore,
        input: &Tensor,
        state: &LSTMStateTuple,
    ) -> Result<LSTMStepOutput, ModelError>;
}
