use super::input_validation_function::*;
use super::*;
use crate::traits::RecurrentCell;
use ndarray::{Axis, stack};

/// Result of running a cell over a whole sequence.
///
/// # Fields
///
/// - `outputs` - Output of every step with shape `[batch, timesteps, output_size]`
/// - `final_state` - State after the last step
/// - `gates` - Gate pre-activations of every step, present only when every step returned them
#[derive(Debug, Clone, PartialEq)]
pub struct UnrolledOutput {
    pub outputs: Tensor,
    pub final_state: LSTMStateTuple,
    pub gates: Option<Vec<GateValues>>,
}

/// Runs `cell` over every timestep of `inputs`, threading the state from step to step.
///
/// # Parameters
///
/// - `cell` - Cell to run
/// - `store` - Variable store holding the cell parameters
/// - `inputs` - Input sequence with shape `[batch, timesteps, input_size]`
/// - `initial_state` - State before the first step; the cell's zero state when `None`
///
/// # Returns
///
/// - `Ok(UnrolledOutput)` - Stacked outputs, the final state and the collected gate values
/// - `Err(ModelError::InputValidationError)` - If `inputs` is not 3D or has no timesteps
/// - `Err(ModelError)` - Any error returned by a step
///
/// # Example
/// ```rust
/// use bnlstm::neural_network::*;
/// use ndarray::Array3;
///
/// let mut store = VariableStore::with_seed(3);
/// let cell = LSTMCellConfig::new(4).num_proj(2).build().unwrap();
///
/// // batch_size=2, timesteps=5, features=3
/// let x = Array3::<f32>::ones((2, 5, 3)).into_dyn();
/// let result = unroll(&cell, &mut store, &x, None).unwrap();
///
/// assert_eq!(result.outputs.shape(), &[2, 5, 2]);
/// assert_eq!(result.final_state.c.shape(), &[2, 4]);
/// ```
pub fn unroll<C: RecurrentCell + ?Sized>(
    cell: &C,
    store: &mut VariableStore,
    inputs: &Tensor,
    initial_state: Option<LSTMStateTuple>,
) -> Result<UnrolledOutput, ModelError> {
    validate_input_3d(inputs)?;

    let (batch, timesteps) = (inputs.shape()[0], inputs.shape()[1]);
    validate_dimension_greater_than_zero(timesteps, "timesteps")?;

    let mut state = initial_state.unwrap_or_else(|| cell.zero_state(batch));
    let mut outputs = Vec::with_capacity(timesteps);
    let mut gates = Vec::with_capacity(timesteps);

    for t in 0..timesteps {
        let x_t = inputs.index_axis(Axis(1), t).to_owned(); // (batch, input_dim)
        let step = cell.step(store, &x_t, &state)?;

        outputs.push(step.output);
        if let Some(g) = step.gates {
            gates.push(g);
        }
        state = step.state;
    }

    let views: Vec<_> = outputs.iter().map(|o| o.view()).collect();
    let outputs = stack(Axis(1), &views)?;

    Ok(UnrolledOutput {
        outputs,
        final_state: state,
        gates: (gates.len() == timesteps).then_some(gates),
    })
}
