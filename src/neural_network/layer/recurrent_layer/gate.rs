use super::*;
use ndarray::{Array1, Array2, ArrayView2, Axis, concatenate, s};

/// Number of gates packed into one LSTM pre-activation matrix
pub const NUM_GATES: usize = 4;

/// Raw gate pre-activations of one LSTM step.
///
/// The values are taken straight from the split of the pre-activation matrix, before any
/// peephole term, forget bias or activation is applied.
///
/// # Fields
///
/// - `i` - Input gate pre-activation with shape `[batch, num_units]`
/// - `j` - Candidate (new input) pre-activation with shape `[batch, num_units]`
/// - `f` - Forget gate pre-activation with shape `[batch, num_units]`
/// - `o` - Output gate pre-activation with shape `[batch, num_units]`
#[derive(Debug, Clone, PartialEq)]
pub struct GateValues {
    pub i: Tensor,
    pub j: Tensor,
    pub f: Tensor,
    pub o: Tensor,
}

/// Splits a `[batch, 4 * num_units]` pre-activation matrix into its four gate slices.
///
/// The slices are laid out as input gate, candidate, forget gate, output gate.
///
/// # Parameters
///
/// - `lstm_matrix` - Pre-activation matrix with shape `[batch, 4 * num_units]`
/// - `num_units` - Width of each gate slice
///
/// # Returns
///
/// - `Ok((i, j, f, o))` - The four slices, each with shape `[batch, num_units]`
/// - `Err(ModelError::InputValidationError)` - If the matrix width is not `4 * num_units`
pub fn split_gates(
    lstm_matrix: &Array2<f32>,
    num_units: usize,
) -> Result<(Array2<f32>, Array2<f32>, Array2<f32>, Array2<f32>), ModelError> {
    if lstm_matrix.ncols() != NUM_GATES * num_units {
        return Err(ModelError::InputValidationError(format!(
            "gate matrix has {} columns, expected {}",
            lstm_matrix.ncols(),
            NUM_GATES * num_units
        )));
    }

    let slice = |k: usize| {
        lstm_matrix
            .slice(s![.., k * num_units..(k + 1) * num_units])
            .to_owned()
    };
    Ok((slice(0), slice(1), slice(2), slice(3)))
}

/// Computes `[inputs, m_prev] @ kernel + bias` in a single matrix product.
///
/// # Parameters
///
/// - `inputs` - Input batch with shape `[batch, input_size]`
/// - `m_prev` - Previous output state with shape `[batch, num_proj]`
/// - `kernel` - Combined weight matrix with shape `[input_size + num_proj, 4 * num_units]`
/// - `bias` - Bias vector with shape `[4 * num_units]`
///
/// # Returns
///
/// - `Ok(Array2<f32>)` - Pre-activation matrix with shape `[batch, 4 * num_units]`
/// - `Err(ModelError)` - If the batch sizes of `inputs` and `m_prev` differ
pub fn compute_gate_matrix<'a>(
    inputs: ArrayView2<'a, f32>,
    m_prev: ArrayView2<'a, f32>,
    kernel: &Array2<f32>,
    bias: &Array1<f32>,
) -> Result<Array2<f32>, ModelError> {
    let cell_inputs = concatenate(Axis(1), &[inputs, m_prev])?;
    Ok(cell_inputs.dot(kernel) + bias)
}

/// Computes `inputs @ input_kernel` and `m_prev @ recurrent_kernel` as two separate products.
///
/// The two products are independent; above the parallel threshold they run on the rayon
/// thread pool.
///
/// # Returns
///
/// * `(Array2<f32>, Array2<f32>)` - The input and recurrent contributions, each `[batch, 4 * num_units]`
pub fn compute_split_gate_matrices(
    inputs: ArrayView2<f32>,
    m_prev: ArrayView2<f32>,
    input_kernel: &Array2<f32>,
    recurrent_kernel: &Array2<f32>,
) -> (Array2<f32>, Array2<f32>) {
    if inputs.nrows() * input_kernel.ncols() >= RECURRENT_PARALLEL_THRESHOLD {
        rayon::join(
            || inputs.dot(input_kernel),
            || m_prev.dot(recurrent_kernel),
        )
    } else {
        (inputs.dot(input_kernel), m_prev.dot(recurrent_kernel))
    }
}
