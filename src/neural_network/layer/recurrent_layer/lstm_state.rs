use super::*;

/// Widths of the two halves of an LSTM state.
///
/// # Fields
///
/// - `c` - Width of the cell memory, always `num_units`
/// - `h` - Width of the output state, `num_proj` when the cell projects its output, `num_units` otherwise
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateSize {
    pub c: usize,
    pub h: usize,
}

/// The `(c, h)` state pair carried from one LSTM step to the next.
///
/// A step never mutates the state it receives; it returns a new pair which the caller
/// supplies to the next step.
///
/// # Fields
///
/// - `c` - Cell memory with shape `[batch, num_units]`
/// - `h` - Output state with shape `[batch, num_proj]` (or `[batch, num_units]` without projection)
#[derive(Debug, Clone, PartialEq)]
pub struct LSTMStateTuple {
    pub c: Tensor,
    pub h: Tensor,
}

impl LSTMStateTuple {
    pub fn new(c: Tensor, h: Tensor) -> Self {
        Self { c, h }
    }

    /// Number of rows of the cell memory
    pub fn batch_size(&self) -> usize {
        self.c.shape().first().copied().unwrap_or(0)
    }

    /// Consumes the state and returns `(c, h)`.
    pub fn into_parts(self) -> (Tensor, Tensor) {
        (self.c, self.h)
    }
}

impl From<(Tensor, Tensor)> for LSTMStateTuple {
    fn from((c, h): (Tensor, Tensor)) -> Self {
        Self { c, h }
    }
}
