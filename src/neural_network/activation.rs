use ndarray::{Array, Dimension};

/// Tensors with at least this many elements are activated in parallel
const ACTIVATION_PARALLEL_THRESHOLD: usize = 2048;

/// Max input clipping value to prevent overflow in exponential based activations
const INPUT_CLIP_MAX: f32 = 500.0;

/// Activation function applied to the candidate values and the cell state of a cell
///
/// `Tanh` is the default, matching the classic LSTM formulation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Activation {
    #[default]
    Tanh,
    Sigmoid,
    ReLU,
    Linear,
}

impl Activation {
    /// Applies the activation function element-wise
    ///
    /// # Parameters
    ///
    /// * `z` - Input array to apply the activation function to
    ///
    /// # Returns
    ///
    /// * `Array<f32, D>` - A new array of the same shape with the activation applied
    pub fn apply<D: Dimension>(&self, z: &Array<f32, D>) -> Array<f32, D> {
        let f: fn(f32) -> f32 = match self {
            Activation::Tanh => |x| x.clamp(-INPUT_CLIP_MAX, INPUT_CLIP_MAX).tanh(),
            Activation::Sigmoid => sigmoid,
            Activation::ReLU => |x| if x > 0.0 { x } else { 0.0 },
            Activation::Linear => |x| x,
        };

        let mut result = z.clone();
        if result.len() >= ACTIVATION_PARALLEL_THRESHOLD {
            result.par_mapv_inplace(f);
        } else {
            result.mapv_inplace(f);
        }
        result
    }

    /// Returns the lowercase name of the activation function
    pub fn name(&self) -> &'static str {
        match self {
            Activation::Tanh => "tanh",
            Activation::Sigmoid => "sigmoid",
            Activation::ReLU => "relu",
            Activation::Linear => "linear",
        }
    }
}

/// Numerically stable scalar sigmoid
///
/// The input is clipped before exponentiation so that very negative values do not overflow.
#[inline]
pub fn sigmoid(x: f32) -> f32 {
    let clipped_x = x.clamp(-INPUT_CLIP_MAX, INPUT_CLIP_MAX);
    1.0 / (1.0 + (-clipped_x).exp())
}
