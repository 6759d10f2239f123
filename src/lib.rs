/// Error types shared by every module of the crate
pub mod error;

pub use error::{IoError, ModelError};

/// Traits implemented by the recurrent cells of this crate
pub mod traits;

/// Module `neural_network` provides a customized LSTM cell together with the
/// pieces it is built from.
///
/// # Components
///
/// ## Variable Store
/// - **VariableStore**: Explicit registry of named parameters keyed by `(scope, name)`
/// - **Initializer**: Zeros, ones, constant, uniform, normal and Glorot uniform initializers
/// - **Sharding**: Large matrices can be stored as row shards and concatenated on read
///
/// ## Layers
/// - **LSTMCell**: A single LSTM step with optional peephole connections, cell clipping,
///   output projection and sequence-wise batch normalization
/// - **batch_norm**: Per-feature running mean/variance normalization with a train/eval switch
/// - **unroll**: Runs any recurrent cell over a `[batch, time, features]` sequence
///
/// # Examples
/// ```rust
/// use bnlstm::neural_network::*;
/// use ndarray::Array2;
///
/// let mut store = VariableStore::with_seed(42);
/// let cell = LSTMCellConfig::new(8)
///     .use_peepholes(true)
///     .num_proj(4)
///     .build()
///     .unwrap();
///
/// let x = Array2::<f32>::ones((2, 3)).into_dyn();
/// let state = cell.zero_state(2);
/// let step = cell.step(&mut store, &x, &state).unwrap();
///
/// assert_eq!(step.output.shape(), &[2, 4]);
/// assert_eq!(step.state.c.shape(), &[2, 8]);
/// ```
pub mod neural_network;

/// Convenience re-exports of the commonly used types.
///
/// # Examples
/// ```rust
/// use bnlstm::prelude::*;
///
/// let cell = LSTMCellConfig::new(4).build().unwrap();
/// assert_eq!(cell.output_size(), 4);
/// ```
pub mod prelude;
