use super::input_validation_function::*;
use super::*;
use crate::neural_network::activation::Activation;
use crate::neural_network::layer::normalization_layer::SequenceBatchNorm;
use crate::neural_network::variable_store::shard_row_counts;
use crate::traits::RecurrentCell;
use ndarray::{Array1, Array2, Ix1, Ix2};
use tracing::trace;

/// Scope used for the cell variables when none is configured.
///
/// The batch normalizations live in the child scopes `LSTMCell/bn_i`, `LSTMCell/bn_r` and
/// `LSTMCell/bn_m`, separated from the cell scope by a `/`.
pub const DEFAULT_LSTM_SCOPE: &str = "LSTMCell";

/// Configuration of an [`LSTMCell`].
///
/// Built with [`LSTMCellConfig::new`] and the chained setters, then turned into a cell with
/// [`LSTMCellConfig::build`], which validates it.
///
/// # Fields
///
/// - `num_units` - Number of units in the cell (width of the cell memory)
/// - `use_peepholes` - Enables diagonal connections from the cell memory to the gates
/// - `cell_clip` - If set, the cell memory is clipped to `[-cell_clip, cell_clip]`
/// - `initializer` - Initializer for the weight, peephole and projection matrices
///   (Glorot uniform when unset); the bias is always initialized to zeros
/// - `num_proj` - If set, the output is projected to this width
/// - `num_unit_shards` - Number of row shards the gate weight matrices are stored in
/// - `num_proj_shards` - Number of row shards the projection matrix is stored in
/// - `forget_bias` - Constant added to the forget gate pre-activation
/// - `bn` - Enables sequence-wise batch normalization of the gate pre-activations and the cell memory
/// - `return_gate` - Makes each step also return the raw gate pre-activations
/// - `deterministic` - Evaluation mode for the batch normalization (running statistics frozen)
/// - `activation` - Activation applied to the candidate values and the cell memory
/// - `scope` - Scope under which the cell variables are stored
#[derive(Debug, Clone, PartialEq)]
pub struct LSTMCellConfig {
    num_units: usize,
    use_peepholes: bool,
    cell_clip: Option<f32>,
    initializer: Option<Initializer>,
    num_proj: Option<usize>,
    num_unit_shards: usize,
    num_proj_shards: usize,
    forget_bias: f32,
    bn: bool,
    return_gate: bool,
    deterministic: bool,
    activation: Activation,
    scope: String,
}

impl LSTMCellConfig {
    /// Creates a configuration for a plain LSTM cell with `num_units` units.
    ///
    /// Defaults: no peepholes, no clipping, no projection, one shard, `forget_bias = 1.0`,
    /// no batch normalization, no gate values returned, training mode, `tanh` activation,
    /// scope `"LSTMCell"`.
    pub fn new(num_units: usize) -> Self {
        Self {
            num_units,
            use_peepholes: false,
            cell_clip: None,
            initializer: None,
            num_proj: None,
            num_unit_shards: 1,
            num_proj_shards: 1,
            forget_bias: 1.0,
            bn: false,
            return_gate: false,
            deterministic: false,
            activation: Activation::Tanh,
            scope: DEFAULT_LSTM_SCOPE.to_string(),
        }
    }

    pub fn use_peepholes(mut self, use_peepholes: bool) -> Self {
        self.use_peepholes = use_peepholes;
        self
    }

    pub fn cell_clip(mut self, cell_clip: f32) -> Self {
        self.cell_clip = Some(cell_clip);
        self
    }

    pub fn initializer(mut self, initializer: Initializer) -> Self {
        self.initializer = Some(initializer);
        self
    }

    pub fn num_proj(mut self, num_proj: usize) -> Self {
        self.num_proj = Some(num_proj);
        self
    }

    pub fn num_unit_shards(mut self, num_unit_shards: usize) -> Self {
        self.num_unit_shards = num_unit_shards;
        self
    }

    pub fn num_proj_shards(mut self, num_proj_shards: usize) -> Self {
        self.num_proj_shards = num_proj_shards;
        self
    }

    pub fn forget_bias(mut self, forget_bias: f32) -> Self {
        self.forget_bias = forget_bias;
        self
    }

    /// Enables sequence-wise batch normalization
    pub fn bn(mut self, bn: bool) -> Self {
        self.bn = bn;
        self
    }

    pub fn return_gate(mut self, return_gate: bool) -> Self {
        self.return_gate = return_gate;
        self
    }

    pub fn deterministic(mut self, deterministic: bool) -> Self {
        self.deterministic = deterministic;
        self
    }

    pub fn activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    pub fn scope(mut self, scope: &str) -> Self {
        self.scope = scope.to_string();
        self
    }

    /// Validates the configuration and builds the cell.
    ///
    /// # Returns
    ///
    /// - `Ok(LSTMCell)` - The configured cell
    /// - `Err(ModelError::InputValidationError)` - If `num_units`, `num_proj` or a shard count is 0,
    ///   a shard count exceeds the rows of a matrix whose height is already known, or
    ///   `cell_clip` is negative or not finite
    pub fn build(self) -> Result<LSTMCell, ModelError> {
        validate_dimension_greater_than_zero(self.num_units, "num_units")?;
        if let Some(num_proj) = self.num_proj {
            validate_dimension_greater_than_zero(num_proj, "num_proj")?;
        }
        validate_dimension_greater_than_zero(self.num_unit_shards, "num_unit_shards")?;
        validate_dimension_greater_than_zero(self.num_proj_shards, "num_proj_shards")?;
        validate_cell_clip(self.cell_clip)?;

        let h = self.num_proj.unwrap_or(self.num_units);
        if self.num_proj.is_some() {
            validate_shard_count(self.num_proj_shards, self.num_units, "num_proj_shards")?;
        }
        if self.bn {
            // W_r has one row per output state unit
            validate_shard_count(self.num_unit_shards, h, "num_unit_shards")?;
        }
        let scope = self.scope.as_str();
        let bn_i = SequenceBatchNorm::new(&format!("{}/bn_i", scope)).with_shift(false);
        let bn_r = SequenceBatchNorm::new(&format!("{}/bn_r", scope)).with_shift(false);
        let bn_m = SequenceBatchNorm::new(&format!("{}/bn_m", scope));

        Ok(LSTMCell {
            state_size: StateSize {
                c: self.num_units,
                h,
            },
            output_size: h,
            bn_i,
            bn_r,
            bn_m,
            config: self,
        })
    }
}

/// Output of a single LSTM step.
///
/// # Fields
///
/// - `output` - New output `m` with shape `[batch, output_size]`
/// - `state` - New `(c, h)` state; `h` equals `output`
/// - `gates` - Raw gate pre-activations, present only when the cell is configured to return them
#[derive(Debug, Clone, PartialEq)]
pub struct LSTMStepOutput {
    pub output: Tensor,
    pub state: LSTMStateTuple,
    pub gates: Option<GateValues>,
}

/// A customized Long Short-Term Memory cell.
///
/// The cell performs one recurrent step per call and keeps no parameters of its own: weights
/// live in the [`VariableStore`] passed to every step, under the configured scope.
///
/// # Mathematical Operations
///
/// For one step with input `x`, previous cell memory `c_prev` and previous output `m_prev`:
/// 1. `[i, j, f, o] = [x, m_prev] @ W + B`, or with batch normalization
///    `BN_i(x @ W_i) + BN_r(m_prev @ W_r) + B`
/// 2. With peepholes, `f += w_f ⊙ c_prev` and `i += w_i ⊙ c_prev`
/// 3. `c = σ(f + forget_bias) ⊙ c_prev + σ(i) ⊙ act(j)`, optionally clipped
/// 4. With peepholes, `o += w_o ⊙ c`
/// 5. `m = σ(o) ⊙ act(c')` with `c' = BN_m(c)` under batch normalization and `c' = c` otherwise
/// 6. With projection, `m = m @ W_P`
///
/// The new state is `(c, m)`: the cell memory carried forward is never normalized.
///
/// # Variables
///
/// - `W` `[input_size + h, 4 * num_units]` (without batch normalization), sharded
/// - `W_i` `[input_size, 4 * num_units]` and `W_r` `[h, 4 * num_units]` (with batch normalization), sharded
/// - `B` `[4 * num_units]`
/// - `W_F_diag`, `W_I_diag`, `W_O_diag` `[num_units]` (with peepholes)
/// - `W_P` `[num_units, num_proj]` (with projection), sharded
///
/// # Example
/// ```rust
/// use bnlstm::neural_network::*;
/// use ndarray::Array2;
///
/// let mut store = VariableStore::with_seed(1);
/// let cell = LSTMCellConfig::new(6)
///     .bn(true)
///     .cell_clip(3.0)
///     .return_gate(true)
///     .build()
///     .unwrap();
///
/// let x = Array2::<f32>::ones((4, 5)).into_dyn();
/// let step = cell.step(&mut store, &x, &cell.zero_state(4)).unwrap();
///
/// assert_eq!(step.output.shape(), &[4, 6]);
/// assert!(step.gates.is_some());
/// assert!(step.state.c.iter().all(|v| v.abs() <= 3.0));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct LSTMCell {
    config: LSTMCellConfig,
    state_size: StateSize,
    output_size: usize,
    bn_i: SequenceBatchNorm,
    bn_r: SequenceBatchNorm,
    bn_m: SequenceBatchNorm,
}

impl LSTMCell {
    pub fn config(&self) -> &LSTMCellConfig {
        &self.config
    }

    pub fn num_units(&self) -> usize {
        self.config.num_units
    }

    pub fn num_proj(&self) -> Option<usize> {
        self.config.num_proj
    }

    pub fn scope(&self) -> &str {
        &self.config.scope
    }

    pub fn is_deterministic(&self) -> bool {
        self.config.deterministic
    }

    /// Switches the batch normalization between evaluation (`true`) and training (`false`) mode.
    pub fn set_deterministic(&mut self, deterministic: bool) {
        self.config.deterministic = deterministic;
    }

    /// Sets the training mode; equivalent to `set_deterministic(!is_training)`.
    pub fn set_training(&mut self, is_training: bool) {
        self.set_deterministic(!is_training);
    }

    fn weight_initializer(&self) -> Initializer {
        self.config.initializer.unwrap_or_default()
    }

    /// Fetches a (possibly sharded) weight matrix from the store.
    fn matrix(
        &self,
        store: &mut VariableStore,
        name: &str,
        shape: [usize; 2],
        num_shards: usize,
    ) -> Result<Array2<f32>, ModelError> {
        Ok(store
            .get_sharded(
                &self.config.scope,
                name,
                &shape,
                num_shards,
                self.weight_initializer(),
            )?
            .into_dimensionality::<Ix2>()?)
    }

    /// Fetches a vector variable from the store.
    fn vector(
        &self,
        store: &mut VariableStore,
        name: &str,
        len: usize,
        initializer: Initializer,
    ) -> Result<Array1<f32>, ModelError> {
        Ok(store
            .get_or_create(&self.config.scope, name, &[len], initializer, true)?
            .into_dimensionality::<Ix1>()?)
    }

    /// Checks every sharded matrix against its row count before anything is created.
    fn validate_shards(&self, input_size: usize) -> Result<(), ModelError> {
        let h = self.state_size.h;
        let shards = self.config.num_unit_shards;

        if self.config.bn {
            shard_row_counts(input_size, shards)?;
            shard_row_counts(h, shards)?;
        } else {
            shard_row_counts(input_size + h, shards)?;
        }
        if self.config.num_proj.is_some() {
            shard_row_counts(self.config.num_units, self.config.num_proj_shards)?;
        }
        Ok(())
    }

    /// Fetches (creating on first use) every variable one step reads.
    ///
    /// All variables are in place before any batch normalization statistic moves, so a
    /// failing lookup leaves the running statistics and counters untouched.
    fn fetch_params(
        &self,
        store: &mut VariableStore,
        input_size: usize,
    ) -> Result<CellParams, ModelError> {
        self.validate_shards(input_size)?;

        let num_units = self.config.num_units;
        let gate_width = NUM_GATES * num_units;
        let h = self.state_size.h;
        let shards = self.config.num_unit_shards;

        let kernel = if self.config.bn {
            GateKernel::Split {
                w_i: self.matrix(store, "W_i", [input_size, gate_width], shards)?,
                w_r: self.matrix(store, "W_r", [h, gate_width], shards)?,
            }
        } else {
            GateKernel::Fused(self.matrix(store, "W", [input_size + h, gate_width], shards)?)
        };
        let bias = self.vector(store, "B", gate_width, Initializer::Zeros)?;

        let peepholes = if self.config.use_peepholes {
            let init = self.weight_initializer();
            Some(Peepholes {
                w_f: self.vector(store, "W_F_diag", num_units, init)?,
                w_i: self.vector(store, "W_I_diag", num_units, init)?,
                w_o: self.vector(store, "W_O_diag", num_units, init)?,
            })
        } else {
            None
        };

        let projection = match self.config.num_proj {
            Some(num_proj) => Some(self.matrix(
                store,
                "W_P",
                [num_units, num_proj],
                self.config.num_proj_shards,
            )?),
            None => None,
        };

        Ok(CellParams {
            kernel,
            bias,
            peepholes,
            projection,
        })
    }

    /// Computes the `[batch, 4 * num_units]` gate pre-activation matrix.
    fn gate_matrix(
        &self,
        store: &mut VariableStore,
        params: &CellParams,
        inputs: &Array2<f32>,
        m_prev: &Array2<f32>,
    ) -> Result<Array2<f32>, ModelError> {
        match &params.kernel {
            GateKernel::Split { w_i, w_r } => {
                let (xw, mw) = compute_split_gate_matrices(inputs.view(), m_prev.view(), w_i, w_r);
                let deterministic = self.config.deterministic;
                let xw = self.bn_i.forward(store, &xw.into_dyn(), deterministic)?;
                let mw = self.bn_r.forward(store, &mw.into_dyn(), deterministic)?;

                Ok((xw + mw).into_dimensionality::<Ix2>()? + &params.bias)
            }
            GateKernel::Fused(w) => {
                compute_gate_matrix(inputs.view(), m_prev.view(), w, &params.bias)
            }
        }
    }

    fn run_step(
        &self,
        store: &mut VariableStore,
        input: &Tensor,
        state: &LSTMStateTuple,
    ) -> Result<LSTMStepOutput, ModelError> {
        let input_size = infer_input_size(input)?;
        let inputs = input.view().into_dimensionality::<Ix2>()?.to_owned();
        let batch = inputs.nrows();
        let num_units = self.config.num_units;

        let c_prev = validate_state_matrix(&state.c, batch, self.state_size.c, "c")?;
        let m_prev = validate_state_matrix(&state.h, batch, self.state_size.h, "h")?;

        trace!(
            scope = %self.config.scope,
            batch,
            input_size,
            peepholes = self.config.use_peepholes,
            bn = self.config.bn,
            deterministic = self.config.deterministic,
            "lstm step"
        );

        let params = self.fetch_params(store, input_size)?;
        let lstm_matrix = self.gate_matrix(store, &params, &inputs, &m_prev)?;
        let (i, j, f, o) = split_gates(&lstm_matrix, num_units)?;

        let activation = self.config.activation;
        let (f_pre, i_pre) = match &params.peepholes {
            Some(p) => (
                &f + self.config.forget_bias + &(&c_prev * &p.w_f),
                &i + &(&c_prev * &p.w_i),
            ),
            None => (&f + self.config.forget_bias, i.clone()),
        };

        let mut c = apply_sigmoid(f_pre) * &c_prev + apply_sigmoid(i_pre) * activation.apply(&j);

        if let Some(clip) = self.config.cell_clip {
            c.mapv_inplace(|v| v.clamp(-clip, clip));
        }

        let o_pre = match &params.peepholes {
            Some(p) => &o + &(&c * &p.w_o),
            None => o.clone(),
        };

        let c_out = if self.config.bn {
            self.bn_m
                .forward(store, &c.clone().into_dyn(), self.config.deterministic)?
                .into_dimensionality::<Ix2>()?
        } else {
            c.clone()
        };

        let mut m = apply_sigmoid(o_pre) * activation.apply(&c_out);

        if let Some(w_p) = &params.projection {
            m = m.dot(w_p);
        }

        let gates = self.config.return_gate.then(|| GateValues {
            i: i.into_dyn(),
            j: j.into_dyn(),
            f: f.into_dyn(),
            o: o.into_dyn(),
        });

        let output = m.into_dyn();
        Ok(LSTMStepOutput {
            output: output.clone(),
            state: LSTMStateTuple::new(c.into_dyn(), output),
            gates,
        })
    }
}

/// Gate weights in fused (`W`) or split (`W_i`, `W_r`) form
enum GateKernel {
    Fused(Array2<f32>),
    Split { w_i: Array2<f32>, w_r: Array2<f32> },
}

struct Peepholes {
    w_f: Array1<f32>,
    w_i: Array1<f32>,
    w_o: Array1<f32>,
}

/// Every variable read by one step
struct CellParams {
    kernel: GateKernel,
    bias: Array1<f32>,
    peepholes: Option<Peepholes>,
    projection: Option<Array2<f32>>,
}

impl RecurrentCell for LSTMCell {
    fn state_size(&self) -> StateSize {
        self.state_size
    }

    fn output_size(&self) -> usize {
        self.output_size
    }

    fn step(
        &self,
        store: &mut VariableStore,
        input: &Tensor,
        state: &LSTMStateTuple,
    ) -> Result<LSTMStepOutput, ModelError> {
        self.run_step(store, input, state)
    }
}
