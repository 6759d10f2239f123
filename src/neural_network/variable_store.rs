use crate::ModelError;
use crate::neural_network::Tensor;
use ahash::AHashMap;
use ndarray::{Axis, concatenate};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::debug;

/// Initializers used to fill newly created variables
pub mod initializer;
/// JSON snapshots of a variable store
pub mod serialize;
/// Row sharding of large variables
pub mod sharding;

pub use initializer::Initializer;
pub use serialize::*;
pub use sharding::*;

/// Identifies a variable by the scope that owns it and its name inside that scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariableKey {
    pub scope: String,
    pub name: String,
}

impl VariableKey {
    pub fn new(scope: &str, name: &str) -> Self {
        Self {
            scope: scope.to_string(),
            name: name.to_string(),
        }
    }
}

impl std::fmt::Display for VariableKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.scope, self.name)
    }
}

/// A stored variable together with its update intent.
///
/// # Fields
///
/// - `value` - Current value of the variable
/// - `trainable` - Whether an optimizer is expected to update this variable; frozen
///   variables (running statistics, a non-shifting beta) are only changed by the code that owns them
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub value: Tensor,
    pub trainable: bool,
}

/// Explicit registry of named parameters shared by cells and normalization helpers.
///
/// Variables are created on first request with the supplied shape and initializer and
/// returned unchanged on every later request. Integer counters live next to the float
/// variables under the same `(scope, name)` keying.
///
/// # Fields
///
/// - `variables` - Float variables keyed by `(scope, name)`
/// - `counters` - Integer counters keyed by `(scope, name)`
/// - `rng` - Random number generator used by the random initializers
///
/// # Example
/// ```rust
/// use bnlstm::neural_network::*;
///
/// let mut store = VariableStore::with_seed(7);
/// let w = store
///     .get_or_create("dense", "kernel", &[3, 4], Initializer::GlorotUniform, true)
///     .unwrap();
/// assert_eq!(w.shape(), &[3, 4]);
///
/// // The second request returns the stored value instead of creating a new one
/// let again = store
///     .get_or_create("dense", "kernel", &[3, 4], Initializer::Zeros, true)
///     .unwrap();
/// assert_eq!(w, again);
/// ```
#[derive(Debug, Clone)]
pub struct VariableStore {
    variables: AHashMap<VariableKey, Variable>,
    counters: AHashMap<VariableKey, i64>,
    rng: StdRng,
}

impl Default for VariableStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VariableStore {
    /// Creates an empty store whose random initializers are seeded from the operating system.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Creates an empty store whose random initializers are seeded deterministically.
    ///
    /// # Parameters
    ///
    /// * `seed` - Seed for the random number generator
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            variables: AHashMap::new(),
            counters: AHashMap::new(),
            rng,
        }
    }

    /// Returns the variable stored under `(scope, name)`, creating it first if needed.
    ///
    /// # Parameters
    ///
    /// - `scope` - Scope that owns the variable
    /// - `name` - Name of the variable inside the scope
    /// - `shape` - Expected shape of the variable
    /// - `initializer` - Initializer used if the variable does not exist yet
    /// - `trainable` - Update intent recorded when the variable is created
    ///
    /// # Returns
    ///
    /// - `Ok(Tensor)` - A copy of the variable value
    /// - `Err(ModelError::InputValidationError)` - If the variable exists with a different
    ///   shape or `shape` contains a zero dimension
    pub fn get_or_create(
        &mut self,
        scope: &str,
        name: &str,
        shape: &[usize],
        initializer: Initializer,
        trainable: bool,
    ) -> Result<Tensor, ModelError> {
        let key = VariableKey::new(scope, name);

        if let Some(variable) = self.variables.get(&key) {
            if variable.value.shape() != shape {
                return Err(ModelError::InputValidationError(format!(
                    "variable {} has shape {:?}, but shape {:?} was requested",
                    key,
                    variable.value.shape(),
                    shape
                )));
            }
            return Ok(variable.value.clone());
        }

        if shape.contains(&0) {
            return Err(ModelError::InputValidationError(format!(
                "cannot create variable {} with zero sized shape {:?}",
                key, shape
            )));
        }

        let value = initializer.initialize(shape, &mut self.rng)?;
        debug!(
            variable = %key,
            ?shape,
            ?initializer,
            trainable,
            "created variable"
        );
        self.variables.insert(
            key,
            Variable {
                value: value.clone(),
                trainable,
            },
        );
        Ok(value)
    }

    /// Returns a variable stored as `num_shards` row shards, concatenated along dimension 0.
    ///
    /// The shards are stored as `name_0 .. name_{num_shards - 1}` and each one is created
    /// independently with `initializer` on first use. See [`shard_row_counts`] for the split.
    ///
    /// # Parameters
    ///
    /// - `scope` - Scope that owns the variable
    /// - `name` - Base name of the sharded variable
    /// - `shape` - Shape of the full (concatenated) variable
    /// - `num_shards` - Number of shards
    /// - `initializer` - Initializer used for shards that do not exist yet
    ///
    /// # Returns
    ///
    /// - `Ok(Tensor)` - The concatenated variable with shape `shape`
    /// - `Err(ModelError)` - If the shard count is invalid or a stored shard has the wrong shape
    pub fn get_sharded(
        &mut self,
        scope: &str,
        name: &str,
        shape: &[usize],
        num_shards: usize,
        initializer: Initializer,
    ) -> Result<Tensor, ModelError> {
        let shapes = shard_shapes(shape, num_shards)?;

        let mut shards = Vec::with_capacity(shapes.len());
        for (i, shard_shape) in shapes.iter().enumerate() {
            shards.push(self.get_or_create(
                scope,
                &shard_name(name, i),
                shard_shape,
                initializer,
                true,
            )?);
        }

        if shards.len() == 1 {
            return Ok(shards.swap_remove(0));
        }

        let views: Vec<_> = shards.iter().map(|s| s.view()).collect();
        Ok(concatenate(Axis(0), &views)?)
    }

    /// Overwrites the value of an existing variable.
    ///
    /// # Parameters
    ///
    /// - `scope` - Scope that owns the variable
    /// - `name` - Name of the variable
    /// - `value` - New value, must have the stored shape
    ///
    /// # Returns
    ///
    /// - `Ok(())` - If the value was replaced
    /// - `Err(ModelError::InputValidationError)` - If the variable does not exist or the shape differs
    pub fn assign(&mut self, scope: &str, name: &str, value: Tensor) -> Result<(), ModelError> {
        let key = VariableKey::new(scope, name);
        let variable = self.variables.get_mut(&key).ok_or_else(|| {
            ModelError::InputValidationError(format!("variable {} does not exist", key))
        })?;

        if variable.value.shape() != value.shape() {
            return Err(ModelError::InputValidationError(format!(
                "cannot assign shape {:?} to variable {} with shape {:?}",
                value.shape(),
                key,
                variable.value.shape()
            )));
        }

        variable.value = value;
        Ok(())
    }

    /// Overwrites a sharded variable from its full (concatenated) value.
    ///
    /// # Parameters
    ///
    /// - `scope` - Scope that owns the variable
    /// - `name` - Base name of the sharded variable
    /// - `num_shards` - Number of shards the variable is stored in
    /// - `value` - Full value, split along dimension 0 into the stored shards
    ///
    /// # Returns
    ///
    /// - `Ok(())` - If every shard was replaced
    /// - `Err(ModelError)` - If the shards do not exist or do not match the value
    pub fn assign_sharded(
        &mut self,
        scope: &str,
        name: &str,
        num_shards: usize,
        value: &Tensor,
    ) -> Result<(), ModelError> {
        let counts = shard_row_counts(value.shape().first().copied().unwrap_or(0), num_shards)?;

        let mut start = 0;
        for (i, rows) in counts.into_iter().enumerate() {
            let shard = value
                .slice_axis(Axis(0), (start..start + rows).into())
                .to_owned();
            self.assign(scope, &shard_name(name, i), shard)?;
            start += rows;
        }
        Ok(())
    }

    /// Returns a reference to a variable value if it exists.
    pub fn get(&self, scope: &str, name: &str) -> Option<&Tensor> {
        self.variables
            .get(&VariableKey::new(scope, name))
            .map(|v| &v.value)
    }

    /// Returns the stored variable, including its trainable flag, if it exists.
    pub fn variable(&self, scope: &str, name: &str) -> Option<&Variable> {
        self.variables.get(&VariableKey::new(scope, name))
    }

    pub fn contains(&self, scope: &str, name: &str) -> bool {
        self.variables.contains_key(&VariableKey::new(scope, name))
    }

    /// Number of float variables (each shard counts separately)
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty() && self.counters.is_empty()
    }

    /// Returns the integer counter stored under `(scope, name)`, creating it at 0 if needed.
    pub fn counter(&mut self, scope: &str, name: &str) -> i64 {
        *self
            .counters
            .entry(VariableKey::new(scope, name))
            .or_insert(0)
    }

    /// Sets the integer counter stored under `(scope, name)`.
    pub fn set_counter(&mut self, scope: &str, name: &str, value: i64) {
        self.counters.insert(VariableKey::new(scope, name), value);
    }

    /// Returns the keys of all float variables, sorted by scope and name.
    pub fn variable_keys(&self) -> Vec<&VariableKey> {
        let mut keys: Vec<_> = self.variables.keys().collect();
        keys.sort();
        keys
    }

    /// Returns all trainable variables, sorted by scope and name.
    ///
    /// # Returns
    ///
    /// * `Vec<(&VariableKey, &Tensor)>` - Key and value of every variable created with `trainable = true`
    pub fn trainable_variables(&self) -> Vec<(&VariableKey, &Tensor)> {
        let mut trainable: Vec<_> = self
            .variables
            .iter()
            .filter(|(_, v)| v.trainable)
            .map(|(k, v)| (k, &v.value))
            .collect();
        trainable.sort_by(|a, b| a.0.cmp(b.0));
        trainable
    }

    /// Total number of trainable scalars across all trainable variables
    pub fn trainable_param_count(&self) -> usize {
        self.variables
            .values()
            .filter(|v| v.trainable)
            .map(|v| v.value.len())
            .sum()
    }
}
