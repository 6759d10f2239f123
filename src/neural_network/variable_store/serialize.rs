use super::*;
use crate::IoError;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;

/// Serializable representation of a single float variable.
///
/// # Fields
///
/// - `scope` - Scope that owns the variable
/// - `name` - Name of the variable inside its scope
/// - `shape` - Shape of the variable
/// - `data` - Elements in row-major order
/// - `trainable` - Update intent of the variable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializableVariable {
    pub scope: String,
    pub name: String,
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
    pub trainable: bool,
}

/// Serializable representation of an integer counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializableCounter {
    pub scope: String,
    pub name: String,
    pub value: i64,
}

/// Serializable snapshot of a whole [`VariableStore`].
///
/// Entries are sorted by scope and name so that equal stores produce equal snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializableVariableStore {
    pub variables: Vec<SerializableVariable>,
    pub counters: Vec<SerializableCounter>,
}

impl SerializableVariableStore {
    /// Captures every variable and counter of a store.
    pub fn from_store(store: &VariableStore) -> Self {
        let variables = store
            .variable_keys()
            .into_iter()
            .filter_map(|key| {
                store
                    .variables
                    .get(key)
                    .map(|v| SerializableVariable {
                        scope: key.scope.clone(),
                        name: key.name.clone(),
                        shape: v.value.shape().to_vec(),
                        data: v.value.iter().copied().collect(),
                        trainable: v.trainable,
                    })
            })
            .collect();

        let mut counters: Vec<_> = store
            .counters
            .iter()
            .map(|(key, &value)| SerializableCounter {
                scope: key.scope.clone(),
                name: key.name.clone(),
                value,
            })
            .collect();
        counters.sort_by(|a, b| (&a.scope, &a.name).cmp(&(&b.scope, &b.name)));

        Self {
            variables,
            counters,
        }
    }

    /// Rebuilds the variables and counters of this snapshot into `store`.
    ///
    /// Existing entries with the same keys are replaced; other entries are left untouched.
    ///
    /// # Returns
    ///
    /// - `Ok(())` - If every entry was restored
    /// - `Err(ModelError::ProcessingError)` - If an entry's data does not fit its shape
    pub fn restore_into(&self, store: &mut VariableStore) -> Result<(), ModelError> {
        for v in &self.variables {
            let value = Tensor::from_shape_vec(v.shape.clone(), v.data.clone())?;
            store.variables.insert(
                VariableKey::new(&v.scope, &v.name),
                Variable {
                    value,
                    trainable: v.trainable,
                },
            );
        }
        for c in &self.counters {
            store.set_counter(&c.scope, &c.name, c.value);
        }
        Ok(())
    }
}

impl VariableStore {
    /// Serializes every variable and counter of the store to a JSON string.
    ///
    /// The random number generator state is not part of the snapshot.
    pub fn to_json(&self) -> Result<String, IoError> {
        serde_json::to_string(&SerializableVariableStore::from_store(self))
            .map_err(IoError::JsonError)
    }

    /// Builds a new store from a JSON snapshot produced by [`VariableStore::to_json`].
    ///
    /// The restored store seeds its random initializers from the operating system.
    pub fn from_json(json: &str) -> Result<Self, IoError> {
        let snapshot: SerializableVariableStore =
            serde_json::from_str(json).map_err(IoError::JsonError)?;
        let mut store = VariableStore::new();
        snapshot.restore_into(&mut store)?;
        Ok(store)
    }

    /// Writes a JSON snapshot of the store to `path`.
    ///
    /// # Parameters
    ///
    /// * `path` - Destination file, created or truncated
    ///
    /// # Returns
    ///
    /// - `Ok(())` - If the snapshot was written
    /// - `Err(IoError)` - If the file could not be written or serialization failed
    pub fn save_to_path(&self, path: &str) -> Result<(), IoError> {
        let file = File::create(path).map_err(IoError::StdIoError)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, &SerializableVariableStore::from_store(self))
            .map_err(IoError::JsonError)
    }

    /// Reads a JSON snapshot written by [`VariableStore::save_to_path`].
    ///
    /// # Parameters
    ///
    /// * `path` - Snapshot file to read
    ///
    /// # Returns
    ///
    /// - `Ok(VariableStore)` - The restored store
    /// - `Err(IoError)` - If the file could not be read or does not describe a valid store
    pub fn load_from_path(path: &str) -> Result<Self, IoError> {
        let reader = IoError::load_in_buf_reader(path)?;
        let snapshot: SerializableVariableStore =
            serde_json::from_reader(reader).map_err(IoError::JsonError)?;
        let mut store = VariableStore::new();
        snapshot.restore_into(&mut store)?;
        Ok(store)
    }
}
