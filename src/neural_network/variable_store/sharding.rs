use super::*;

/// Splits `rows` into `num_shards` contiguous row counts.
///
/// Every shard gets `rows / num_shards` rows and the first `rows % num_shards` shards get one
/// extra row, so shard sizes never differ by more than one.
///
/// # Parameters
///
/// - `rows` - Size of dimension 0 of the full variable
/// - `num_shards` - Number of shards to split the variable into
///
/// # Returns
///
/// - `Ok(Vec<usize>)` - Row count of each shard, summing to `rows`
/// - `Err(ModelError::InputValidationError)` - If `num_shards` is 0 or larger than `rows`
pub fn shard_row_counts(rows: usize, num_shards: usize) -> Result<Vec<usize>, ModelError> {
    if num_shards == 0 {
        return Err(ModelError::InputValidationError(
            "num_shards must be greater than 0".to_string(),
        ));
    }
    if num_shards > rows {
        return Err(ModelError::InputValidationError(format!(
            "cannot split {} rows into {} shards",
            rows, num_shards
        )));
    }

    let unit_shard_size = rows / num_shards;
    let remaining_rows = rows % num_shards;

    Ok((0..num_shards)
        .map(|i| {
            if i < remaining_rows {
                unit_shard_size + 1
            } else {
                unit_shard_size
            }
        })
        .collect())
}

/// Returns the full shapes of each shard of a variable split along dimension 0.
///
/// # Parameters
///
/// - `shape` - Shape of the full variable, must have at least one dimension
/// - `num_shards` - Number of shards
///
/// # Returns
///
/// - `Ok(Vec<Vec<usize>>)` - One shape per shard
/// - `Err(ModelError::InputValidationError)` - If the shape is a scalar or the shard count is invalid
pub fn shard_shapes(shape: &[usize], num_shards: usize) -> Result<Vec<Vec<usize>>, ModelError> {
    let (&rows, rest) = shape.split_first().ok_or_else(|| {
        ModelError::InputValidationError("cannot shard a scalar variable".to_string())
    })?;

    Ok(shard_row_counts(rows, num_shards)?
        .into_iter()
        .map(|shard_rows| {
            let mut shard_shape = Vec::with_capacity(shape.len());
            shard_shape.push(shard_rows);
            shard_shape.extend_from_slice(rest);
            shard_shape
        })
        .collect())
}

/// Name under which shard `index` of variable `name` is stored
#[inline]
pub fn shard_name(name: &str, index: usize) -> String {
    format!("{}_{}", name, index)
}
