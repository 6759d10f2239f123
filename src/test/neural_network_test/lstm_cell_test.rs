use super::*;

fn zero_weight_cell(config: LSTMCellConfig) -> LSTMCell {
    config.initializer(Initializer::Zeros).build().unwrap()
}

#[test]
fn test_lstm_cell_output_shapes() {
    let mut store = VariableStore::with_seed(42);
    let cell = LSTMCellConfig::new(5).build().unwrap();
    let x = generate_input(3, 4);

    let step = cell.step(&mut store, &x, &cell.zero_state(3)).unwrap();

    assert_eq!(step.output.shape(), &[3, 5]);
    assert_eq!(step.state.c.shape(), &[3, 5]);
    assert_eq!(step.state.h, step.output);
    assert!(step.gates.is_none());
    assert_eq!(cell.state_size(), StateSize { c: 5, h: 5 });
    assert_eq!(cell.output_size(), 5);
}

#[test]
fn test_lstm_cell_projection_shapes() {
    let mut store = VariableStore::with_seed(42);
    let cell = LSTMCellConfig::new(6).num_proj(3).build().unwrap();
    let x = generate_input(2, 4);

    let state = cell.zero_state(2);
    assert_eq!(state.c.shape(), &[2, 6]);
    assert_eq!(state.h.shape(), &[2, 3]);

    let step = cell.step(&mut store, &x, &state).unwrap();
    assert_eq!(step.output.shape(), &[2, 3]);
    assert_eq!(step.state.c.shape(), &[2, 6]);
    assert_eq!(cell.output_size(), 3);

    // W covers the input and the projected output state
    assert_eq!(store.get("LSTMCell", "W_0").unwrap().shape(), &[4 + 3, 24]);
    assert_eq!(store.get("LSTMCell", "W_P_0").unwrap().shape(), &[6, 3]);
}

#[test]
fn test_lstm_cell_zero_weights_and_zero_state() {
    let mut store = VariableStore::with_seed(0);
    let cell = zero_weight_cell(LSTMCellConfig::new(3));
    let x = generate_input(2, 2);

    let step = cell.step(&mut store, &x, &cell.zero_state(2)).unwrap();

    // sigma(0) * tanh(0) vanishes everywhere
    assert!(step.output.iter().all(|&v| v == 0.0));
    assert!(step.state.c.iter().all(|&v| v == 0.0));
}

#[test]
fn test_lstm_cell_zero_weights_keep_forget_bias() {
    let mut store = VariableStore::with_seed(0);
    let cell = zero_weight_cell(LSTMCellConfig::new(2));
    let x = generate_input(1, 3);
    let state = LSTMStateTuple::new(
        Tensor::ones(IxDyn(&[1, 2])),
        Tensor::zeros(IxDyn(&[1, 2])),
    );

    let step = cell.step(&mut store, &x, &state).unwrap();

    for &c in step.state.c.iter() {
        assert_abs_diff_eq!(c, 0.7310586, epsilon = 1e-6);
    }
    for &h in step.output.iter() {
        assert_abs_diff_eq!(h, 0.3118563, epsilon = 1e-6);
    }
}

#[test]
fn test_lstm_cell_forget_peephole_reads_previous_memory() {
    let mut store = VariableStore::with_seed(0);
    let cell = zero_weight_cell(LSTMCellConfig::new(1).use_peepholes(true).forget_bias(0.0));
    let x = array![[0.5f32]].into_dyn();

    // First step creates every variable
    cell.step(&mut store, &x, &cell.zero_state(1)).unwrap();
    store
        .assign("LSTMCell", "W_F_diag", array![1.0f32].into_dyn())
        .unwrap();

    let state = LSTMStateTuple::new(array![[2.0f32]].into_dyn(), array![[0.0f32]].into_dyn());
    let step = cell.step(&mut store, &x, &state).unwrap();

    assert_abs_diff_eq!(step.state.c[[0, 0]], 1.7615942, epsilon = 1e-6);
    assert_abs_diff_eq!(step.output[[0, 0]], 0.4713404, epsilon = 1e-6);
}

#[test]
fn test_lstm_cell_output_peephole_reads_new_memory() {
    let mut store = VariableStore::with_seed(0);
    let cell = zero_weight_cell(LSTMCellConfig::new(1).use_peepholes(true).forget_bias(0.0));
    let x = array![[0.5f32]].into_dyn();

    cell.step(&mut store, &x, &cell.zero_state(1)).unwrap();
    store
        .assign("LSTMCell", "W_O_diag", array![2.0f32].into_dyn())
        .unwrap();

    let state = LSTMStateTuple::new(array![[2.0f32]].into_dyn(), array![[0.0f32]].into_dyn());
    let step = cell.step(&mut store, &x, &state).unwrap();

    // c = sigma(0) * 2 = 1, so o = 2 * c = 2
    assert_abs_diff_eq!(step.state.c[[0, 0]], 1.0, epsilon = 1e-6);
    assert_abs_diff_eq!(step.output[[0, 0]], 0.6708099, epsilon = 1e-6);
}

#[test]
fn test_lstm_cell_returns_raw_gate_values() {
    let mut store = VariableStore::with_seed(0);
    let cell = zero_weight_cell(LSTMCellConfig::new(1).return_gate(true));
    let x = array![[1.0f32]].into_dyn();

    cell.step(&mut store, &x, &cell.zero_state(1)).unwrap();
    store
        .assign(
            "LSTMCell",
            "W_0",
            array![[1.0f32, 2.0, 3.0, 4.0], [0.0, 0.0, 0.0, 0.0]].into_dyn(),
        )
        .unwrap();

    let step = cell.step(&mut store, &x, &cell.zero_state(1)).unwrap();
    let gates = step.gates.unwrap();

    assert_eq!(gates.i, array![[1.0f32]].into_dyn());
    assert_eq!(gates.j, array![[2.0f32]].into_dyn());
    // forget_bias is not part of the returned pre-activation
    assert_eq!(gates.f, array![[3.0f32]].into_dyn());
    assert_eq!(gates.o, array![[4.0f32]].into_dyn());

    assert_abs_diff_eq!(step.state.c[[0, 0]], 0.7047606, epsilon = 1e-6);
    assert_abs_diff_eq!(step.output[[0, 0]], 0.5964564, epsilon = 1e-6);
}

#[test]
fn test_lstm_cell_clips_cell_memory() {
    let mut store = VariableStore::with_seed(0);
    let cell = zero_weight_cell(LSTMCellConfig::new(2).cell_clip(0.5));
    let state = LSTMStateTuple::new(
        array![[3.0f32, -3.0]].into_dyn(),
        Tensor::zeros(IxDyn(&[1, 2])),
    );

    let step = cell.step(&mut store, &generate_input(1, 2), &state).unwrap();

    assert_eq!(step.state.c, array![[0.5f32, -0.5]].into_dyn());
}

#[test]
fn test_lstm_cell_shape_inference_failure_creates_nothing() {
    let mut store = VariableStore::with_seed(0);
    let cell = LSTMCellConfig::new(4).build().unwrap();

    let rank_one = Tensor::ones(IxDyn(&[3]));
    let result = cell.step(&mut store, &rank_one, &cell.zero_state(1));
    assert!(matches!(result, Err(ModelError::ShapeInferenceError(_))));

    let empty_width = Tensor::zeros(IxDyn(&[2, 0]));
    let result = cell.step(&mut store, &empty_width, &cell.zero_state(2));
    assert!(matches!(result, Err(ModelError::ShapeInferenceError(_))));

    assert!(store.is_empty());
}

#[test]
fn test_lstm_cell_rejects_mismatched_state() {
    let mut store = VariableStore::with_seed(0);
    let cell = LSTMCellConfig::new(4).build().unwrap();
    let x = generate_input(2, 3);

    let wrong_batch = cell.step(&mut store, &x, &cell.zero_state(3));
    assert!(matches!(wrong_batch, Err(ModelError::InputValidationError(_))));

    let wrong_width = LSTMStateTuple::new(
        Tensor::zeros(IxDyn(&[2, 4])),
        Tensor::zeros(IxDyn(&[2, 5])),
    );
    let result = cell.step(&mut store, &x, &wrong_width);
    assert!(matches!(result, Err(ModelError::InputValidationError(_))));
}

#[test]
fn test_lstm_cell_config_validation() {
    let invalid = [
        LSTMCellConfig::new(0),
        LSTMCellConfig::new(4).num_proj(0),
        LSTMCellConfig::new(4).num_unit_shards(0),
        LSTMCellConfig::new(4).num_proj_shards(0),
        LSTMCellConfig::new(4).cell_clip(-1.0),
        LSTMCellConfig::new(4).cell_clip(f32::NAN),
        // W_P has num_units rows, W_r has num_proj rows
        LSTMCellConfig::new(2).num_proj(4).num_proj_shards(3),
        LSTMCellConfig::new(4).num_proj(2).num_unit_shards(3).bn(true),
    ];

    for config in invalid {
        assert!(matches!(
            config.build(),
            Err(ModelError::InputValidationError(_))
        ));
    }
    assert!(LSTMCellConfig::new(4).cell_clip(0.0).build().is_ok());
    // Without batch normalization W also holds the input rows
    assert!(LSTMCellConfig::new(4).num_proj(2).num_unit_shards(3).build().is_ok());
}

#[test]
fn test_lstm_cell_creates_expected_variables() {
    let mut store = VariableStore::with_seed(0);
    let cell = LSTMCellConfig::new(4)
        .use_peepholes(true)
        .num_proj(3)
        .num_unit_shards(3)
        .num_proj_shards(2)
        .build()
        .unwrap();

    cell.step(&mut store, &generate_input(2, 2), &cell.zero_state(2))
        .unwrap();

    let names: Vec<String> = store.variable_keys().iter().map(|k| k.to_string()).collect();
    assert_eq!(
        names,
        vec![
            "LSTMCell/B",
            "LSTMCell/W_0",
            "LSTMCell/W_1",
            "LSTMCell/W_2",
            "LSTMCell/W_F_diag",
            "LSTMCell/W_I_diag",
            "LSTMCell/W_O_diag",
            "LSTMCell/W_P_0",
            "LSTMCell/W_P_1",
        ]
    );
    // 2 + 3 = 5 rows split into shards of 2, 2 and 1
    assert_eq!(store.get("LSTMCell", "W_0").unwrap().shape(), &[2, 16]);
    assert_eq!(store.get("LSTMCell", "W_2").unwrap().shape(), &[1, 16]);
    assert_eq!(store.get("LSTMCell", "W_P_1").unwrap().shape(), &[2, 3]);
}

#[test]
fn test_lstm_cell_rejects_more_shards_than_rows() {
    let mut store = VariableStore::with_seed(0);
    let cell = LSTMCellConfig::new(2).num_unit_shards(8).build().unwrap();

    let result = cell.step(&mut store, &generate_input(1, 3), &cell.zero_state(1));
    assert!(matches!(result, Err(ModelError::InputValidationError(_))));
    assert!(store.is_empty());
}

#[test]
fn test_lstm_cell_failed_step_leaves_statistics_untouched() {
    let mut store = VariableStore::with_seed(0);
    let cell = LSTMCellConfig::new(3)
        .num_unit_shards(2)
        .bn(true)
        .build()
        .unwrap();

    cell.step(&mut store, &generate_input(4, 2), &cell.zero_state(4))
        .unwrap();
    let mean = store.get("LSTMCell/bn_m", "mean").unwrap().clone();
    let count = store.len();

    // One input column cannot be split into two W_i shards
    let result = cell.step(&mut store, &generate_input(4, 1), &cell.zero_state(4));
    assert!(matches!(result, Err(ModelError::InputValidationError(_))));

    for scope in ["LSTMCell/bn_i", "LSTMCell/bn_r", "LSTMCell/bn_m"] {
        assert_eq!(store.counter(scope, "counter"), 1);
    }
    assert_eq!(store.get("LSTMCell/bn_m", "mean").unwrap(), &mean);
    assert_eq!(store.len(), count);
}

#[test]
fn test_lstm_cell_failed_lookup_runs_no_batch_norm() {
    let mut store = VariableStore::with_seed(0);
    let cell = LSTMCellConfig::new(3).bn(true).build().unwrap();

    cell.step(&mut store, &generate_input(2, 2), &cell.zero_state(2))
        .unwrap();

    // W_i exists with two input rows, so a wider input is rejected by the store
    let result = cell.step(&mut store, &generate_input(2, 5), &cell.zero_state(2));
    assert!(matches!(result, Err(ModelError::InputValidationError(_))));
    assert_eq!(store.counter("LSTMCell/bn_i", "counter"), 1);
    assert_eq!(store.counter("LSTMCell/bn_m", "counter"), 1);
}

#[test]
fn test_lstm_cell_reuses_variables_across_steps() {
    let mut store = VariableStore::with_seed(0);
    let cell = LSTMCellConfig::new(3).build().unwrap();
    let x = generate_input(2, 2);

    let first = cell.step(&mut store, &x, &cell.zero_state(2)).unwrap();
    let count = store.len();
    let w = store.get("LSTMCell", "W_0").unwrap().clone();

    let second = cell.step(&mut store, &x, &cell.zero_state(2)).unwrap();

    assert_eq!(store.len(), count);
    assert_eq!(store.get("LSTMCell", "W_0").unwrap(), &w);
    assert_eq!(first.output, second.output);
}

#[test]
fn test_lstm_cell_batch_norm_variables_and_counters() {
    let mut store = VariableStore::with_seed(0);
    let cell = LSTMCellConfig::new(3).bn(true).build().unwrap();
    let x = generate_input(4, 2);

    cell.step(&mut store, &x, &cell.zero_state(4)).unwrap();

    assert!(!store.contains("LSTMCell", "W_0"));
    assert_eq!(store.get("LSTMCell", "W_i_0").unwrap().shape(), &[2, 12]);
    assert_eq!(store.get("LSTMCell", "W_r_0").unwrap().shape(), &[3, 12]);
    assert_eq!(store.get("LSTMCell/bn_i", "gamma").unwrap().shape(), &[12]);
    assert_eq!(store.get("LSTMCell/bn_m", "mean").unwrap().shape(), &[3]);

    // Only the memory normalization has a trainable shift
    assert!(!store.variable("LSTMCell/bn_i", "beta").unwrap().trainable);
    assert!(!store.variable("LSTMCell/bn_r", "beta").unwrap().trainable);
    assert!(store.variable("LSTMCell/bn_m", "beta").unwrap().trainable);

    for scope in ["LSTMCell/bn_i", "LSTMCell/bn_r", "LSTMCell/bn_m"] {
        assert_eq!(store.counter(scope, "counter"), 1);
    }

    cell.step(&mut store, &x, &cell.zero_state(4)).unwrap();
    assert_eq!(store.counter("LSTMCell/bn_m", "counter"), 2);
}

#[test]
fn test_lstm_cell_batch_norm_tracks_cell_memory() {
    let mut store = VariableStore::with_seed(0);
    let cell = LSTMCellConfig::new(3).bn(true).build().unwrap();
    let x = generate_input(4, 2);

    let step = cell.step(&mut store, &x, &cell.zero_state(4)).unwrap();

    // After the first training step the running mean equals the batch mean of c
    let c = step.state.c.clone().into_dimensionality::<Ix2>().unwrap();
    let expected = c.mean_axis(Axis(0)).unwrap();
    let mean = store.get("LSTMCell/bn_m", "mean").unwrap();
    for (a, b) in mean.iter().zip(expected.iter()) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-5);
    }
}

#[test]
fn test_lstm_cell_batch_norm_normalizes_output_memory_only() {
    let mut store = VariableStore::with_seed(0);
    let cell = LSTMCellConfig::new(3)
        .bn(true)
        .return_gate(true)
        .build()
        .unwrap();
    let x = generate_input(4, 2);

    cell.step(&mut store, &x, &cell.zero_state(4)).unwrap();
    // Move the normalized memory far away from the raw one
    store
        .assign("LSTMCell/bn_m", "beta", array![5.0f32, 5.0, 5.0].into_dyn())
        .unwrap();
    let step = cell.step(&mut store, &x, &cell.zero_state(4)).unwrap();

    let gamma = store.get("LSTMCell/bn_m", "gamma").unwrap();
    let beta = store.get("LSTMCell/bn_m", "beta").unwrap();
    let mean = store.get("LSTMCell/bn_m", "mean").unwrap();
    let var = store.get("LSTMCell/bn_m", "var").unwrap();
    let o = step.gates.as_ref().unwrap().o.clone();

    for b in 0..4 {
        for u in 0..3 {
            let c = step.state.c[[b, u]];
            let c_norm = (c - mean[[u]]) / (var[[u]] + BATCH_NORM_EPSILON).sqrt() * gamma[[u]]
                + beta[[u]];
            let expected = sigmoid(o[[b, u]]) * c_norm.tanh();
            assert_abs_diff_eq!(step.output[[b, u]], expected, epsilon = 1e-5);

            // From a zero state |c| = |sigma(i) * tanh(j)| < 1, the normalized values sit near 5
            assert!(c.abs() < 1.0);
            assert!(c_norm > 4.0);
        }
    }
}

#[test]
fn test_lstm_cell_deterministic_mode_freezes_statistics() {
    let mut store = VariableStore::with_seed(0);
    let mut cell = LSTMCellConfig::new(3).bn(true).build().unwrap();
    let x = generate_input(4, 2);

    cell.step(&mut store, &x, &cell.zero_state(4)).unwrap();
    let mean = store.get("LSTMCell/bn_m", "mean").unwrap().clone();

    cell.set_training(false);
    assert!(cell.is_deterministic());

    let other = generate_input(4, 2).mapv(|v| v * 3.0 + 1.0);
    let first = cell.step(&mut store, &other, &cell.zero_state(4)).unwrap();
    let second = cell.step(&mut store, &other, &cell.zero_state(4)).unwrap();

    assert_eq!(first.output, second.output);
    assert_eq!(store.get("LSTMCell/bn_m", "mean").unwrap(), &mean);
    assert_eq!(store.counter("LSTMCell/bn_m", "counter"), 1);
}

#[test]
fn test_lstm_cells_with_different_scopes_share_a_store() {
    let mut store = VariableStore::with_seed(0);
    let layer1 = LSTMCellConfig::new(3).scope("layer1").build().unwrap();
    let layer2 = LSTMCellConfig::new(2).scope("layer2").build().unwrap();

    let step1 = layer1
        .step(&mut store, &generate_input(2, 4), &layer1.zero_state(2))
        .unwrap();
    let step2 = layer2
        .step(&mut store, &step1.output, &layer2.zero_state(2))
        .unwrap();

    assert_eq!(step2.output.shape(), &[2, 2]);
    assert_eq!(store.get("layer1", "W_0").unwrap().shape(), &[7, 12]);
    assert_eq!(store.get("layer2", "W_0").unwrap().shape(), &[5, 8]);
    assert_eq!(layer2.scope(), "layer2");
}
