//! End-to-end compilation tests over the reservoir-network fixture.
//!
//! These exercise the full pipeline — object grounding, classification,
//! precondition partitioning, instantiation, expression compilation, and
//! assembly — and pin down the artifact's externally visible contracts.

use groundflow_compiler::{compile, CompileError, CompilerOptions};
use groundflow_graph::{DType, OpKind, ReduceOp};
use groundflow_model::{FluentKind, Literal, Signature};
use groundflow_tests::{init_block, reservoir};

fn compiled() -> groundflow_compiler::Compiled {
    compile(&reservoir(), &CompilerOptions::default()).unwrap()
}

#[test]
fn test_object_table_indexes_declaration_order() {
    let compiled = compiled();
    let res = compiled.objects.get("res").unwrap();
    assert_eq!(res.size(), 8);
    for (i, name) in ["t1", "t2", "t3", "t4", "t5", "t6", "t7", "t8"]
        .iter()
        .enumerate()
    {
        assert_eq!(res.index_of(name), Some(i));
    }
}

#[test]
fn test_pvariable_table_partitions_categories() {
    let compiled = compiled();
    let table = &compiled.pvariables;
    assert_eq!(table.group(FluentKind::NonFluent).len(), 10);
    assert_eq!(table.group(FluentKind::Intermediate).len(), 3);
    assert_eq!(table.state_order(), vec![Signature::new("rlevel", 1)]);
    assert_eq!(table.action_order(), vec![Signature::new("outflow", 1)]);

    let grouped: usize = [
        FluentKind::NonFluent,
        FluentKind::State,
        FluentKind::Action,
        FluentKind::Intermediate,
    ]
    .iter()
    .map(|&kind| table.group(kind).len())
    .sum();
    assert_eq!(grouped, table.len());
}

#[test]
fn test_preconditions_are_local_to_outflow() {
    let compiled = compiled();
    let preconditions = &compiled.preconditions;
    assert_eq!(preconditions.global.len(), 0);
    assert_eq!(preconditions.local.len(), 1);
    assert_eq!(
        preconditions.local[&Signature::new("outflow", 1)].len(),
        2
    );
    assert_eq!(preconditions.len(), 2);
}

#[test]
fn test_non_fluents_ground_to_expected_tensors() {
    let compiled = compiled();
    let store = &compiled.non_fluents;
    assert_eq!(store.len(), 10);

    let cap = store.get(&Signature::new("MAX_RES_CAP", 1)).unwrap();
    assert_eq!(cap.shape().dims(), &[8]);
    assert_eq!(cap.dtype(), DType::Real);
    assert_eq!(
        cap.as_real().unwrap(),
        &[100.0, 100.0, 200.0, 300.0, 400.0, 500.0, 800.0, 1000.0]
    );

    let scale = store.get(&Signature::new("RAIN_SCALE", 1)).unwrap();
    assert_eq!(
        scale.as_real().unwrap(),
        &[5.0, 3.0, 9.0, 7.0, 15.0, 13.0, 25.0, 30.0]
    );

    let evap = store
        .get(&Signature::new("MAX_WATER_EVAP_FRAC_PER_TIME_UNIT", 0))
        .unwrap();
    assert_eq!(evap.shape().rank(), 0);
    assert_eq!(evap.as_real().unwrap(), &[0.05]);
}

#[test]
fn test_downstream_relation_has_one_successor_per_row() {
    let compiled = compiled();
    let downstream = compiled
        .non_fluents
        .get(&Signature::new("DOWNSTREAM", 2))
        .unwrap();
    assert_eq!(downstream.shape().dims(), &[8, 8]);
    assert_eq!(downstream.dtype(), DType::Bool);

    let values = downstream.as_bool().unwrap();
    for row in 0..8 {
        let successors = (0..8).filter(|col| values[row * 8 + col]).count();
        assert!(successors <= 1, "row {} has {} successors", row, successors);
    }
    // t1 -> t6, t8 is the sink.
    assert!(values[5]);
    assert!(!values[7 * 8..].iter().any(|&v| v));
}

#[test]
fn test_initial_state_and_default_actions() {
    let compiled = compiled();
    let rlevel = compiled
        .initial_state
        .get(&Signature::new("rlevel", 1))
        .unwrap();
    assert_eq!(
        rlevel.as_real().unwrap(),
        &[75.0, 50.0, 50.0, 50.0, 50.0, 50.0, 50.0, 50.0]
    );

    let outflow = compiled
        .default_actions
        .get(&Signature::new("outflow", 1))
        .unwrap();
    assert_eq!(outflow.as_real().unwrap(), &[0.0; 8]);
}

#[test]
fn test_tensor_naming_contract() {
    let compiled = compiled();
    let cap = compiled
        .non_fluents
        .get(&Signature::new("MAX_RES_CAP", 1))
        .unwrap();
    assert_eq!(cap.name(), "MAX_RES_CAP/1");
    assert_eq!(cap.value_node_name(), "MAX_RES_CAP/1:0");

    let slot = compiled
        .step
        .input(&Signature::new("rlevel", 1))
        .unwrap();
    assert_eq!(slot.tensor, "rlevel/1:0");
}

#[test]
fn test_step_function_shape() {
    let compiled = compiled();
    let step = &compiled.step;

    assert_eq!(step.state_inputs.len(), 1);
    assert_eq!(step.action_inputs.len(), 1);
    assert_eq!(step.non_fluent_inputs.len(), 10);
    assert_eq!(step.intermediates.len(), 3);
    assert_eq!(step.next_state.len(), 1);
    assert_eq!(step.next_state[0].0, Signature::new("rlevel", 1));

    // All three intermediates are independent of each other.
    assert_eq!(step.levels.len(), 1);
    assert_eq!(step.levels[0].len(), 3);

    // The reward reduces to a scalar.
    assert_eq!(step.graph.node(step.reward).shape.rank(), 0);
    assert_eq!(step.graph.node(step.reward).dtype, DType::Real);
}

#[test]
fn test_each_grounded_signature_is_one_input_node() {
    let compiled = compiled();
    let step = &compiled.step;
    let mut tensors: Vec<&str> = step
        .graph
        .iter()
        .filter_map(|(_, node)| match &node.kind {
            OpKind::Input { tensor } => Some(tensor.as_str()),
            _ => None,
        })
        .collect();
    tensors.sort_unstable();
    let before = tensors.len();
    tensors.dedup();
    assert_eq!(before, tensors.len(), "duplicated input node");
    // 1 state + 1 action + 10 non-fluents.
    assert_eq!(before, 12);
}

#[test]
fn test_upstream_inflow_compiles_to_gather() {
    let compiled = compiled();
    let gather = compiled
        .step
        .graph
        .iter()
        .find_map(|(_, node)| match node.kind {
            OpKind::Gather { op, axis, .. } => Some((op, axis, node.shape.clone())),
            _ => None,
        });
    let (op, axis, shape) = gather.expect("no gather node in step graph");
    assert_eq!(op, ReduceOp::Sum);
    assert_eq!(axis, 1);
    assert_eq!(shape.dims(), &[8]);
}

#[test]
fn test_rainfall_samples_per_reservoir() {
    let compiled = compiled();
    let sample = compiled
        .step
        .graph
        .iter()
        .find_map(|(_, node)| match &node.kind {
            OpKind::Sample { dist, args, .. } => Some((*dist, args.len(), node.clone())),
            _ => None,
        });
    let (dist, arg_count, node) = sample.expect("no sample node in step graph");
    assert_eq!(dist, groundflow_model::Distribution::Gamma);
    assert_eq!(arg_count, 2);
    // One independent draw per reservoir, never a broadcast scalar.
    assert_eq!(node.shape.dims(), &[8]);
    assert_eq!(node.dtype, DType::Real);
}

#[test]
fn test_compilation_is_deterministic() {
    let first = compile(&reservoir(), &CompilerOptions::default()).unwrap();
    let second = compile(&reservoir(), &CompilerOptions::default()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_artifact_accessors() {
    let compiled = compiled();
    assert_eq!(
        compiled
            .fluent_shape(&Signature::new("DOWNSTREAM", 2))
            .unwrap()
            .dims(),
        &[8, 8]
    );
    assert_eq!(
        compiled.fluent_dtype(&Signature::new("SINK_RES", 1)),
        Some(DType::Bool)
    );
    assert_eq!(compiled.interm_order().len(), 3);
}

#[test]
fn test_unknown_object_in_init_fails_whole_compile() {
    let mut model = reservoir();
    model
        .state_init
        .push(init_block("rlevel", &[(&["t9"], Literal::Real(10.0))]));
    let err = compile(&model, &CompilerOptions::default()).unwrap_err();
    assert!(matches!(err, CompileError::UnknownObject { ref object, .. } if object == "t9"));
}

#[test]
fn test_resource_limit_fails_fast() {
    let options = CompilerOptions {
        max_grounded_elements: 16,
        seed: 0,
    };
    let err = compile(&reservoir(), &options).unwrap_err();
    assert!(matches!(err, CompileError::ResourceLimitExceeded { .. }));
}

#[test]
fn test_seed_changes_sampling_only() {
    let a = compile(&reservoir(), &CompilerOptions::default()).unwrap();
    let b = compile(
        &reservoir(),
        &CompilerOptions {
            seed: 7,
            ..CompilerOptions::default()
        },
    )
    .unwrap();

    // Grounded tensors are untouched by the seed.
    assert_eq!(a.non_fluents, b.non_fluents);
    assert_eq!(a.initial_state, b.initial_state);

    let seeds = |compiled: &groundflow_compiler::Compiled| {
        compiled
            .step
            .graph
            .iter()
            .filter_map(|(_, node)| match node.kind {
                OpKind::Sample { seed, .. } => Some(seed),
                _ => None,
            })
            .collect::<Vec<_>>()
    };
    assert_ne!(seeds(&a), seeds(&b));
}
