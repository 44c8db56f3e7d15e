//! Graph assembly.
//!
//! Wires the instantiated fluents and compiled expressions into one step
//! function: `next_state, intermediates, reward = step(state, action,
//! non_fluents)`. Intermediate fluents compile in topological level order
//! so later levels read already-compiled earlier levels within the same
//! decision step. Every grounded signature ends up as exactly one input
//! node, which is what lets the backend batch-evaluate the graph by
//! prepending a batch dimension.

use groundflow_model::{FluentDef, FluentKind, Model, Signature};
use groundflow_graph::{InputSlot, StepFunction};
use indexmap::IndexMap;
use tracing::debug;

use crate::deps::references_of_kind;
use crate::error::{CompileError, Result};
use crate::expr::ExprCompiler;
use crate::object_table::ObjectTable;
use crate::pvariables::PVariableTable;
use crate::schedule::{topological_levels, ScheduleNode};

/// Assembles the compiled step function for a model.
pub fn assemble(
    model: &Model,
    objects: &ObjectTable,
    table: &PVariableTable,
    seed: u64,
    max_elements: usize,
) -> Result<StepFunction> {
    let interm_defs = index_defs(&model.intermediate_defs, table, FluentKind::Intermediate)?;
    let transition_defs = index_defs(&model.transition_defs, table, FluentKind::State)?;

    // Every declared intermediate and state fluent needs its definition.
    for pvar in table.by_kind(FluentKind::Intermediate) {
        if !interm_defs.contains_key(&pvar.signature) {
            return Err(CompileError::MissingDefault {
                signature: pvar.signature.to_string(),
                what: "defining expression".to_string(),
            });
        }
    }
    for pvar in table.by_kind(FluentKind::State) {
        if !transition_defs.contains_key(&pvar.signature) {
            return Err(CompileError::MissingDefault {
                signature: pvar.signature.to_string(),
                what: "transition expression".to_string(),
            });
        }
    }

    let nodes: Vec<ScheduleNode> = table
        .by_kind(FluentKind::Intermediate)
        .map(|pvar| ScheduleNode {
            signature: pvar.signature.clone(),
            reads: references_of_kind(
                &interm_defs[&pvar.signature].expr.node,
                table,
                FluentKind::Intermediate,
            ),
        })
        .collect();
    let levels = topological_levels(&nodes)?;
    debug!(levels = levels.len(), "scheduled intermediate fluents");

    let mut compiler = ExprCompiler::new(objects, table, seed, max_elements);

    let mut intermediates = Vec::new();
    for level in &levels {
        for signature in level {
            // Scheduled signatures come straight from the table.
            let pvar = table.get(signature).unwrap();
            let root = compiler.compile_fluent(pvar, interm_defs[signature])?;
            intermediates.push((signature.clone(), root));
        }
    }

    let mut next_state = Vec::new();
    for pvar in table.by_kind(FluentKind::State) {
        let root = compiler.compile_fluent(pvar, transition_defs[&pvar.signature])?;
        next_state.push((pvar.signature.clone(), root));
    }

    let reward = compiler.compile_reward(&model.reward)?;

    // Unreferenced grounded signatures still get their input node; the
    // backend binds full state/action/non-fluent sets positionally.
    for kind in [FluentKind::State, FluentKind::Action, FluentKind::NonFluent] {
        for pvar in table.by_kind(kind) {
            compiler.input_node(pvar)?;
        }
    }

    let (graph, inputs) = compiler.finish();
    let slots = |order: Vec<Signature>| -> Vec<InputSlot> {
        order
            .into_iter()
            .map(|signature| InputSlot {
                tensor: format!("{}:0", signature),
                node: inputs[&signature],
                signature,
            })
            .collect()
    };

    Ok(StepFunction {
        graph,
        state_inputs: slots(table.state_order()),
        action_inputs: slots(table.action_order()),
        non_fluent_inputs: slots(table.non_fluent_order()),
        intermediates,
        next_state,
        reward,
        levels,
    })
}

/// Indexes definitions by signature, validating that each targets a
/// declared fluent of the expected category exactly once.
fn index_defs<'a>(
    defs: &'a [FluentDef],
    table: &PVariableTable,
    kind: FluentKind,
) -> Result<IndexMap<Signature, &'a FluentDef>> {
    let mut out = IndexMap::new();
    for def in defs {
        let signature = def.signature();
        let pvar = table.require(&signature, def.name.span)?;
        if pvar.kind != kind {
            return Err(CompileError::TypeMismatch {
                context: format!("definition of '{}'", signature),
                expected: kind.to_string(),
                actual: pvar.kind.to_string(),
                span: def.name.span,
            });
        }
        if out.insert(signature.clone(), def).is_some() {
            return Err(CompileError::DuplicateDeclaration {
                signature: signature.to_string(),
                span: def.name.span,
            });
        }
    }
    Ok(out)
}
