//! groundflow compiler
//!
//! Compiles a parametrized specification of a discrete-time stochastic
//! dynamical model into a fully grounded, batchable operation graph.
//!
//! The pipeline runs the stages in fixed order, each consuming only the
//! outputs of earlier stages plus the original AST:
//!
//! 1. **ObjectTable** — stable declaration-order index per object type.
//! 2. **PVariableTable** — signatures grouped into the four fluent
//!    categories.
//! 3. **Preconditions** — expressions split into per-action local buckets
//!    and a global list.
//! 4. **Instantiator** — non-fluents, initial state, and default actions
//!    grounded into dense tensors.
//! 5. **ExpressionCompiler / assembly** — defining expressions compiled in
//!    dependency order and wired into one step function.
//!
//! Compilation is single-threaded and the resulting [`Compiled`] artifact
//! is immutable — pure data describing computation, safe to share
//! read-only across evaluation threads.

pub mod assemble;
pub mod deps;
pub mod error;
pub mod expr;
pub mod instantiate;
pub mod object_table;
pub mod preconditions;
pub mod pvariables;
pub mod schedule;

use groundflow_graph::{DType, Shape, StepFunction, TensorStore};
use groundflow_model::{Model, Signature};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use error::{CompileError, Result};
pub use instantiate::Instantiator;
pub use object_table::{ObjectTable, ObjectType};
pub use preconditions::Preconditions;
pub use pvariables::{PVariable, PVariableTable};

/// Compilation knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerOptions {
    /// Upper bound on the element count of any grounded tensor or
    /// aggregation-extended intermediate; exceeding it fails fast instead
    /// of attempting the allocation.
    pub max_grounded_elements: usize,
    /// Base seed for sampling-node seed derivation.
    pub seed: u64,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            max_grounded_elements: 1 << 24,
            seed: 0,
        }
    }
}

/// The compiled artifact: grounding tables, grounded tensors, partitioned
/// preconditions, and the step function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Compiled {
    pub objects: ObjectTable,
    pub pvariables: PVariableTable,
    pub preconditions: Preconditions,
    /// Grounded non-fluents, keyed `"{name}/{arity}"`.
    pub non_fluents: TensorStore,
    /// Grounded initial state values.
    pub initial_state: TensorStore,
    /// Grounded default action values.
    pub default_actions: TensorStore,
    pub step: StepFunction,
}

impl Compiled {
    /// Grounded shape of any declared signature.
    pub fn fluent_shape(&self, signature: &Signature) -> Option<Shape> {
        let pvar = self.pvariables.get(signature)?;
        instantiate::grounded_shape(&self.objects, pvar).ok()
    }

    /// Dtype of any declared signature.
    pub fn fluent_dtype(&self, signature: &Signature) -> Option<DType> {
        self.pvariables
            .get(signature)
            .map(|pvar| DType::from(pvar.value))
    }

    /// State fluent signatures in declaration order.
    pub fn state_order(&self) -> Vec<Signature> {
        self.pvariables.state_order()
    }

    /// Action fluent signatures in declaration order.
    pub fn action_order(&self) -> Vec<Signature> {
        self.pvariables.action_order()
    }

    /// Intermediate fluent signatures in schedule order.
    pub fn interm_order(&self) -> Vec<Signature> {
        self.step
            .intermediates
            .iter()
            .map(|(signature, _)| signature.clone())
            .collect()
    }
}

/// Compiles a parsed model into a grounded operation graph.
///
/// Any malformed input aborts compilation with the first error; no partial
/// artifact is ever returned.
pub fn compile(model: &Model, options: &CompilerOptions) -> Result<Compiled> {
    debug!("building object table");
    let objects = ObjectTable::build(&model.types)?;

    debug!("classifying pvariables");
    let pvariables = PVariableTable::build(&model.pvariables, &objects)?;

    debug!("partitioning preconditions");
    let preconditions = Preconditions::partition(&model.preconditions, &pvariables);

    debug!("instantiating fluents");
    let instantiator =
        Instantiator::new(&objects, &pvariables, options.max_grounded_elements);
    let non_fluents = instantiator.non_fluents(&model.non_fluent_init)?;
    let initial_state = instantiator.initial_state(&model.state_init)?;
    let default_actions = instantiator.default_actions()?;

    debug!("compiling expressions");
    let step = assemble::assemble(
        model,
        &objects,
        &pvariables,
        options.seed,
        options.max_grounded_elements,
    )?;

    debug!(nodes = step.graph.len(), "compilation finished");
    Ok(Compiled {
        objects,
        pvariables,
        preconditions,
        non_fluents,
        initial_state,
        default_actions,
        step,
    })
}
