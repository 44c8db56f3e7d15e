//! The compiled step function.
//!
//! `next_state, intermediates, reward = step(state, action, non_fluents)`,
//! described as data. Input slots are listed in deterministic declaration
//! order per category so the backend can bind tensors positionally, and
//! every grounded signature appears as exactly one input node — which is
//! what lets the backend prepend a batch dimension and broadcast over all
//! grounded index dimensions.

use groundflow_model::Signature;
use serde::{Deserialize, Serialize};

use crate::graph::{NodeId, OpGraph};

/// One bindable input of the step function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSlot {
    pub signature: Signature,
    /// The fixed value-node name, `"{name}/{arity}:0"`.
    pub tensor: String,
    pub node: NodeId,
}

/// A compiled, evaluable decision step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepFunction {
    pub graph: OpGraph,
    /// State inputs, in state declaration order.
    pub state_inputs: Vec<InputSlot>,
    /// Action inputs, in action declaration order.
    pub action_inputs: Vec<InputSlot>,
    /// Non-fluent inputs, in non-fluent declaration order.
    pub non_fluent_inputs: Vec<InputSlot>,
    /// Intermediate fluent roots in dependency (schedule) order.
    pub intermediates: Vec<(Signature, NodeId)>,
    /// Next-state roots, in state declaration order.
    pub next_state: Vec<(Signature, NodeId)>,
    /// The scalar reward root.
    pub reward: NodeId,
    /// The topological schedule of intermediate fluents: fluents within a
    /// level depend only on earlier levels.
    pub levels: Vec<Vec<Signature>>,
}

impl StepFunction {
    /// Looks up an input slot by signature across all three categories.
    pub fn input(&self, signature: &Signature) -> Option<&InputSlot> {
        self.state_inputs
            .iter()
            .chain(&self.action_inputs)
            .chain(&self.non_fluent_inputs)
            .find(|slot| &slot.signature == signature)
    }
}
