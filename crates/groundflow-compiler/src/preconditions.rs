//! Action precondition partitioning.
//!
//! A precondition referencing exactly one action-fluent signature can be
//! enforced independently per action dimension; anything else needs joint
//! evaluation. Local buckets and the global list both preserve first-seen
//! order so validation diagnostics at evaluation time come out in a
//! reproducible order.

use groundflow_model::{Expr, FluentKind, Signature, Spanned};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::deps::references_of_kind;
use crate::pvariables::PVariableTable;

/// Partitioned precondition expressions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preconditions {
    /// Preconditions over exactly one action fluent, keyed by it.
    pub local: IndexMap<Signature, Vec<Spanned<Expr>>>,
    /// Preconditions over zero or several action fluents.
    pub global: Vec<Spanned<Expr>>,
}

impl Preconditions {
    /// Splits the model's precondition list by action-fluent reference set.
    pub fn partition(preconditions: &[Spanned<Expr>], table: &PVariableTable) -> Self {
        let mut out = Preconditions::default();
        for precondition in preconditions {
            let actions = references_of_kind(&precondition.node, table, FluentKind::Action);
            match actions.as_slice() {
                [signature] => out
                    .local
                    .entry(signature.clone())
                    .or_default()
                    .push(precondition.clone()),
                _ => out.global.push(precondition.clone()),
            }
        }
        out
    }

    /// Total partitioned count; always equals the input count.
    pub fn len(&self) -> usize {
        self.global.len() + self.local.values().map(Vec::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
