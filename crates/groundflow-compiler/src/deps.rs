//! Signature-reference extraction from expressions.
//!
//! Walks an expression tree and collects every variable signature it
//! references. Results come back in deterministic sorted order; dependency
//! scheduling and precondition partitioning both build on this.

use groundflow_model::{Expr, FluentKind, Signature, Spanned};
use indexmap::IndexSet;

use crate::pvariables::PVariableTable;

/// Every signature referenced anywhere in `expr`, sorted and deduplicated.
pub fn referenced_signatures(expr: &Expr) -> Vec<Signature> {
    let mut refs = IndexSet::new();
    collect(expr, &mut refs);
    let mut out: Vec<Signature> = refs.into_iter().collect();
    out.sort();
    out
}

/// Referenced signatures restricted to one fluent category.
pub fn references_of_kind(
    expr: &Expr,
    table: &PVariableTable,
    kind: FluentKind,
) -> Vec<Signature> {
    referenced_signatures(expr)
        .into_iter()
        .filter(|sig| table.get(sig).is_some_and(|pvar| pvar.kind == kind))
        .collect()
}

fn collect(expr: &Expr, refs: &mut IndexSet<Signature>) {
    match expr {
        Expr::Const(_) => {}
        Expr::PVar { name, args } => {
            refs.insert(Signature::new(name.clone(), args.len()));
        }
        Expr::Unary { operand, .. } => collect(&operand.node, refs),
        Expr::Binary { lhs, rhs, .. } => {
            collect(&lhs.node, refs);
            collect(&rhs.node, refs);
        }
        Expr::If { cond, then, orelse } => {
            collect(&cond.node, refs);
            collect(&then.node, refs);
            collect(&orelse.node, refs);
        }
        Expr::Aggregate { body, .. } => collect(&body.node, refs),
        Expr::Random { args, .. } => {
            for arg in args {
                collect(&arg.node, refs);
            }
        }
    }
}

/// Convenience for spanned expressions.
pub fn spanned_references(expr: &Spanned<Expr>) -> Vec<Signature> {
    referenced_signatures(&expr.node)
}
