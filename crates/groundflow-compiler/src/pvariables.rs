//! The pvariable table.
//!
//! Groups declared variable signatures into the four fluent categories.
//! Purely a grouping pass over declared categories — nothing is inferred.
//! The table also exposes deterministic per-category orderings; the
//! execution backend binds input tensors positionally from these.

use groundflow_model::{FluentKind, Literal, PVarDecl, Signature, Span, ValueType};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::error::{CompileError, Result};
use crate::object_table::ObjectTable;

/// A declared variable with its parameter types validated against the
/// object table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PVariable {
    pub signature: Signature,
    pub kind: FluentKind,
    /// Parameter type names in declared order.
    pub params: Vec<String>,
    pub value: ValueType,
    pub default: Option<Literal>,
    pub span: Span,
}

/// All declared variables keyed by signature, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PVariableTable {
    vars: IndexMap<Signature, PVariable>,
}

impl PVariableTable {
    /// Builds the table, validating parameter types and signature
    /// uniqueness.
    pub fn build(decls: &[PVarDecl], objects: &ObjectTable) -> Result<Self> {
        let mut vars = IndexMap::new();
        for decl in decls {
            let signature = decl.signature();
            for param in &decl.params {
                objects.require(
                    &param.node,
                    &format!("parameter of '{}'", signature),
                    param.span,
                )?;
            }
            let pvar = PVariable {
                signature: signature.clone(),
                kind: decl.kind,
                params: decl.params.iter().map(|p| p.node.clone()).collect(),
                value: decl.value,
                default: decl.default.as_ref().map(|d| d.node),
                span: decl.name.span,
            };
            if vars.insert(signature.clone(), pvar).is_some() {
                return Err(CompileError::DuplicateDeclaration {
                    signature: signature.to_string(),
                    span: decl.name.span,
                });
            }
        }
        Ok(Self { vars })
    }

    pub fn get(&self, signature: &Signature) -> Option<&PVariable> {
        self.vars.get(signature)
    }

    /// Looks up a reference to `name/arity`. A same-name declaration at a
    /// different arity is an `ArityMismatch`; an entirely unknown name is an
    /// `UnknownType`.
    pub fn require(&self, signature: &Signature, span: Span) -> Result<&PVariable> {
        if let Some(pvar) = self.vars.get(signature) {
            return Ok(pvar);
        }
        if let Some(declared) = self
            .vars
            .values()
            .find(|pvar| pvar.signature.name == signature.name)
        {
            return Err(CompileError::ArityMismatch {
                signature: signature.to_string(),
                expected: declared.signature.arity,
                actual: signature.arity,
                span,
            });
        }
        Err(CompileError::UnknownType {
            name: signature.name.clone(),
            context: "variable reference".to_string(),
            span,
        })
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PVariable> {
        self.vars.values()
    }

    /// Variables of one category, in declaration order.
    pub fn by_kind(&self, kind: FluentKind) -> impl Iterator<Item = &PVariable> {
        self.vars.values().filter(move |pvar| pvar.kind == kind)
    }

    /// Signatures of one category, in declaration order.
    pub fn group(&self, kind: FluentKind) -> IndexSet<Signature> {
        self.by_kind(kind)
            .map(|pvar| pvar.signature.clone())
            .collect()
    }

    pub fn state_order(&self) -> Vec<Signature> {
        self.group(FluentKind::State).into_iter().collect()
    }

    pub fn action_order(&self) -> Vec<Signature> {
        self.group(FluentKind::Action).into_iter().collect()
    }

    pub fn interm_order(&self) -> Vec<Signature> {
        self.group(FluentKind::Intermediate).into_iter().collect()
    }

    pub fn non_fluent_order(&self) -> Vec<Signature> {
        self.group(FluentKind::NonFluent).into_iter().collect()
    }
}
