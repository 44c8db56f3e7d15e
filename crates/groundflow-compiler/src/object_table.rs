//! Object tables.
//!
//! Assigns each declared object type a stable, order-preserving index over
//! its named instances. Every later stage resolves object addresses through
//! [`ObjectType::index_of`] and nothing else, so one ordering holds
//! system-wide: tensor axes, point-assignment addresses, and aggregation
//! enumeration all agree by construction.

use groundflow_model::{Span, TypeDecl};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::error::{CompileError, Result};

/// One declared object type: its instances in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectType {
    objects: IndexSet<String>,
}

impl ObjectType {
    /// Number of instances — the grounded cardinality of this type.
    pub fn size(&self) -> usize {
        self.objects.len()
    }

    /// Position of an object in declaration order.
    pub fn index_of(&self, object: &str) -> Option<usize> {
        self.objects.get_index_of(object)
    }

    /// Object name at a position.
    pub fn name_at(&self, index: usize) -> Option<&str> {
        self.objects.get_index(index).map(|s| s.as_str())
    }

    /// Instances in declaration order.
    pub fn order(&self) -> impl Iterator<Item = &str> {
        self.objects.iter().map(|s| s.as_str())
    }
}

/// All declared object types, keyed by type name in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectTable {
    types: IndexMap<String, ObjectType>,
}

impl ObjectTable {
    /// Builds the table from the model's type declarations.
    ///
    /// Object names must be unique within a type; ordering preserves
    /// declaration order exactly.
    pub fn build(decls: &[TypeDecl]) -> Result<Self> {
        let mut types = IndexMap::new();
        for decl in decls {
            if types.contains_key(&decl.name.node) {
                return Err(CompileError::DuplicateDeclaration {
                    signature: decl.name.node.clone(),
                    span: decl.name.span,
                });
            }
            let mut objects = IndexSet::new();
            for object in &decl.objects {
                if !objects.insert(object.node.clone()) {
                    return Err(CompileError::DuplicateObject {
                        ty: decl.name.node.clone(),
                        object: object.node.clone(),
                        span: object.span,
                    });
                }
            }
            types.insert(decl.name.node.clone(), ObjectType { objects });
        }
        Ok(Self { types })
    }

    pub fn get(&self, ty: &str) -> Option<&ObjectType> {
        self.types.get(ty)
    }

    /// Looks up a type, failing with `UnknownType` naming the referencing
    /// context.
    pub fn require(&self, ty: &str, context: &str, span: Span) -> Result<&ObjectType> {
        self.types.get(ty).ok_or_else(|| CompileError::UnknownType {
            name: ty.to_string(),
            context: context.to_string(),
            span,
        })
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(|s| s.as_str())
    }
}
