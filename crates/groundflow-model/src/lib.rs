//! Model declarations and expression AST for groundflow.
//!
//! These types are the contract with the parser front end: the parser turns
//! source text into a [`Model`], and the compiler consumes it. Nothing here
//! grounds, validates, or evaluates anything.

pub mod ast;
pub mod span;

pub use ast::{
    AggregateOp, BinaryOp, Distribution, Expr, FluentDef, FluentKind, InitAssign, InitBlock,
    Literal, Model, PVarDecl, Signature, Term, TypeDecl, TypedParam, UnaryOp, ValueType,
};
pub use span::{Span, Spanned};
