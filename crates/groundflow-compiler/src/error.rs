//! Compiler errors.
//!
//! Every failure is detected during compilation and aborts it immediately;
//! no partial artifact is returned. Each variant names the offending
//! signature and/or source span.

use groundflow_model::Span;
use thiserror::Error;

/// Compiler result type.
pub type Result<T> = std::result::Result<T, CompileError>;

/// Compilation errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("duplicate object '{object}' in type '{ty}' at {span}")]
    DuplicateObject {
        ty: String,
        object: String,
        span: Span,
    },

    #[error("duplicate declaration of '{signature}' at {span}")]
    DuplicateDeclaration { signature: String, span: Span },

    #[error("unknown symbol '{name}' ({context}) at {span}")]
    UnknownType {
        name: String,
        context: String,
        span: Span,
    },

    #[error("unknown object '{object}' of type '{ty}' in '{signature}' at {span}")]
    UnknownObject {
        object: String,
        ty: String,
        signature: String,
        span: Span,
    },

    #[error("missing {what} for '{signature}'")]
    MissingDefault { signature: String, what: String },

    #[error("arity mismatch for '{signature}': expected {expected}, got {actual} at {span}")]
    ArityMismatch {
        signature: String,
        expected: usize,
        actual: usize,
        span: Span,
    },

    #[error("type mismatch in {context}: expected {expected}, got {actual} at {span}")]
    TypeMismatch {
        context: String,
        expected: String,
        actual: String,
        span: Span,
    },

    #[error("cyclic dependency among intermediate fluents: {involved:?}")]
    CyclicDependency { involved: Vec<String> },

    #[error("unsupported expression: {reason} at {span}")]
    UnsupportedExpression { reason: String, span: Span },

    #[error("grounding '{signature}' needs {required} elements, limit is {limit}")]
    ResourceLimitExceeded {
        signature: String,
        required: u128,
        limit: usize,
    },
}
