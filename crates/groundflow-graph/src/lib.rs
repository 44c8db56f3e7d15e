//! Compiled artifact types for groundflow.
//!
//! Everything here is pure data describing computation: dense grounded
//! tensors, an arena-allocated operation graph, and the step-function
//! description the execution backend evaluates. Nothing in this crate runs
//! anything, and a compiled artifact is safe to share read-only across
//! evaluation threads.

pub mod dtype;
pub mod graph;
pub mod step;
pub mod tensor;

pub use dtype::DType;
pub use graph::{NodeId, OpGraph, OpKind, OpNode, ReduceOp};
pub use step::{InputSlot, StepFunction};
pub use tensor::{Shape, Tensor, TensorData, TensorStore};
