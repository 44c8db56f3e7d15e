//! Dense grounded tensors.
//!
//! A grounded tensor holds one value per combination of its signature's
//! parameter objects, row-major, immutable once instantiation finishes.
//! Its identity name is fixed as `"{name}/{arity}"` and its primary value
//! node as `"{name}/{arity}:0"` — a compatibility contract with the
//! execution backend.

use groundflow_model::Signature;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::dtype::DType;

/// Shape of a grounded tensor: parameter-type cardinalities in declared
/// order. Empty for arity-0 (scalar) signatures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape(pub Vec<usize>);

impl Shape {
    pub fn scalar() -> Self {
        Shape(Vec::new())
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    /// Total element count, or `None` on overflow.
    pub fn num_elements(&self) -> Option<usize> {
        self.0.iter().try_fold(1usize, |n, &d| n.checked_mul(d))
    }

    /// Row-major flat address of a multi-index, or `None` when the index is
    /// out of bounds or has the wrong rank.
    pub fn flat_index(&self, index: &[usize]) -> Option<usize> {
        if index.len() != self.0.len() {
            return None;
        }
        let mut flat = 0usize;
        for (&i, &dim) in index.iter().zip(&self.0) {
            if i >= dim {
                return None;
            }
            flat = flat * dim + i;
        }
        Some(flat)
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(")?;
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", d)?;
        }
        write!(f, ")")
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Shape(dims)
    }
}

/// Dense element storage, one variant per dtype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TensorData {
    Real(Vec<f32>),
    Int(Vec<i32>),
    Bool(Vec<bool>),
}

impl TensorData {
    pub fn dtype(&self) -> DType {
        match self {
            TensorData::Real(_) => DType::Real,
            TensorData::Int(_) => DType::Int,
            TensorData::Bool(_) => DType::Bool,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TensorData::Real(v) => v.len(),
            TensorData::Int(v) => v.len(),
            TensorData::Bool(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A dense grounded tensor keyed by its signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    signature: Signature,
    shape: Shape,
    data: TensorData,
}

impl Tensor {
    /// Builds a tensor from already-grounded storage. The data length must
    /// equal the shape's element count; the instantiator guarantees this.
    pub fn new(signature: Signature, shape: Shape, data: TensorData) -> Self {
        debug_assert_eq!(shape.num_elements(), Some(data.len()));
        Self {
            signature,
            shape,
            data,
        }
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// The fixed identity name, `"{name}/{arity}"`.
    pub fn name(&self) -> String {
        self.signature.to_string()
    }

    /// The fixed name of the tensor's primary value node,
    /// `"{name}/{arity}:0"`.
    pub fn value_node_name(&self) -> String {
        format!("{}:0", self.signature)
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    pub fn data(&self) -> &TensorData {
        &self.data
    }

    pub fn as_real(&self) -> Option<&[f32]> {
        match &self.data {
            TensorData::Real(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<&[i32]> {
        match &self.data {
            TensorData::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<&[bool]> {
        match &self.data {
            TensorData::Bool(v) => Some(v),
            _ => None,
        }
    }
}

/// Grounded tensors for one fluent category, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TensorStore {
    tensors: IndexMap<Signature, Tensor>,
}

impl TensorStore {
    pub fn insert(&mut self, tensor: Tensor) {
        self.tensors.insert(tensor.signature().clone(), tensor);
    }

    pub fn get(&self, signature: &Signature) -> Option<&Tensor> {
        self.tensors.get(signature)
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tensor> {
        self.tensors.values()
    }

    pub fn signatures(&self) -> impl Iterator<Item = &Signature> {
        self.tensors.keys()
    }
}
