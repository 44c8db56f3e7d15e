//! Element dtypes of grounded tensors and graph nodes.

use groundflow_model::ValueType;
use serde::{Deserialize, Serialize};

/// Element type of a grounded tensor or an operation result.
///
/// `Real` is single-precision, `Int` a fixed-width signed integer, `Bool`
/// stored as 0/1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    Real,
    Int,
    Bool,
}

impl DType {
    pub fn is_numeric(self) -> bool {
        matches!(self, DType::Real | DType::Int)
    }

    /// Result dtype of mixed numeric arithmetic. Int promotes to Real;
    /// Bool never promotes (the compiler rejects it before asking).
    pub fn promote(a: DType, b: DType) -> Option<DType> {
        match (a, b) {
            (DType::Bool, _) | (_, DType::Bool) => None,
            (DType::Real, _) | (_, DType::Real) => Some(DType::Real),
            (DType::Int, DType::Int) => Some(DType::Int),
        }
    }
}

impl From<ValueType> for DType {
    fn from(value: ValueType) -> Self {
        match value {
            ValueType::Real => DType::Real,
            ValueType::Int => DType::Int,
            ValueType::Bool => DType::Bool,
        }
    }
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DType::Real => "real",
            DType::Int => "int",
            DType::Bool => "bool",
        };
        write!(f, "{}", name)
    }
}
