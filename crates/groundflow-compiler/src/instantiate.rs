//! Fluent instantiation.
//!
//! Grounds non-fluents, initial state values, and default action values
//! into dense, typed, addressable tensors: allocate at the signature's
//! grounded shape, fill with the declared default, then overwrite each
//! explicit point assignment at its resolved address. Tensors are immutable
//! after this pass.

use groundflow_model::{FluentKind, InitAssign, InitBlock, Literal, Signature, Span};
use groundflow_graph::{DType, Shape, Tensor, TensorData, TensorStore};
use indexmap::IndexMap;

use crate::error::{CompileError, Result};
use crate::object_table::ObjectTable;
use crate::pvariables::{PVariable, PVariableTable};

/// Grounds the model's fluents against the object table.
pub struct Instantiator<'a> {
    objects: &'a ObjectTable,
    table: &'a PVariableTable,
    max_elements: usize,
}

impl<'a> Instantiator<'a> {
    pub fn new(objects: &'a ObjectTable, table: &'a PVariableTable, max_elements: usize) -> Self {
        Self {
            objects,
            table,
            max_elements,
        }
    }

    /// Grounds every non-fluent from its initialization blocks.
    pub fn non_fluents(&self, blocks: &[InitBlock]) -> Result<TensorStore> {
        self.instantiate_kind(FluentKind::NonFluent, blocks)
    }

    /// Grounds every state fluent's initial value.
    pub fn initial_state(&self, blocks: &[InitBlock]) -> Result<TensorStore> {
        self.instantiate_kind(FluentKind::State, blocks)
    }

    /// Grounds every action fluent's default value. Actions carry no
    /// initialization blocks; a missing default is fatal.
    pub fn default_actions(&self) -> Result<TensorStore> {
        let mut store = TensorStore::default();
        for pvar in self.table.by_kind(FluentKind::Action) {
            store.insert(self.instantiate(pvar, &[])?);
        }
        Ok(store)
    }

    fn instantiate_kind(&self, kind: FluentKind, blocks: &[InitBlock]) -> Result<TensorStore> {
        // Resolve every assignment to its declared signature up front, so a
        // malformed block fails even when its target would otherwise go
        // unread.
        let mut assignments: IndexMap<Signature, Vec<&InitAssign>> = IndexMap::new();
        for block in blocks {
            for assign in &block.assignments {
                let signature = Signature::new(block.name.node.clone(), assign.args.len());
                let pvar = self.table.require(&signature, block.name.span)?;
                if pvar.kind != kind {
                    return Err(CompileError::TypeMismatch {
                        context: format!("initialization of '{}'", signature),
                        expected: kind.to_string(),
                        actual: pvar.kind.to_string(),
                        span: block.name.span,
                    });
                }
                assignments.entry(signature).or_default().push(assign);
            }
        }

        let mut store = TensorStore::default();
        for pvar in self.table.by_kind(kind) {
            let assigns = assignments.get(&pvar.signature).map_or(&[][..], Vec::as_slice);
            store.insert(self.instantiate(pvar, assigns)?);
        }
        Ok(store)
    }

    /// Grounds one signature: default fill, then point overwrites.
    fn instantiate(&self, pvar: &PVariable, assigns: &[&InitAssign]) -> Result<Tensor> {
        let shape = grounded_shape(self.objects, pvar)?;
        self.check_limit(&pvar.signature, &shape)?;
        let elements = shape.num_elements().unwrap_or(0);
        let dtype = DType::from(pvar.value);

        let fill = match pvar.default {
            Some(default) => Some(convert(default, dtype, &pvar.signature, pvar.span)?),
            None => None,
        };
        let mut data = alloc(dtype, elements, fill.unwrap_or(Scalar::zero(dtype)));
        let mut assigned = if fill.is_none() {
            Some(vec![false; elements])
        } else {
            None
        };

        for assign in assigns {
            if assign.args.len() != pvar.params.len() {
                return Err(CompileError::ArityMismatch {
                    signature: pvar.signature.to_string(),
                    expected: pvar.params.len(),
                    actual: assign.args.len(),
                    span: assign.value.span,
                });
            }
            let mut index = Vec::with_capacity(assign.args.len());
            for (arg, ty) in assign.args.iter().zip(&pvar.params) {
                let object_type = self.objects.require(
                    ty,
                    &format!("parameter of '{}'", pvar.signature),
                    arg.span,
                )?;
                let position = object_type.index_of(&arg.node).ok_or_else(|| {
                    CompileError::UnknownObject {
                        object: arg.node.clone(),
                        ty: ty.clone(),
                        signature: pvar.signature.to_string(),
                        span: arg.span,
                    }
                })?;
                index.push(position);
            }
            // In-bounds by construction: each position came from the type's
            // own index map.
            let flat = shape.flat_index(&index).unwrap();
            let value = convert(assign.value.node, dtype, &pvar.signature, assign.value.span)?;
            write(&mut data, flat, value);
            if let Some(assigned) = assigned.as_mut() {
                assigned[flat] = true;
            }
        }

        if let Some(assigned) = assigned {
            if assigned.iter().any(|covered| !covered) {
                return Err(CompileError::MissingDefault {
                    signature: pvar.signature.to_string(),
                    what: "default value".to_string(),
                });
            }
        }

        Ok(Tensor::new(pvar.signature.clone(), shape, data))
    }

    fn check_limit(&self, signature: &Signature, shape: &Shape) -> Result<()> {
        let required: u128 = shape.dims().iter().map(|&d| d as u128).product();
        if required > self.max_elements as u128 {
            return Err(CompileError::ResourceLimitExceeded {
                signature: signature.to_string(),
                required,
                limit: self.max_elements,
            });
        }
        Ok(())
    }
}

/// The grounded shape of a signature: its parameter-type cardinalities in
/// declared order. Empty for arity 0.
pub fn grounded_shape(objects: &ObjectTable, pvar: &PVariable) -> Result<Shape> {
    let mut dims = Vec::with_capacity(pvar.params.len());
    for ty in &pvar.params {
        let object_type = objects.require(
            ty,
            &format!("parameter of '{}'", pvar.signature),
            pvar.span,
        )?;
        dims.push(object_type.size());
    }
    Ok(Shape::from(dims))
}

/// A dtype-checked scalar ready to store.
#[derive(Debug, Clone, Copy)]
enum Scalar {
    Real(f32),
    Int(i32),
    Bool(bool),
}

impl Scalar {
    fn zero(dtype: DType) -> Self {
        match dtype {
            DType::Real => Scalar::Real(0.0),
            DType::Int => Scalar::Int(0),
            DType::Bool => Scalar::Bool(false),
        }
    }
}

/// Narrows a source literal to the declared dtype. Int widens to Real;
/// Bool never mixes with numerics in either direction.
fn convert(literal: Literal, dtype: DType, signature: &Signature, span: Span) -> Result<Scalar> {
    let mismatch = || CompileError::TypeMismatch {
        context: format!("value for '{}'", signature),
        expected: dtype.to_string(),
        actual: literal.value_type().to_string(),
        span,
    };
    match (dtype, literal) {
        (DType::Real, Literal::Real(v)) => Ok(Scalar::Real(v as f32)),
        (DType::Real, Literal::Int(v)) => Ok(Scalar::Real(v as f32)),
        (DType::Int, Literal::Int(v)) => Ok(Scalar::Int(v as i32)),
        (DType::Bool, Literal::Bool(v)) => Ok(Scalar::Bool(v)),
        _ => Err(mismatch()),
    }
}

fn alloc(dtype: DType, elements: usize, fill: Scalar) -> TensorData {
    match (dtype, fill) {
        (DType::Real, Scalar::Real(v)) => TensorData::Real(vec![v; elements]),
        (DType::Int, Scalar::Int(v)) => TensorData::Int(vec![v; elements]),
        (DType::Bool, Scalar::Bool(v)) => TensorData::Bool(vec![v; elements]),
        // convert() already narrowed the fill to the dtype.
        _ => unreachable!("fill scalar does not match dtype"),
    }
}

fn write(data: &mut TensorData, flat: usize, value: Scalar) {
    match (data, value) {
        (TensorData::Real(v), Scalar::Real(x)) => v[flat] = x,
        (TensorData::Int(v), Scalar::Int(x)) => v[flat] = x,
        (TensorData::Bool(v), Scalar::Bool(x)) => v[flat] = x,
        _ => unreachable!("value scalar does not match tensor dtype"),
    }
}
