//! Expression compilation.
//!
//! Compiles defining expressions into the operation graph under a binding
//! environment ([`Scope`]) that maps each in-scope parameter variable to
//! the tensor axis carrying its object dimension. Literal object arguments
//! resolve to concrete indices through the object table and compile to axis
//! selects. Every compiled node in a definition carries the full current
//! scope shape, so element-wise operations are always same-shape; leaf
//! references are aligned with an explicit broadcast.

use groundflow_model::{
    AggregateOp, BinaryOp, Distribution, Expr, FluentDef, FluentKind, Literal, Signature, Span,
    Spanned, Term, TypedParam, UnaryOp, ValueType,
};
use groundflow_graph::{DType, NodeId, OpGraph, OpKind, OpNode, ReduceOp, Shape};
use indexmap::IndexMap;
use std::collections::HashMap;

use crate::error::{CompileError, Result};
use crate::instantiate::grounded_shape;
use crate::object_table::ObjectTable;
use crate::pvariables::{PVariable, PVariableTable};

/// Deterministic per-node seed stream.
///
/// Sampling nodes are pure functions of (parameter tensors, seed); the
/// compiler threads this counter through so repeated compilation of the
/// same model assigns identical seeds.
#[derive(Debug, Clone)]
pub struct SeedSequence {
    base: u64,
    count: u64,
}

impl SeedSequence {
    pub fn new(base: u64) -> Self {
        Self { base, count: 0 }
    }

    /// Next stream seed, mixed so adjacent counters land far apart.
    pub fn next_seed(&mut self) -> u64 {
        let n = self.count;
        self.count += 1;
        mix(self.base ^ n.wrapping_mul(0x9e3779b97f4a7c15))
    }
}

fn mix(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
    z ^ (z >> 31)
}

/// The binding environment: in-scope parameter variables, one tensor axis
/// each, in axis order.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    vars: Vec<ScopeVar>,
}

#[derive(Debug, Clone)]
struct ScopeVar {
    name: String,
    ty: String,
    size: usize,
}

impl Scope {
    pub fn push(&mut self, name: String, ty: String, size: usize) {
        self.vars.push(ScopeVar { name, ty, size });
    }

    pub fn pop(&mut self) {
        self.vars.pop();
    }

    pub fn rank(&self) -> usize {
        self.vars.len()
    }

    pub fn contains(&self, var: &str) -> bool {
        self.vars.iter().any(|v| v.name == var)
    }

    /// Axis carrying a variable's object dimension.
    pub fn axis_of(&self, var: &str) -> Option<usize> {
        self.vars.iter().position(|v| v.name == var)
    }

    pub fn var_type(&self, var: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|v| v.name == var)
            .map(|v| v.ty.as_str())
    }

    pub fn shape(&self) -> Shape {
        Shape(self.vars.iter().map(|v| v.size).collect())
    }
}

/// Key for interning constant nodes: literals compared by bit pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ConstKey {
    dtype: DType,
    bits: u64,
    dims: Vec<usize>,
}

fn literal_bits(literal: Literal) -> u64 {
    match literal {
        Literal::Real(v) => v.to_bits(),
        Literal::Int(v) => v as u64,
        Literal::Bool(v) => v as u64,
    }
}

/// Compiles defining expressions into one shared operation graph.
///
/// Input and constant nodes are interned so shared sub-nodes are referenced
/// rather than duplicated; each grounded signature becomes exactly one
/// input node.
pub struct ExprCompiler<'a> {
    objects: &'a ObjectTable,
    table: &'a PVariableTable,
    graph: OpGraph,
    inputs: IndexMap<Signature, NodeId>,
    consts: HashMap<ConstKey, NodeId>,
    interm_roots: IndexMap<Signature, NodeId>,
    seeds: SeedSequence,
    max_elements: usize,
    /// Signature currently being compiled, for diagnostics.
    current: String,
}

impl<'a> ExprCompiler<'a> {
    pub fn new(
        objects: &'a ObjectTable,
        table: &'a PVariableTable,
        seed: u64,
        max_elements: usize,
    ) -> Self {
        Self {
            objects,
            table,
            graph: OpGraph::new(),
            inputs: IndexMap::new(),
            consts: HashMap::new(),
            interm_roots: IndexMap::new(),
            seeds: SeedSequence::new(seed),
            max_elements,
            current: String::new(),
        }
    }

    /// Compiles one fluent definition. The root's dtype must agree with the
    /// declared value type (Int widening to a Real declaration is allowed).
    /// Intermediate roots are registered so later definitions can reference
    /// them directly.
    pub fn compile_fluent(&mut self, pvar: &PVariable, def: &FluentDef) -> Result<NodeId> {
        self.current = pvar.signature.to_string();
        let mut scope = Scope::default();
        for (var, ty) in def.params.iter().zip(&pvar.params) {
            if scope.contains(&var.node) {
                return Err(CompileError::UnsupportedExpression {
                    reason: format!("repeated parameter variable '{}'", var.node),
                    span: var.span,
                });
            }
            let object_type =
                self.objects
                    .require(ty, &format!("parameter of '{}'", pvar.signature), var.span)?;
            scope.push(var.node.clone(), ty.clone(), object_type.size());
        }

        let root = self.compile(&def.expr, &mut scope)?;
        let declared = DType::from(pvar.value);
        let actual = self.graph.node(root).dtype;
        let widens = declared == DType::Real && actual == DType::Int;
        if actual != declared && !widens {
            return Err(CompileError::TypeMismatch {
                context: format!("definition of '{}'", pvar.signature),
                expected: declared.to_string(),
                actual: actual.to_string(),
                span: def.expr.span,
            });
        }

        if pvar.kind == FluentKind::Intermediate {
            self.interm_roots.insert(pvar.signature.clone(), root);
        }
        Ok(root)
    }

    /// Compiles the reward expression in an empty scope; the result is a
    /// numeric scalar.
    pub fn compile_reward(&mut self, expr: &Spanned<Expr>) -> Result<NodeId> {
        self.current = "reward".to_string();
        let mut scope = Scope::default();
        let root = self.compile(expr, &mut scope)?;
        if !self.graph.node(root).dtype.is_numeric() {
            return Err(CompileError::TypeMismatch {
                context: "reward".to_string(),
                expected: "real".to_string(),
                actual: self.graph.node(root).dtype.to_string(),
                span: expr.span,
            });
        }
        Ok(root)
    }

    /// The unique input node for a grounded signature, created on first use.
    pub fn input_node(&mut self, pvar: &PVariable) -> Result<NodeId> {
        if let Some(&id) = self.inputs.get(&pvar.signature) {
            return Ok(id);
        }
        let shape = grounded_shape(self.objects, pvar)?;
        let id = self.graph.push(OpNode {
            kind: OpKind::Input {
                tensor: format!("{}:0", pvar.signature),
            },
            shape,
            dtype: DType::from(pvar.value),
        });
        self.inputs.insert(pvar.signature.clone(), id);
        Ok(id)
    }

    /// Tears the compiler down into its graph and input map.
    pub fn finish(self) -> (OpGraph, IndexMap<Signature, NodeId>) {
        (self.graph, self.inputs)
    }

    fn compile(&mut self, expr: &Spanned<Expr>, scope: &mut Scope) -> Result<NodeId> {
        match &expr.node {
            Expr::Const(literal) => Ok(self.const_node(*literal, scope)),
            Expr::PVar { name, args } => self.compile_pvar(name, args, expr.span, scope),
            Expr::Unary { op, operand } => self.compile_unary(*op, operand, scope),
            Expr::Binary { op, lhs, rhs } => self.compile_binary(*op, lhs, rhs, scope),
            Expr::If { cond, then, orelse } => self.compile_if(cond, then, orelse, scope),
            Expr::Aggregate { op, params, body } => {
                self.compile_aggregate(*op, params, body, scope)
            }
            Expr::Random { dist, args } => self.compile_random(*dist, args, expr.span, scope),
        }
    }

    fn const_node(&mut self, literal: Literal, scope: &Scope) -> NodeId {
        let shape = scope.shape();
        let dtype = DType::from(literal.value_type());
        let key = ConstKey {
            dtype,
            bits: literal_bits(literal),
            dims: shape.0.clone(),
        };
        if let Some(&id) = self.consts.get(&key) {
            return id;
        }
        let id = self.graph.push(OpNode {
            kind: OpKind::Const { value: literal },
            shape,
            dtype,
        });
        self.consts.insert(key, id);
        id
    }

    fn compile_pvar(
        &mut self,
        name: &str,
        args: &[Spanned<Term>],
        span: Span,
        scope: &mut Scope,
    ) -> Result<NodeId> {
        let signature = Signature::new(name.to_string(), args.len());
        let pvar = self.table.require(&signature, span)?;

        // Intermediates resolve to their already-compiled roots; everything
        // else is an input bound at evaluation time.
        let mut node = match pvar.kind {
            FluentKind::Intermediate => self.interm_roots.get(&signature).copied().ok_or_else(
                || CompileError::CyclicDependency {
                    involved: vec![signature.to_string()],
                },
            )?,
            _ => self.input_node(pvar)?,
        };

        // Fix literal-object axes, keep variable axes.
        let mut kept: Vec<String> = Vec::new();
        let mut axis = 0usize;
        for (position, (arg, ty)) in args.iter().zip(&pvar.params).enumerate() {
            match &arg.node {
                Term::Object(object) => {
                    let object_type = self.objects.require(
                        ty,
                        &format!("parameter of '{}'", signature),
                        arg.span,
                    )?;
                    let index = object_type.index_of(object).ok_or_else(|| {
                        CompileError::UnknownObject {
                            object: object.clone(),
                            ty: ty.clone(),
                            signature: signature.to_string(),
                            span: arg.span,
                        }
                    })?;
                    let prev = self.graph.node(node);
                    let mut dims = prev.shape.0.clone();
                    let dtype = prev.dtype;
                    dims.remove(axis);
                    node = self.graph.push(OpNode {
                        kind: OpKind::Select {
                            src: node,
                            axis,
                            index,
                        },
                        shape: Shape(dims),
                        dtype,
                    });
                }
                Term::Var(var) => {
                    let declared = scope.var_type(var).ok_or_else(|| {
                        CompileError::UnsupportedExpression {
                            reason: format!("unbound parameter variable '{}'", var),
                            span: arg.span,
                        }
                    })?;
                    if declared != ty {
                        return Err(CompileError::TypeMismatch {
                            context: format!("argument {} of '{}'", position + 1, signature),
                            expected: ty.clone(),
                            actual: declared.to_string(),
                            span: arg.span,
                        });
                    }
                    if kept.iter().any(|v| v == var) {
                        return Err(CompileError::UnsupportedExpression {
                            reason: format!("repeated parameter variable '{}'", var),
                            span: arg.span,
                        });
                    }
                    kept.push(var.clone());
                    axis += 1;
                }
            }
        }

        // Align the remaining axes into the scope layout.
        let target_axes: Vec<usize> = kept
            .iter()
            .map(|var| scope.axis_of(var).unwrap())
            .collect();
        let aligned = kept.len() == scope.rank()
            && target_axes.iter().enumerate().all(|(i, &a)| i == a);
        if aligned {
            return Ok(node);
        }
        let dtype = self.graph.node(node).dtype;
        Ok(self.graph.push(OpNode {
            kind: OpKind::Broadcast {
                src: node,
                axes: target_axes,
            },
            shape: scope.shape(),
            dtype,
        }))
    }

    fn compile_unary(
        &mut self,
        op: UnaryOp,
        operand: &Spanned<Expr>,
        scope: &mut Scope,
    ) -> Result<NodeId> {
        let src = self.compile(operand, scope)?;
        let dtype = self.graph.node(src).dtype;
        match op {
            UnaryOp::Neg if !dtype.is_numeric() => {
                return Err(self.type_mismatch("negation", "real", dtype, operand.span));
            }
            UnaryOp::Not if dtype != DType::Bool => {
                return Err(self.type_mismatch("negation", "bool", dtype, operand.span));
            }
            _ => {}
        }
        Ok(self.graph.push(OpNode {
            kind: OpKind::Unary { op, src },
            shape: scope.shape(),
            dtype,
        }))
    }

    fn compile_binary(
        &mut self,
        op: BinaryOp,
        lhs: &Spanned<Expr>,
        rhs: &Spanned<Expr>,
        scope: &mut Scope,
    ) -> Result<NodeId> {
        let left = self.compile(lhs, scope)?;
        let right = self.compile(rhs, scope)?;
        let lt = self.graph.node(left).dtype;
        let rt = self.graph.node(right).dtype;
        let context = format!("'{}'", symbol(op));

        let dtype = if op.is_connective() {
            if lt != DType::Bool {
                return Err(self.type_mismatch(&context, "bool", lt, lhs.span));
            }
            if rt != DType::Bool {
                return Err(self.type_mismatch(&context, "bool", rt, rhs.span));
            }
            DType::Bool
        } else if op.is_comparison() {
            let equality = matches!(op, BinaryOp::Eq | BinaryOp::Ne);
            if equality && lt == DType::Bool && rt == DType::Bool {
                DType::Bool
            } else {
                if !lt.is_numeric() {
                    return Err(self.type_mismatch(&context, "real", lt, lhs.span));
                }
                if !rt.is_numeric() {
                    return Err(self.type_mismatch(&context, "real", rt, rhs.span));
                }
                DType::Bool
            }
        } else {
            match DType::promote(lt, rt) {
                Some(dtype) => dtype,
                None => {
                    let (offender, offender_span) =
                        if lt == DType::Bool { (lt, lhs.span) } else { (rt, rhs.span) };
                    return Err(self.type_mismatch(&context, "real", offender, offender_span));
                }
            }
        };

        Ok(self.graph.push(OpNode {
            kind: OpKind::Binary {
                op,
                lhs: left,
                rhs: right,
            },
            shape: scope.shape(),
            dtype,
        }))
    }

    fn compile_if(
        &mut self,
        cond: &Spanned<Expr>,
        then: &Spanned<Expr>,
        orelse: &Spanned<Expr>,
        scope: &mut Scope,
    ) -> Result<NodeId> {
        let cond_node = self.compile(cond, scope)?;
        let cond_dtype = self.graph.node(cond_node).dtype;
        if cond_dtype != DType::Bool {
            return Err(self.type_mismatch("condition", "bool", cond_dtype, cond.span));
        }
        let then_node = self.compile(then, scope)?;
        let else_node = self.compile(orelse, scope)?;
        let tt = self.graph.node(then_node).dtype;
        let et = self.graph.node(else_node).dtype;
        let dtype = if tt == DType::Bool && et == DType::Bool {
            DType::Bool
        } else {
            match DType::promote(tt, et) {
                Some(dtype) => dtype,
                None => {
                    return Err(self.type_mismatch("conditional branches", &tt.to_string(), et, orelse.span));
                }
            }
        };
        Ok(self.graph.push(OpNode {
            kind: OpKind::If {
                cond: cond_node,
                then: then_node,
                orelse: else_node,
            },
            shape: scope.shape(),
            dtype,
        }))
    }

    fn compile_aggregate(
        &mut self,
        op: AggregateOp,
        params: &[TypedParam],
        body: &Spanned<Expr>,
        scope: &mut Scope,
    ) -> Result<NodeId> {
        for param in params {
            if scope.contains(&param.var.node) {
                return Err(CompileError::UnsupportedExpression {
                    reason: format!("shadowed parameter variable '{}'", param.var.node),
                    span: param.var.span,
                });
            }
            let object_type =
                self.objects
                    .require(&param.ty.node, "aggregation parameter", param.ty.span)?;
            scope.push(
                param.var.node.clone(),
                param.ty.node.clone(),
                object_type.size(),
            );
        }
        self.check_limit(scope)?;

        // Relational gather: a conditional sum whose condition is a boolean
        // adjacency non-fluent over the quantified parameter.
        if let Some(node) = self.try_gather(op, params, body, scope)? {
            for _ in params {
                scope.pop();
            }
            return Ok(node);
        }

        let mut node = self.compile(body, scope)?;
        let dtype = self.graph.node(node).dtype;
        let reduce = reduce_op(op);
        let boolean = matches!(op, AggregateOp::Exists | AggregateOp::Forall);
        if boolean && dtype != DType::Bool {
            return Err(self.type_mismatch(aggregate_name(op), "bool", dtype, body.span));
        }
        if !boolean && !dtype.is_numeric() {
            return Err(self.type_mismatch(aggregate_name(op), "real", dtype, body.span));
        }

        // Reduce the quantified axes, innermost first.
        for _ in params {
            let axis = scope.rank() - 1;
            scope.pop();
            node = self.graph.push(OpNode {
                kind: OpKind::Reduce {
                    op: reduce,
                    src: node,
                    axis,
                },
                shape: scope.shape(),
                dtype,
            });
        }
        Ok(node)
    }

    /// Detects `sum_{?v : t} [if REL(...) then v else 0]` with `REL` a
    /// boolean non-fluent indexing the quantified parameter, and compiles it
    /// as a single masked reduction. Returns `Ok(None)` when the body does
    /// not match; the generic path handles it.
    fn try_gather(
        &mut self,
        op: AggregateOp,
        params: &[TypedParam],
        body: &Spanned<Expr>,
        scope: &mut Scope,
    ) -> Result<Option<NodeId>> {
        if op != AggregateOp::Sum || params.len() != 1 {
            return Ok(None);
        }
        let Expr::If { cond, then, orelse } = &body.node else {
            return Ok(None);
        };
        if !matches!(
            orelse.node,
            Expr::Const(Literal::Real(v)) if v == 0.0
        ) && !matches!(orelse.node, Expr::Const(Literal::Int(0)))
        {
            return Ok(None);
        }
        let Expr::PVar { name, args } = &cond.node else {
            return Ok(None);
        };
        let signature = Signature::new(name.clone(), args.len());
        let Some(relation) = self.table.get(&signature) else {
            return Ok(None);
        };
        if relation.kind != FluentKind::NonFluent || relation.value != ValueType::Bool {
            return Ok(None);
        }
        let quantified = &params[0].var.node;
        let indexes_quantified = args
            .iter()
            .any(|arg| matches!(&arg.node, Term::Var(v) if v == quantified));
        if !indexes_quantified {
            return Ok(None);
        }

        let mask = self.compile(cond, scope)?;
        let src = self.compile(then, scope)?;
        let dtype = self.graph.node(src).dtype;
        if !dtype.is_numeric() {
            return Err(self.type_mismatch("sum", "real", dtype, then.span));
        }
        let axis = scope.rank() - 1;
        let mut dims = scope.shape().0;
        dims.pop();
        Ok(Some(self.graph.push(OpNode {
            kind: OpKind::Gather {
                mask,
                src,
                op: ReduceOp::Sum,
                axis,
            },
            shape: Shape(dims),
            dtype,
        })))
    }

    fn compile_random(
        &mut self,
        dist: Distribution,
        args: &[Spanned<Expr>],
        span: Span,
        scope: &mut Scope,
    ) -> Result<NodeId> {
        if args.len() != dist.param_count() {
            return Err(CompileError::ArityMismatch {
                signature: dist.to_string(),
                expected: dist.param_count(),
                actual: args.len(),
                span,
            });
        }
        let mut compiled = Vec::with_capacity(args.len());
        for arg in args {
            let node = self.compile(arg, scope)?;
            let dtype = self.graph.node(node).dtype;
            if !dtype.is_numeric() {
                return Err(self.type_mismatch(
                    &format!("parameter of {}", dist),
                    "real",
                    dtype,
                    arg.span,
                ));
            }
            compiled.push(node);
        }
        let dtype = match dist {
            Distribution::Bernoulli => DType::Bool,
            Distribution::Poisson => DType::Int,
            _ => DType::Real,
        };
        // One independent stream per sampling site.
        let seed = self.seeds.next_seed();
        Ok(self.graph.push(OpNode {
            kind: OpKind::Sample {
                dist,
                args: compiled,
                seed,
            },
            shape: scope.shape(),
            dtype,
        }))
    }

    fn check_limit(&self, scope: &Scope) -> Result<()> {
        let required: u128 = scope.shape().dims().iter().map(|&d| d as u128).product();
        if required > self.max_elements as u128 {
            return Err(CompileError::ResourceLimitExceeded {
                signature: self.current.clone(),
                required,
                limit: self.max_elements,
            });
        }
        Ok(())
    }

    fn type_mismatch(
        &self,
        context: &str,
        expected: &str,
        actual: DType,
        span: Span,
    ) -> CompileError {
        CompileError::TypeMismatch {
            context: format!("{} in '{}'", context, self.current),
            expected: expected.to_string(),
            actual: actual.to_string(),
            span,
        }
    }
}

fn reduce_op(op: AggregateOp) -> ReduceOp {
    match op {
        AggregateOp::Sum => ReduceOp::Sum,
        AggregateOp::Prod => ReduceOp::Prod,
        AggregateOp::Exists => ReduceOp::Any,
        AggregateOp::Forall => ReduceOp::All,
        AggregateOp::Min => ReduceOp::Min,
        AggregateOp::Max => ReduceOp::Max,
    }
}

fn aggregate_name(op: AggregateOp) -> &'static str {
    match op {
        AggregateOp::Sum => "sum",
        AggregateOp::Prod => "prod",
        AggregateOp::Exists => "exists",
        AggregateOp::Forall => "forall",
        AggregateOp::Min => "min",
        AggregateOp::Max => "max",
    }
}

fn symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Lt => "<",
        BinaryOp::Le => "<=",
        BinaryOp::Gt => ">",
        BinaryOp::Ge => ">=",
        BinaryOp::Eq => "==",
        BinaryOp::Ne => "~=",
        BinaryOp::And => "^",
        BinaryOp::Or => "|",
        BinaryOp::Implies => "=>",
    }
}
