//! Model-building harness for integration tests.
//!
//! Provides expression builder helpers and the reservoir-network fixture:
//! eight reservoirs in a partly-linear network, stochastic rainfall, and a
//! level-band reward. The fixture exercises every compiler feature —
//! grounding, relational gather, aggregation, sampling, and precondition
//! partitioning.

use groundflow_model::{
    AggregateOp, BinaryOp, Distribution, Expr, FluentDef, FluentKind, InitAssign, InitBlock,
    Literal, Model, PVarDecl, Spanned, Term, TypeDecl, TypedParam, UnaryOp, ValueType,
};

// ---------------------------------------------------------------------------
// Expression builders
// ---------------------------------------------------------------------------

pub fn real(value: f64) -> Spanned<Expr> {
    Spanned::synthetic(Expr::Const(Literal::Real(value)))
}

/// Variable reference; arguments starting with `?` are parameter variables,
/// anything else is a literal object name.
pub fn pvar(name: &str, args: &[&str]) -> Spanned<Expr> {
    Spanned::synthetic(Expr::PVar {
        name: name.to_string(),
        args: args
            .iter()
            .map(|a| {
                let term = if a.starts_with('?') {
                    Term::Var(a.to_string())
                } else {
                    Term::Object(a.to_string())
                };
                Spanned::synthetic(term)
            })
            .collect(),
    })
}

pub fn binary(op: BinaryOp, lhs: Spanned<Expr>, rhs: Spanned<Expr>) -> Spanned<Expr> {
    Spanned::synthetic(Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    })
}

pub fn add(lhs: Spanned<Expr>, rhs: Spanned<Expr>) -> Spanned<Expr> {
    binary(BinaryOp::Add, lhs, rhs)
}

pub fn sub(lhs: Spanned<Expr>, rhs: Spanned<Expr>) -> Spanned<Expr> {
    binary(BinaryOp::Sub, lhs, rhs)
}

pub fn mul(lhs: Spanned<Expr>, rhs: Spanned<Expr>) -> Spanned<Expr> {
    binary(BinaryOp::Mul, lhs, rhs)
}

pub fn neg(operand: Spanned<Expr>) -> Spanned<Expr> {
    Spanned::synthetic(Expr::Unary {
        op: UnaryOp::Neg,
        operand: Box::new(operand),
    })
}

pub fn ite(cond: Spanned<Expr>, then: Spanned<Expr>, orelse: Spanned<Expr>) -> Spanned<Expr> {
    Spanned::synthetic(Expr::If {
        cond: Box::new(cond),
        then: Box::new(then),
        orelse: Box::new(orelse),
    })
}

pub fn aggregate(op: AggregateOp, var: &str, ty: &str, body: Spanned<Expr>) -> Spanned<Expr> {
    Spanned::synthetic(Expr::Aggregate {
        op,
        params: vec![TypedParam {
            var: Spanned::synthetic(var.to_string()),
            ty: Spanned::synthetic(ty.to_string()),
        }],
        body: Box::new(body),
    })
}

pub fn random(dist: Distribution, args: Vec<Spanned<Expr>>) -> Spanned<Expr> {
    Spanned::synthetic(Expr::Random { dist, args })
}

// ---------------------------------------------------------------------------
// Declaration builders
// ---------------------------------------------------------------------------

pub fn type_decl(name: &str, objects: &[&str]) -> TypeDecl {
    TypeDecl {
        name: Spanned::synthetic(name.to_string()),
        objects: objects
            .iter()
            .map(|o| Spanned::synthetic(o.to_string()))
            .collect(),
    }
}

pub fn pvar_decl(
    name: &str,
    kind: FluentKind,
    params: &[&str],
    value: ValueType,
    default: Option<Literal>,
) -> PVarDecl {
    PVarDecl {
        name: Spanned::synthetic(name.to_string()),
        kind,
        params: params
            .iter()
            .map(|p| Spanned::synthetic(p.to_string()))
            .collect(),
        value,
        default: default.map(Spanned::synthetic),
    }
}

pub fn init_block(name: &str, assigns: &[(&[&str], Literal)]) -> InitBlock {
    InitBlock {
        name: Spanned::synthetic(name.to_string()),
        assignments: assigns
            .iter()
            .map(|(args, value)| InitAssign {
                args: args
                    .iter()
                    .map(|a| Spanned::synthetic(a.to_string()))
                    .collect(),
                value: Spanned::synthetic(*value),
            })
            .collect(),
    }
}

pub fn fluent_def(name: &str, params: &[&str], expr: Spanned<Expr>) -> FluentDef {
    FluentDef {
        name: Spanned::synthetic(name.to_string()),
        params: params
            .iter()
            .map(|p| Spanned::synthetic(p.to_string()))
            .collect(),
        expr,
    }
}

// ---------------------------------------------------------------------------
// The reservoir-network fixture
// ---------------------------------------------------------------------------

/// Eight reservoirs `t1..t8` feeding each other along a fixed downstream
/// relation. Water evaporates, rains in (Gamma-distributed), overflows past
/// capacity, and is released by the `outflow` action; reward penalizes
/// levels outside each reservoir's safe band.
pub fn reservoir() -> Model {
    let mut model = Model::empty();

    model.types = vec![type_decl(
        "res",
        &["t1", "t2", "t3", "t4", "t5", "t6", "t7", "t8"],
    )];

    model.pvariables = vec![
        pvar_decl(
            "MAX_RES_CAP",
            FluentKind::NonFluent,
            &["res"],
            ValueType::Real,
            Some(Literal::Real(100.0)),
        ),
        pvar_decl(
            "UPPER_BOUND",
            FluentKind::NonFluent,
            &["res"],
            ValueType::Real,
            Some(Literal::Real(80.0)),
        ),
        pvar_decl(
            "LOWER_BOUND",
            FluentKind::NonFluent,
            &["res"],
            ValueType::Real,
            Some(Literal::Real(20.0)),
        ),
        pvar_decl(
            "RAIN_SHAPE",
            FluentKind::NonFluent,
            &["res"],
            ValueType::Real,
            Some(Literal::Real(1.0)),
        ),
        pvar_decl(
            "RAIN_SCALE",
            FluentKind::NonFluent,
            &["res"],
            ValueType::Real,
            Some(Literal::Real(5.0)),
        ),
        pvar_decl(
            "DOWNSTREAM",
            FluentKind::NonFluent,
            &["res", "res"],
            ValueType::Bool,
            Some(Literal::Bool(false)),
        ),
        pvar_decl(
            "SINK_RES",
            FluentKind::NonFluent,
            &["res"],
            ValueType::Bool,
            Some(Literal::Bool(false)),
        ),
        pvar_decl(
            "MAX_WATER_EVAP_FRAC_PER_TIME_UNIT",
            FluentKind::NonFluent,
            &[],
            ValueType::Real,
            Some(Literal::Real(0.05)),
        ),
        pvar_decl(
            "LOW_PENALTY",
            FluentKind::NonFluent,
            &["res"],
            ValueType::Real,
            Some(Literal::Real(-5.0)),
        ),
        pvar_decl(
            "HIGH_PENALTY",
            FluentKind::NonFluent,
            &["res"],
            ValueType::Real,
            Some(Literal::Real(-10.0)),
        ),
        pvar_decl(
            "evaporated",
            FluentKind::Intermediate,
            &["res"],
            ValueType::Real,
            None,
        ),
        pvar_decl(
            "rainfall",
            FluentKind::Intermediate,
            &["res"],
            ValueType::Real,
            None,
        ),
        pvar_decl(
            "overflow",
            FluentKind::Intermediate,
            &["res"],
            ValueType::Real,
            None,
        ),
        pvar_decl(
            "rlevel",
            FluentKind::State,
            &["res"],
            ValueType::Real,
            Some(Literal::Real(50.0)),
        ),
        pvar_decl(
            "outflow",
            FluentKind::Action,
            &["res"],
            ValueType::Real,
            Some(Literal::Real(0.0)),
        ),
    ];

    model.non_fluent_init = vec![
        init_block(
            "MAX_RES_CAP",
            &[
                (&["t3"], Literal::Real(200.0)),
                (&["t4"], Literal::Real(300.0)),
                (&["t5"], Literal::Real(400.0)),
                (&["t6"], Literal::Real(500.0)),
                (&["t7"], Literal::Real(800.0)),
                (&["t8"], Literal::Real(1000.0)),
            ],
        ),
        init_block(
            "UPPER_BOUND",
            &[
                (&["t3"], Literal::Real(180.0)),
                (&["t4"], Literal::Real(280.0)),
                (&["t5"], Literal::Real(380.0)),
                (&["t6"], Literal::Real(480.0)),
                (&["t7"], Literal::Real(780.0)),
                (&["t8"], Literal::Real(980.0)),
            ],
        ),
        init_block(
            "RAIN_SCALE",
            &[
                (&["t2"], Literal::Real(3.0)),
                (&["t3"], Literal::Real(9.0)),
                (&["t4"], Literal::Real(7.0)),
                (&["t5"], Literal::Real(15.0)),
                (&["t6"], Literal::Real(13.0)),
                (&["t7"], Literal::Real(25.0)),
                (&["t8"], Literal::Real(30.0)),
            ],
        ),
        init_block(
            "DOWNSTREAM",
            &[
                (&["t1", "t6"], Literal::Bool(true)),
                (&["t2", "t3"], Literal::Bool(true)),
                (&["t3", "t5"], Literal::Bool(true)),
                (&["t4", "t8"], Literal::Bool(true)),
                (&["t5", "t7"], Literal::Bool(true)),
                (&["t6", "t7"], Literal::Bool(true)),
                (&["t7", "t8"], Literal::Bool(true)),
            ],
        ),
        init_block("SINK_RES", &[(&["t8"], Literal::Bool(true))]),
    ];

    model.state_init = vec![init_block("rlevel", &[(&["t1"], Literal::Real(75.0))])];

    // Release is bounded by the current level and non-negative; both touch
    // only the outflow action, so both partition as local.
    model.preconditions = vec![
        aggregate(
            AggregateOp::Forall,
            "?r",
            "res",
            binary(
                BinaryOp::Le,
                pvar("outflow", &["?r"]),
                pvar("rlevel", &["?r"]),
            ),
        ),
        aggregate(
            AggregateOp::Forall,
            "?r",
            "res",
            binary(BinaryOp::Ge, pvar("outflow", &["?r"]), real(0.0)),
        ),
    ];

    model.intermediate_defs = vec![
        fluent_def(
            "evaporated",
            &["?r"],
            mul(
                pvar("MAX_WATER_EVAP_FRAC_PER_TIME_UNIT", &[]),
                pvar("rlevel", &["?r"]),
            ),
        ),
        fluent_def(
            "rainfall",
            &["?r"],
            random(
                Distribution::Gamma,
                vec![pvar("RAIN_SHAPE", &["?r"]), pvar("RAIN_SCALE", &["?r"])],
            ),
        ),
        fluent_def(
            "overflow",
            &["?r"],
            ite(
                binary(
                    BinaryOp::Gt,
                    sub(pvar("rlevel", &["?r"]), pvar("outflow", &["?r"])),
                    pvar("MAX_RES_CAP", &["?r"]),
                ),
                sub(
                    sub(pvar("rlevel", &["?r"]), pvar("outflow", &["?r"])),
                    pvar("MAX_RES_CAP", &["?r"]),
                ),
                real(0.0),
            ),
        ),
    ];

    // Water balance: current level, plus rain and upstream releases, minus
    // evaporation, release, and overflow.
    let inflow = aggregate(
        AggregateOp::Sum,
        "?up",
        "res",
        ite(
            pvar("DOWNSTREAM", &["?up", "?r"]),
            add(pvar("outflow", &["?up"]), pvar("overflow", &["?up"])),
            real(0.0),
        ),
    );
    model.transition_defs = vec![fluent_def(
        "rlevel",
        &["?r"],
        add(
            sub(
                sub(
                    sub(
                        add(pvar("rlevel", &["?r"]), pvar("rainfall", &["?r"])),
                        pvar("evaporated", &["?r"]),
                    ),
                    pvar("outflow", &["?r"]),
                ),
                pvar("overflow", &["?r"]),
            ),
            inflow,
        ),
    )];

    model.reward = aggregate(
        AggregateOp::Sum,
        "?r",
        "res",
        ite(
            binary(
                BinaryOp::And,
                binary(
                    BinaryOp::Ge,
                    pvar("rlevel", &["?r"]),
                    pvar("LOWER_BOUND", &["?r"]),
                ),
                binary(
                    BinaryOp::Le,
                    pvar("rlevel", &["?r"]),
                    pvar("UPPER_BOUND", &["?r"]),
                ),
            ),
            real(0.0),
            ite(
                binary(
                    BinaryOp::Lt,
                    pvar("rlevel", &["?r"]),
                    pvar("LOWER_BOUND", &["?r"]),
                ),
                mul(
                    pvar("LOW_PENALTY", &["?r"]),
                    sub(pvar("LOWER_BOUND", &["?r"]), pvar("rlevel", &["?r"])),
                ),
                mul(
                    pvar("HIGH_PENALTY", &["?r"]),
                    sub(pvar("rlevel", &["?r"]), pvar("UPPER_BOUND", &["?r"])),
                ),
            ),
        ),
    );

    model
}
