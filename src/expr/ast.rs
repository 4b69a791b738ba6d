//! Expression and statement syntax trees.
//!
//! These types are embedded in compiled view programs and therefore
//! serialize with serde.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An expression evaluated against the render scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// A constant value.
    Literal(Value),
    /// A variable lookup in the current scope.
    Var(String),
    /// `target.name`
    Member(Box<Expr>, String),
    /// `target[index]`
    Index(Box<Expr>, Box<Expr>),
    /// A call to a registered function or renderer intrinsic.
    Call { name: String, args: Vec<Expr> },
    /// A filter applied to a value, produced by `{{ value | filter(args) }}`.
    Filter {
        name: String,
        value: Box<Expr>,
        args: Vec<Expr>,
    },
    /// `!expr` / `-expr`
    Unary { op: UnaryOp, expr: Box<Expr> },
    /// `lhs op rhs`
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `cond ? then : otherwise`
    Ternary {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    /// `[a, b, c]`
    Array(Vec<Expr>),
    /// `{key: value}` or `['key' => value]`
    Object(Vec<(String, Expr)>),
    /// A capability check answered by the view host or the component.
    Check(Check),
}

/// Capability checks lowered from `@auth`, `@guest`, `@can`, `@cannot` and
/// `@hasComponentSlot`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Check {
    Authenticated,
    Guest,
    Allows { ability: String, args: Vec<Expr> },
    Denies { ability: String, args: Vec<Expr> },
    HasSlot(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Concat,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Coalesce,
}

/// A statement from a raw-code block or a counted loop header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    /// `name = value`, `name += value`, `name++`, ...
    Assign {
        target: String,
        op: AssignOp,
        value: Expr,
    },
    /// An expression evaluated for its effect (a function call).
    Eval(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignOp {
    Set,
    Add,
    Sub,
    Mul,
    Div,
    Concat,
}

impl AssignOp {
    /// The binary operator a compound assignment applies.
    pub fn binary(self) -> Option<BinaryOp> {
        match self {
            Self::Set => None,
            Self::Add => Some(BinaryOp::Add),
            Self::Sub => Some(BinaryOp::Sub),
            Self::Mul => Some(BinaryOp::Mul),
            Self::Div => Some(BinaryOp::Div),
            Self::Concat => Some(BinaryOp::Concat),
        }
    }
}

impl Expr {
    /// Shorthand for a string literal.
    pub fn string(s: impl Into<String>) -> Self {
        Self::Literal(Value::String(s.into()))
    }

    /// The string value if this expression is a string literal.
    pub fn as_str_literal(&self) -> Option<&str> {
        match self {
            Self::Literal(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Calls `f` with the name of every filter referenced by this expression.
    pub fn visit_filters<'a>(&'a self, f: &mut impl FnMut(&'a str)) {
        match self {
            Self::Literal(_) | Self::Var(_) => {}
            Self::Member(target, _) => target.visit_filters(f),
            Self::Index(target, index) => {
                target.visit_filters(f);
                index.visit_filters(f);
            }
            Self::Call { args, .. } => args.iter().for_each(|a| a.visit_filters(f)),
            Self::Filter { name, value, args } => {
                f(name);
                value.visit_filters(f);
                args.iter().for_each(|a| a.visit_filters(f));
            }
            Self::Unary { expr, .. } => expr.visit_filters(f),
            Self::Binary { lhs, rhs, .. } => {
                lhs.visit_filters(f);
                rhs.visit_filters(f);
            }
            Self::Ternary {
                cond,
                then,
                otherwise,
            } => {
                cond.visit_filters(f);
                then.visit_filters(f);
                otherwise.visit_filters(f);
            }
            Self::Array(items) => items.iter().for_each(|a| a.visit_filters(f)),
            Self::Object(entries) => entries.iter().for_each(|(_, v)| v.visit_filters(f)),
            Self::Check(Check::Allows { args, .. }) | Self::Check(Check::Denies { args, .. }) => {
                args.iter().for_each(|a| a.visit_filters(f))
            }
            Self::Check(_) => {}
        }
    }
}
