//! The expression language embedded in templates.
//!
//! Echoes, conditions, loop headers and raw-code blocks all share one small
//! language: literals, variables, member and index access, calls to
//! registered functions, the usual operators and array/object literals.
//! Source text is parsed once at compile time into [`Expr`] / [`Stmt`]
//! trees that travel inside the compiled program.

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod value;

pub use ast::{AssignOp, BinaryOp, Check, Expr, Stmt, UnaryOp};
pub use parser::{
    parse_args, parse_expr, parse_for, parse_foreach, parse_statements, split_top_level,
    ForHeader, ForeachHeader,
};

use thiserror::Error;

/// An expression could not be tokenized or parsed.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
