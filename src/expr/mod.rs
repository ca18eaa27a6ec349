//! Small algebraic expression language.
//!
//! Pipeline:
//!
//! - `lexer`: text -> tokens (with byte offsets for diagnostics)
//! - `parser`: tokens -> typed AST (`Expr`)
//! - `program`: AST + variable slot order -> flat postfix `Program`
//!
//! Evaluation never leaves this module's interpreter: there is no host-language
//! `eval`, so a user expression can only ever compute a number.

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod program;

pub use ast::*;
pub use parser::parse;
pub use program::*;

/// Parse / compile diagnostics.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExprError {
    #[error("empty expression")]
    Empty,

    #[error("unexpected character '{ch}' at position {offset}")]
    UnexpectedChar { ch: char, offset: usize },

    #[error("invalid number '{text}' at position {offset}")]
    InvalidNumber { text: String, offset: usize },

    #[error("unexpected {found} at position {offset}, expected {expected}")]
    UnexpectedToken {
        found: String,
        expected: &'static str,
        offset: usize,
    },

    #[error("unknown function '{name}' at position {offset}")]
    UnknownFunction { name: String, offset: usize },

    #[error("function '{name}' takes exactly one argument")]
    Arity { name: String },

    #[error("unbound symbol '{0}'")]
    UnboundSymbol(String),

    #[error("expression nested too deeply at position {offset} (limit {limit})")]
    TooDeep { offset: usize, limit: usize },

    #[error("expression too long (more than {limit} tokens)")]
    TooLong { limit: usize },
}
