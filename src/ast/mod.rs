//! Abstract Syntax Tree consumed by the bytecode compiler.
//!
//! Trees are produced by an external parser and assumed well-formed.

pub mod expr;
pub mod stmt;

pub use expr::Expr;
pub use stmt::{BlockStatement, Program, Stmt};
