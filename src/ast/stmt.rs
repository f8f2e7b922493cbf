//! Statement AST nodes.

use crate::ast::expr::Expr;

/// A complete program.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

impl Program {
    pub fn new(statements: Vec<Stmt>) -> Self {
        Self { statements }
    }
}

/// A braced sequence of statements, used for function bodies and `if` arms.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BlockStatement {
    pub statements: Vec<Stmt>,
}

impl BlockStatement {
    pub fn new(statements: Vec<Stmt>) -> Self {
        Self { statements }
    }
}

/// All statement variants.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Binding: let name = value;
    Let { name: String, value: Expr },
    /// Return: return value;
    Return(Expr),
    /// Expression used as a statement: value;
    Expression(Expr),
}

impl Stmt {
    /// Build a `let` statement. A function literal on the right-hand side
    /// takes the binding name so it can call itself.
    pub fn let_(name: impl Into<String>, value: Expr) -> Self {
        let name = name.into();
        let value = match value {
            Expr::Function {
                parameters,
                body,
                name: None,
            } => Expr::Function {
                parameters,
                body,
                name: Some(name.clone()),
            },
            other => other,
        };
        Stmt::Let { name, value }
    }

    pub fn ret(value: Expr) -> Self {
        Stmt::Return(value)
    }

    pub fn expr(value: Expr) -> Self {
        Stmt::Expression(value)
    }
}
