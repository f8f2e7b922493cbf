//! Expression AST nodes.

use crate::ast::stmt::BlockStatement;

/// All expression variants.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Identifier reference: foo
    Identifier(String),
    /// Integer literal: 42
    IntegerLiteral(i64),
    /// String literal: "hello"
    StringLiteral(String),
    /// Boolean literal: true, false
    Boolean(bool),

    /// Prefix operation: -x, !x
    Prefix { operator: String, right: Box<Expr> },

    /// Infix operation: a + b
    Infix {
        left: Box<Expr>,
        operator: String,
        right: Box<Expr>,
    },

    /// Conditional expression: if (cond) { ... } else { ... }
    If {
        condition: Box<Expr>,
        consequence: BlockStatement,
        alternative: Option<BlockStatement>,
    },

    /// Function literal: fn(a, b) { ... }
    ///
    /// `name` is filled in when the literal is the value of a `let`, so the
    /// body can refer to itself.
    Function {
        parameters: Vec<String>,
        body: BlockStatement,
        name: Option<String>,
    },

    /// Function call: foo(a, b)
    Call {
        function: Box<Expr>,
        arguments: Vec<Expr>,
    },

    /// Array literal: [1, 2, 3]
    Array(Vec<Expr>),

    /// Hash literal: {"key": "value", ...}
    Hash(Vec<(Expr, Expr)>),

    /// Index expression: arr[index]
    Index { left: Box<Expr>, index: Box<Expr> },
}

impl Expr {
    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Identifier(name.into())
    }

    pub fn int(value: i64) -> Self {
        Expr::IntegerLiteral(value)
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expr::StringLiteral(value.into())
    }

    pub fn bool(value: bool) -> Self {
        Expr::Boolean(value)
    }

    pub fn prefix(operator: impl Into<String>, right: Expr) -> Self {
        Expr::Prefix {
            operator: operator.into(),
            right: Box::new(right),
        }
    }

    pub fn infix(left: Expr, operator: impl Into<String>, right: Expr) -> Self {
        Expr::Infix {
            left: Box::new(left),
            operator: operator.into(),
            right: Box::new(right),
        }
    }

    pub fn if_else(
        condition: Expr,
        consequence: BlockStatement,
        alternative: Option<BlockStatement>,
    ) -> Self {
        Expr::If {
            condition: Box::new(condition),
            consequence,
            alternative,
        }
    }

    /// Anonymous function literal.
    pub fn function<S: Into<String>>(
        parameters: impl IntoIterator<Item = S>,
        body: BlockStatement,
    ) -> Self {
        Expr::Function {
            parameters: parameters.into_iter().map(Into::into).collect(),
            body,
            name: None,
        }
    }

    pub fn call(function: Expr, arguments: Vec<Expr>) -> Self {
        Expr::Call {
            function: Box::new(function),
            arguments,
        }
    }

    pub fn array(elements: Vec<Expr>) -> Self {
        Expr::Array(elements)
    }

    pub fn hash(pairs: Vec<(Expr, Expr)>) -> Self {
        Expr::Hash(pairs)
    }

    pub fn index(left: Expr, index: Expr) -> Self {
        Expr::Index {
            left: Box::new(left),
            index: Box::new(index),
        }
    }
}
