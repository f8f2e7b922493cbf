//! Error types for compilation and execution.

use thiserror::Error;

/// Instruction encoding errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("{op} expects {expected} operands, got {got}")]
    OperandCount {
        op: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("operand {value} does not fit in {width} bytes for {op}")]
    OperandOverflow {
        op: &'static str,
        value: usize,
        width: usize,
    },
}

/// Bytecode compilation errors.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("unknown operator: {0}")]
    UnknownOperator(String),

    #[error("undefined variable: {0}")]
    UndefinedVariable(String),

    #[error(transparent)]
    Encode(#[from] EncodeError),
}

impl CompileError {
    pub fn unknown_operator(operator: impl Into<String>) -> Self {
        Self::UnknownOperator(operator.into())
    }

    pub fn undefined_variable(name: impl Into<String>) -> Self {
        Self::UndefinedVariable(name.into())
    }
}

/// Runtime errors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("stack overflow")]
    StackOverflow,

    #[error("call depth exceeded {0} frames")]
    FrameOverflow(usize),

    #[error("stack underflow")]
    StackUnderflow,

    #[error("unsupported types for binary operation: {left} {operator} {right}")]
    TypeMismatch {
        left: &'static str,
        operator: &'static str,
        right: &'static str,
    },

    #[error("unsupported type for {operator}: {operand}")]
    UnsupportedOperand {
        operator: &'static str,
        operand: &'static str,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("calling non-function: {0}")]
    NotCallable(&'static str),

    #[error("wrong number of arguments: want={expected}, got={got}")]
    WrongArity { expected: usize, got: usize },

    #[error("unusable as hash key: {0}")]
    UnusableHashKey(&'static str),

    #[error("index operator not supported: {left}[{index}]")]
    IndexNotSupported {
        left: &'static str,
        index: &'static str,
    },

    #[error("unbound global slot {0}")]
    UnboundGlobal(usize),

    #[error("global slot {index} exceeds the limit of {limit}")]
    TooManyGlobals { index: usize, limit: usize },

    #[error("local slot {0} out of range")]
    InvalidLocal(usize),

    #[error("unknown builtin {0}")]
    UnknownBuiltin(usize),

    #[error("free variable {0} out of range")]
    UnboundFree(usize),

    #[error("not a function constant: {0}")]
    NotAFunction(&'static str),

    #[error("invalid constant index {0}")]
    InvalidConstant(usize),

    #[error("invalid opcode {0}")]
    InvalidOpcode(u8),

    #[error("instruction stream ends mid-instruction at {0}")]
    TruncatedInstruction(usize),

    #[error("no active call frame")]
    NoFrame,

    #[error("instruction budget of {0} exhausted")]
    BudgetExhausted(u64),
}

impl RuntimeError {
    pub fn type_mismatch(left: &'static str, operator: &'static str, right: &'static str) -> Self {
        Self::TypeMismatch {
            left,
            operator,
            right,
        }
    }

    pub fn unsupported_operand(operator: &'static str, operand: &'static str) -> Self {
        Self::UnsupportedOperand { operator, operand }
    }

    pub fn wrong_arity(expected: usize, got: usize) -> Self {
        Self::WrongArity { expected, got }
    }

    pub fn index_not_supported(left: &'static str, index: &'static str) -> Self {
        Self::IndexNotSupported { left, index }
    }
}

/// A unified error type for both phases.
#[derive(Debug, Error)]
pub enum MonkeyError {
    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}
