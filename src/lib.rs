//! Monkey: a bytecode compiler and stack-based virtual machine.
//!
//! This is the library root that exports all modules. The crate takes a
//! parsed [`ast::Program`]; lexing and parsing live with the host.
//!
//! # Pipeline
//!
//! - **Compiler**: AST to [`bytecode::Bytecode`], names resolved to slots
//! - **VM**: executes bytecode on an operand stack with call frames
//! - **Session**: REPL-style evaluation of successive units

pub mod ast;
pub mod bytecode;
pub mod error;
pub mod session;

use error::MonkeyError;

pub use bytecode::{Bytecode, Compiler, Value, VmConfig, VM};
pub use session::Session;

/// Compile a program to bytecode without executing.
pub fn compile(program: &ast::Program) -> Result<bytecode::Bytecode, MonkeyError> {
    let mut compiler = bytecode::Compiler::new();
    Ok(compiler.compile(program)?)
}

/// Compile and run a program on a fresh VM.
pub fn run(program: &ast::Program) -> Result<bytecode::Value, MonkeyError> {
    run_with_config(program, bytecode::VmConfig::default())
}

/// Compile and run a program under custom VM limits.
pub fn run_with_config(
    program: &ast::Program,
    config: bytecode::VmConfig,
) -> Result<bytecode::Value, MonkeyError> {
    let unit = compile(program)?;
    let mut vm = bytecode::VM::with_config(config);
    Ok(vm.run(&unit)?)
}

/// Disassemble compiled bytecode to a string.
pub fn disassemble(unit: &bytecode::Bytecode) -> String {
    bytecode::disassemble_bytecode(unit)
}
