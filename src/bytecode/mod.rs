//! Bytecode module for the Monkey VM.
//!
//! This module provides a bytecode compiler and virtual machine for executing
//! Monkey programs. Names are resolved to slots at compile time so the VM
//! never looks anything up by name.
//!
//! # Architecture
//!
//! - `instruction`: OpCode definitions and operand encoding
//! - `chunk`: Instruction buffers and compiled bytecode units
//! - `value`: Runtime values shared by the constant pool and the VM
//! - `builtins`: The ordinal builtin function table
//! - `symbol_table`: Compile-time scope chain
//! - `compiler`: Transforms AST into bytecode
//! - `vm`: Stack-based virtual machine for executing bytecode
//! - `disassembler`: Debug output for bytecode inspection

pub mod builtins;
pub mod chunk;
pub mod compiler;
pub mod disassembler;
pub mod instruction;
pub mod symbol_table;
pub mod value;
pub mod vm;


pub use chunk::{Bytecode, Instructions};
pub use compiler::Compiler;
pub use disassembler::{disassemble_bytecode, disassemble_function, print_disassembly};
pub use instruction::OpCode;
pub use symbol_table::{Symbol, SymbolScope, SymbolTable};
pub use value::{Closure, CompiledFunction, Value};
pub use vm::{VmConfig, VM};
