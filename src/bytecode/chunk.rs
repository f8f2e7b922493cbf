//! Instruction buffers and the compiled bytecode unit.

use std::fmt;
use std::ops::Deref;

use crate::bytecode::disassembler;
use crate::bytecode::instruction::{self, OpCode};
use crate::bytecode::value::Value;

/// An append-only sequence of encoded instructions.
///
/// The only in-place mutation is [`Instructions::patch_u16`] (jump
/// back-patching) and replacing/removing the most recent instruction while
/// a function body is still being compiled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Instructions(Vec<u8>);

impl Instructions {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Concatenate already-encoded instructions.
    pub fn concat<I>(parts: I) -> Self
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        Self(parts.into_iter().flatten().collect())
    }

    /// Append an encoded instruction and return its starting offset.
    pub fn push(&mut self, instruction: &[u8]) -> usize {
        let position = self.0.len();
        self.0.extend_from_slice(instruction);
        position
    }

    /// Overwrite the bytes starting at `position` with `instruction`.
    pub fn replace(&mut self, position: usize, instruction: &[u8]) {
        self.0[position..position + instruction.len()].copy_from_slice(instruction);
    }

    /// Drop everything from `position` on.
    pub fn truncate(&mut self, position: usize) {
        self.0.truncate(position);
    }

    /// Patch a 16-bit big-endian operand in place.
    pub fn patch_u16(&mut self, offset: usize, value: u16) {
        self.0[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
    }

    /// Read a 16-bit operand at offset.
    pub fn read_u16(&self, offset: usize) -> u16 {
        instruction::read_u16(&self.0, offset)
    }

    /// Get the opcode at an instruction boundary.
    pub fn opcode_at(&self, offset: usize) -> Option<OpCode> {
        self.0.get(offset).copied().and_then(OpCode::from_u8)
    }
}

impl Deref for Instructions {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Instructions {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Instructions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&disassembler::disassemble_instructions(self))
    }
}

/// A compiled unit: top-level instructions and the constant pool they index.
#[derive(Debug, Clone, Default)]
pub struct Bytecode {
    pub instructions: Instructions,
    pub constants: Vec<Value>,
}
