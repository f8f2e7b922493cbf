//! Bytecode instruction definitions for the Monkey VM.
//!
//! Every opcode has a fixed list of operand widths. Operands are written
//! big-endian immediately after the opcode byte, so the encoder, the decoder
//! and the disassembler all agree through [`OpCode::definition`].

use std::fmt;

use crate::error::EncodeError;

/// Opcodes for the bytecode virtual machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    // ============ Constants & Stack ============
    /// Load a constant from the constant pool: CONSTANT <index:u16>
    Constant = 0,
    /// Pop the top value from the stack
    Pop,
    /// Push true onto the stack
    True,
    /// Push false onto the stack
    False,
    /// Push null onto the stack
    Null,

    // ============ Arithmetic ============
    /// Add two integers: a + b
    Add,
    /// Subtract two integers: a - b
    Sub,
    /// Multiply two integers: a * b
    Mul,
    /// Divide two integers: a / b
    Div,
    /// Negate an integer: -a
    Minus,

    // ============ Comparison & Logic ============
    /// Equal: a == b
    Equal,
    /// Not equal: a != b
    NotEqual,
    /// Greater than: a > b (`<` is compiled with swapped operands)
    GreaterThan,
    /// Logical not: !a
    Bang,

    // ============ Control Flow ============
    /// Pop and jump if falsy: JUMP_NOT_TRUTHY <target:u16>
    JumpNotTruthy,
    /// Unconditional jump: JUMP <target:u16>
    Jump,

    // ============ Variables ============
    /// Get a global slot: GET_GLOBAL <index:u16>
    GetGlobal,
    /// Pop into a global slot: SET_GLOBAL <index:u16>
    SetGlobal,
    /// Get a local slot: GET_LOCAL <index:u8>
    GetLocal,
    /// Pop into a local slot: SET_LOCAL <index:u8>
    SetLocal,
    /// Push a builtin function: GET_BUILTIN <index:u8>
    GetBuiltin,
    /// Push a captured variable of the running closure: GET_FREE <index:u8>
    GetFree,

    // ============ Collections ============
    /// Build an array: ARRAY <count:u16>
    Array,
    /// Build a hash: HASH <pair_count:u16>
    Hash,
    /// Get element by index: obj[index]
    Index,

    // ============ Functions & Calls ============
    /// Call a function: CALL <arg_count:u8>
    Call,
    /// Return the value on top of the stack
    ReturnValue,
    /// Return null
    Return,
    /// Create a closure: CLOSURE <func_index:u16> <free_count:u8>
    Closure,
    /// Push the closure being executed
    CurrentClosure,
}

/// Static shape of an opcode: its display name and operand widths in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Definition {
    pub name: &'static str,
    pub operand_widths: &'static [usize],
}

impl Definition {
    /// Total encoded size of an instruction, opcode byte included.
    pub fn instruction_len(&self) -> usize {
        1 + self.operand_widths.iter().sum::<usize>()
    }
}

impl OpCode {
    /// Highest opcode value in use.
    pub const LAST: OpCode = OpCode::CurrentClosure;

    /// Get the name and operand widths for this opcode.
    pub fn definition(self) -> Definition {
        let (name, operand_widths): (&'static str, &'static [usize]) = match self {
            OpCode::Constant => ("OpConstant", &[2]),
            OpCode::Pop => ("OpPop", &[]),
            OpCode::True => ("OpTrue", &[]),
            OpCode::False => ("OpFalse", &[]),
            OpCode::Null => ("OpNull", &[]),
            OpCode::Add => ("OpAdd", &[]),
            OpCode::Sub => ("OpSub", &[]),
            OpCode::Mul => ("OpMul", &[]),
            OpCode::Div => ("OpDiv", &[]),
            OpCode::Minus => ("OpMinus", &[]),
            OpCode::Equal => ("OpEqual", &[]),
            OpCode::NotEqual => ("OpNotEqual", &[]),
            OpCode::GreaterThan => ("OpGreaterThan", &[]),
            OpCode::Bang => ("OpBang", &[]),
            OpCode::JumpNotTruthy => ("OpJumpNotTruthy", &[2]),
            OpCode::Jump => ("OpJump", &[2]),
            OpCode::GetGlobal => ("OpGetGlobal", &[2]),
            OpCode::SetGlobal => ("OpSetGlobal", &[2]),
            OpCode::GetLocal => ("OpGetLocal", &[1]),
            OpCode::SetLocal => ("OpSetLocal", &[1]),
            OpCode::GetBuiltin => ("OpGetBuiltin", &[1]),
            OpCode::GetFree => ("OpGetFree", &[1]),
            OpCode::Array => ("OpArray", &[2]),
            OpCode::Hash => ("OpHash", &[2]),
            OpCode::Index => ("OpIndex", &[]),
            OpCode::Call => ("OpCall", &[1]),
            OpCode::ReturnValue => ("OpReturnValue", &[]),
            OpCode::Return => ("OpReturn", &[]),
            OpCode::Closure => ("OpClosure", &[2, 1]),
            OpCode::CurrentClosure => ("OpCurrentClosure", &[]),
        };
        Definition {
            name,
            operand_widths,
        }
    }

    /// Convert from u8 to OpCode.
    pub fn from_u8(byte: u8) -> Option<OpCode> {
        let op = match byte {
            0 => OpCode::Constant,
            1 => OpCode::Pop,
            2 => OpCode::True,
            3 => OpCode::False,
            4 => OpCode::Null,
            5 => OpCode::Add,
            6 => OpCode::Sub,
            7 => OpCode::Mul,
            8 => OpCode::Div,
            9 => OpCode::Minus,
            10 => OpCode::Equal,
            11 => OpCode::NotEqual,
            12 => OpCode::GreaterThan,
            13 => OpCode::Bang,
            14 => OpCode::JumpNotTruthy,
            15 => OpCode::Jump,
            16 => OpCode::GetGlobal,
            17 => OpCode::SetGlobal,
            18 => OpCode::GetLocal,
            19 => OpCode::SetLocal,
            20 => OpCode::GetBuiltin,
            21 => OpCode::GetFree,
            22 => OpCode::Array,
            23 => OpCode::Hash,
            24 => OpCode::Index,
            25 => OpCode::Call,
            26 => OpCode::ReturnValue,
            27 => OpCode::Return,
            28 => OpCode::Closure,
            29 => OpCode::CurrentClosure,
            _ => return None,
        };
        Some(op)
    }
}

impl From<OpCode> for u8 {
    fn from(op: OpCode) -> u8 {
        op as u8
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.definition().name)
    }
}

/// Encode one instruction.
pub fn make(op: OpCode, operands: &[usize]) -> Result<Vec<u8>, EncodeError> {
    let def = op.definition();
    if operands.len() != def.operand_widths.len() {
        return Err(EncodeError::OperandCount {
            op: def.name,
            expected: def.operand_widths.len(),
            got: operands.len(),
        });
    }

    let mut instruction = Vec::with_capacity(def.instruction_len());
    instruction.push(op as u8);

    for (&operand, &width) in operands.iter().zip(def.operand_widths) {
        match width {
            2 => {
                let value = u16::try_from(operand).map_err(|_| EncodeError::OperandOverflow {
                    op: def.name,
                    value: operand,
                    width,
                })?;
                instruction.extend_from_slice(&value.to_be_bytes());
            }
            _ => {
                let value = u8::try_from(operand).map_err(|_| EncodeError::OperandOverflow {
                    op: def.name,
                    value: operand,
                    width,
                })?;
                instruction.push(value);
            }
        }
    }

    Ok(instruction)
}

/// Decode the operands that follow an opcode.
///
/// `ins` starts at the first operand byte. Returns the operands and the number
/// of bytes read.
pub fn read_operands(def: &Definition, ins: &[u8]) -> (Vec<usize>, usize) {
    let mut operands = Vec::with_capacity(def.operand_widths.len());
    let mut offset = 0;

    for &width in def.operand_widths {
        match width {
            2 => operands.push(read_u16(ins, offset) as usize),
            _ => operands.push(read_u8(ins, offset) as usize),
        }
        offset += width;
    }

    (operands, offset)
}

/// Read a big-endian 16-bit operand at `offset`.
#[inline]
pub fn read_u16(ins: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([ins[offset], ins[offset + 1]])
}

#[inline]
pub fn read_u8(ins: &[u8], offset: usize) -> u8 {
    ins[offset]
}
