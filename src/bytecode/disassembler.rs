//! Bytecode disassembler for debugging.

use std::fmt::Write;

use crate::bytecode::chunk::Bytecode;
use crate::bytecode::instruction::{read_operands, OpCode};
use crate::bytecode::value::{CompiledFunction, Value};

/// Render an instruction stream, one instruction per line.
///
/// Lines look like `0003 OpClosure 2 1`. An unknown opcode byte yields an
/// `ERROR:` line and disassembly resumes at the next byte.
pub fn disassemble_instructions(ins: &[u8]) -> String {
    let mut output = String::new();
    let mut offset = 0;

    while offset < ins.len() {
        offset = disassemble_instruction(ins, offset, &mut output);
    }

    output
}

/// Disassemble a single instruction, returning the offset of the next one.
pub fn disassemble_instruction(ins: &[u8], offset: usize, output: &mut String) -> usize {
    let byte = ins[offset];
    let opcode = match OpCode::from_u8(byte) {
        Some(op) => op,
        None => {
            writeln!(output, "ERROR: opcode {} undefined", byte).unwrap();
            return offset + 1;
        }
    };

    let def = opcode.definition();
    let end = offset + def.instruction_len();
    if end > ins.len() {
        writeln!(output, "ERROR: truncated {} at {:04}", def.name, offset).unwrap();
        return ins.len();
    }

    let (operands, read) = read_operands(&def, &ins[offset + 1..]);
    write!(output, "{:04} {}", offset, def.name).unwrap();
    for operand in operands {
        write!(output, " {}", operand).unwrap();
    }
    output.push('\n');

    offset + 1 + read
}

/// Disassemble a compiled function body.
pub fn disassemble_function(function: &CompiledFunction) -> String {
    let mut output = String::new();

    writeln!(
        &mut output,
        "== {} (params: {}, locals: {}) ==",
        function.name.as_deref().unwrap_or("<anonymous>"),
        function.num_parameters,
        function.num_locals
    )
    .unwrap();
    output.push_str(&disassemble_instructions(&function.instructions));

    output
}

/// Disassemble a whole compilation unit: the top-level stream, the constant
/// pool and every compiled function in it.
pub fn disassemble_bytecode(bytecode: &Bytecode) -> String {
    let mut output = String::new();

    writeln!(&mut output, "== <script> ==").unwrap();
    output.push_str(&disassemble_instructions(&bytecode.instructions));

    if !bytecode.constants.is_empty() {
        writeln!(&mut output, "\n== constants ==").unwrap();
        for (i, constant) in bytecode.constants.iter().enumerate() {
            writeln!(&mut output, "{:04} {}", i, describe_constant(constant)).unwrap();
        }
    }

    for constant in &bytecode.constants {
        if let Value::CompiledFunction(function) = constant {
            writeln!(&mut output).unwrap();
            output.push_str(&disassemble_function(function));
        }
    }

    output
}

fn describe_constant(constant: &Value) -> String {
    match constant {
        Value::String(s) => format!("{:?}", &**s),
        Value::CompiledFunction(function) => format!(
            "<fn {}>",
            function.name.as_deref().unwrap_or("<anonymous>")
        ),
        other => other.to_string(),
    }
}

/// Print the disassembly of a compilation unit to stderr.
pub fn print_disassembly(bytecode: &Bytecode) {
    eprintln!("{}", disassemble_bytecode(bytecode));
}
