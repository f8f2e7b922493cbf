//! Stack-based virtual machine for executing bytecode.

use std::fmt;
use std::io::{self, Write};
use std::rc::Rc;

use tracing::{debug, trace};

use crate::bytecode::builtins;
use crate::bytecode::chunk::Bytecode;
use crate::bytecode::instruction::{self, OpCode};
use crate::bytecode::value::{Closure, CompiledFunction, HashPair, HashPairs, Value};
use crate::error::RuntimeError;

/// Default maximum operand stack depth.
pub const STACK_SIZE: usize = 2048;
/// Default maximum call depth.
pub const MAX_FRAMES: usize = 1024;
/// Default number of addressable global slots.
pub const GLOBALS_SIZE: usize = 65536;

/// Result type for VM operations.
pub type VMResult<T> = Result<T, RuntimeError>;

/// Resource limits for a VM instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmConfig {
    /// Maximum operand stack depth, locals included
    pub stack_size: usize,
    /// Maximum number of simultaneously active call frames
    pub max_frames: usize,
    /// Number of global slots a program may address
    pub max_globals: usize,
    /// Upper bound on instructions executed per `run`, if any
    pub instruction_budget: Option<u64>,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            stack_size: STACK_SIZE,
            max_frames: MAX_FRAMES,
            max_globals: GLOBALS_SIZE,
            instruction_budget: None,
        }
    }
}

/// A call frame representing a function invocation.
#[derive(Debug, Clone)]
struct CallFrame {
    /// The closure being executed
    closure: Rc<Closure>,
    /// Instruction pointer (offset into the function's instructions)
    ip: usize,
    /// Stack index of the first local slot; the callee sits just below it
    base_pointer: usize,
}

/// The bytecode virtual machine.
pub struct VM {
    stack: Vec<Value>,
    frames: Vec<CallFrame>,
    /// Global slots, kept across runs
    globals: Vec<Option<Value>>,
    /// Value most recently discarded by a top-level expression statement
    last_popped: Option<Value>,
    config: VmConfig,
    /// Sink for `puts`
    output: Box<dyn Write>,
    executed: u64,
}

impl VM {
    /// Create a new VM with default limits writing to stdout.
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    /// Create a VM with custom limits.
    pub fn with_config(config: VmConfig) -> Self {
        Self {
            stack: Vec::with_capacity(config.stack_size.min(STACK_SIZE)),
            frames: Vec::with_capacity(config.max_frames.min(MAX_FRAMES)),
            globals: Vec::new(),
            last_popped: None,
            config,
            output: Box::new(io::stdout()),
            executed: 0,
        }
    }

    /// Redirect builtin output.
    pub fn with_output(mut self, output: impl Write + 'static) -> Self {
        self.output = Box::new(output);
        self
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// Read a global slot.
    pub fn global(&self, index: usize) -> Option<&Value> {
        self.globals.get(index).and_then(Option::as_ref)
    }

    /// Current operand stack height.
    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    /// Run a compiled unit to completion.
    ///
    /// Returns the value of the last top-level expression statement, the
    /// value of a top-level `return`, or null. Globals persist between runs;
    /// the stack and frames are reset.
    pub fn run(&mut self, bytecode: &Bytecode) -> VMResult<Value> {
        // Reset execution state (but preserve globals for REPL)
        self.stack.clear();
        self.frames.clear();
        self.last_popped = None;
        self.executed = 0;

        let main = CompiledFunction::new(bytecode.instructions.clone(), 0, 0);
        self.frames.push(CallFrame {
            closure: Rc::new(Closure::new(Rc::new(main), Vec::new())),
            ip: 0,
            base_pointer: 0,
        });

        debug!(
            instructions = bytecode.instructions.len(),
            constants = bytecode.constants.len(),
            "vm run started"
        );
        let result = self.execute(&bytecode.constants);
        match &result {
            Ok(value) => debug!(executed = self.executed, result = %value, "vm run finished"),
            Err(e) => debug!(executed = self.executed, error = %e, "vm run failed"),
        }
        result
    }

    /// Main execution loop.
    fn execute(&mut self, constants: &[Value]) -> VMResult<Value> {
        loop {
            let at_end = match self.frames.last() {
                Some(frame) => frame.ip >= frame.closure.function.instructions.len(),
                None => return Ok(self.finish()),
            };
            if at_end {
                if self.frames.len() == 1 {
                    self.frames.clear();
                    return Ok(self.finish());
                }
                self.return_from_frame(Value::Null)?;
                continue;
            }

            self.executed += 1;
            if let Some(budget) = self.config.instruction_budget {
                if self.executed > budget {
                    return Err(RuntimeError::BudgetExhausted(budget));
                }
            }

            let byte = self.read_byte()?;
            let opcode = OpCode::from_u8(byte).ok_or(RuntimeError::InvalidOpcode(byte))?;

            match opcode {
                OpCode::Constant => {
                    let idx = self.read_u16()? as usize;
                    let value = constants
                        .get(idx)
                        .cloned()
                        .ok_or(RuntimeError::InvalidConstant(idx))?;
                    self.push(value)?;
                }

                OpCode::Pop => {
                    let value = self.pop()?;
                    if self.frames.len() == 1 {
                        self.last_popped = Some(value);
                    }
                }

                OpCode::True => self.push(Value::Boolean(true))?,
                OpCode::False => self.push(Value::Boolean(false))?,
                OpCode::Null => self.push(Value::Null)?,

                OpCode::Add | OpCode::Sub | OpCode::Mul | OpCode::Div => {
                    self.binary_op(opcode)?;
                }

                OpCode::Equal | OpCode::NotEqual | OpCode::GreaterThan => {
                    self.comparison_op(opcode)?;
                }

                OpCode::Minus => {
                    let operand = self.pop()?;
                    match operand {
                        Value::Integer(n) => self.push(Value::Integer(n.wrapping_neg()))?,
                        other => {
                            return Err(RuntimeError::unsupported_operand("-", other.type_name()))
                        }
                    }
                }

                OpCode::Bang => {
                    let operand = self.pop()?;
                    match operand {
                        Value::Boolean(b) => self.push(Value::Boolean(!b))?,
                        Value::Null => self.push(Value::Boolean(true))?,
                        other => {
                            return Err(RuntimeError::unsupported_operand("!", other.type_name()))
                        }
                    }
                }

                OpCode::JumpNotTruthy => {
                    let target = self.read_u16()? as usize;
                    let condition = self.pop()?;
                    if !condition.is_truthy() {
                        self.current_frame_mut()?.ip = target;
                    }
                }

                OpCode::Jump => {
                    let target = self.read_u16()? as usize;
                    self.current_frame_mut()?.ip = target;
                }

                OpCode::GetGlobal => {
                    let idx = self.read_u16()? as usize;
                    let value = self
                        .global(idx)
                        .cloned()
                        .ok_or(RuntimeError::UnboundGlobal(idx))?;
                    self.push(value)?;
                }

                OpCode::SetGlobal => {
                    let idx = self.read_u16()? as usize;
                    let value = self.pop()?;
                    self.set_global(idx, value)?;
                }

                OpCode::GetLocal => {
                    let slot = self.read_byte()? as usize;
                    let index = self.current_frame()?.base_pointer + slot;
                    let value = self
                        .stack
                        .get(index)
                        .cloned()
                        .ok_or(RuntimeError::InvalidLocal(slot))?;
                    self.push(value)?;
                }

                OpCode::SetLocal => {
                    let slot = self.read_byte()? as usize;
                    let value = self.pop()?;
                    let index = self.current_frame()?.base_pointer + slot;
                    match self.stack.get_mut(index) {
                        Some(target) => *target = value,
                        None => return Err(RuntimeError::InvalidLocal(slot)),
                    }
                }

                OpCode::GetBuiltin => {
                    let idx = self.read_byte()? as usize;
                    let builtin = builtins::get(idx).ok_or(RuntimeError::UnknownBuiltin(idx))?;
                    self.push(Value::Builtin(builtin))?;
                }

                OpCode::GetFree => {
                    let idx = self.read_byte()? as usize;
                    let value = self
                        .current_frame()?
                        .closure
                        .free
                        .get(idx)
                        .cloned()
                        .ok_or(RuntimeError::UnboundFree(idx))?;
                    self.push(value)?;
                }

                OpCode::Array => {
                    let count = self.read_u16()? as usize;
                    let elements = self.pop_n(count)?;
                    self.push(Value::array(elements))?;
                }

                OpCode::Hash => {
                    let pair_count = self.read_u16()? as usize;
                    let values = self.pop_n(pair_count * 2)?;
                    let hash = build_hash(values)?;
                    self.push(hash)?;
                }

                OpCode::Index => {
                    let index = self.pop()?;
                    let left = self.pop()?;
                    let value = index_value(&left, &index)?;
                    self.push(value)?;
                }

                OpCode::Call => {
                    let arg_count = self.read_byte()? as usize;
                    self.call_value(arg_count)?;
                }

                OpCode::ReturnValue => {
                    let value = self.pop()?;
                    if self.frames.len() == 1 {
                        self.frames.clear();
                        return Ok(value);
                    }
                    self.return_from_frame(value)?;
                }

                OpCode::Return => {
                    if self.frames.len() == 1 {
                        self.frames.clear();
                        return Ok(Value::Null);
                    }
                    self.return_from_frame(Value::Null)?;
                }

                OpCode::Closure => {
                    let idx = self.read_u16()? as usize;
                    let free_count = self.read_byte()? as usize;
                    let function = match constants.get(idx) {
                        Some(Value::CompiledFunction(function)) => function.clone(),
                        Some(other) => return Err(RuntimeError::NotAFunction(other.type_name())),
                        None => return Err(RuntimeError::InvalidConstant(idx)),
                    };
                    let free = self.pop_n(free_count)?;
                    self.push(Value::Closure(Rc::new(Closure::new(function, free))))?;
                }

                OpCode::CurrentClosure => {
                    let closure = self.current_frame()?.closure.clone();
                    self.push(Value::Closure(closure))?;
                }
            }
        }
    }

    fn finish(&mut self) -> Value {
        self.last_popped.take().unwrap_or(Value::Null)
    }

    // ===== Frames =====

    fn current_frame(&self) -> VMResult<&CallFrame> {
        self.frames.last().ok_or(RuntimeError::NoFrame)
    }

    fn current_frame_mut(&mut self) -> VMResult<&mut CallFrame> {
        self.frames.last_mut().ok_or(RuntimeError::NoFrame)
    }

    fn call_value(&mut self, arg_count: usize) -> VMResult<()> {
        let callee_idx = self
            .stack
            .len()
            .checked_sub(arg_count + 1)
            .ok_or(RuntimeError::StackUnderflow)?;

        match self.stack[callee_idx].clone() {
            Value::Closure(closure) => self.call_closure(closure, arg_count),
            Value::Builtin(builtin) => {
                let result = (builtin.func)(&self.stack[callee_idx + 1..], &mut *self.output);
                self.stack.truncate(callee_idx);
                self.push(result)
            }
            other => Err(RuntimeError::NotCallable(other.type_name())),
        }
    }

    fn call_closure(&mut self, closure: Rc<Closure>, arg_count: usize) -> VMResult<()> {
        let function = &closure.function;
        if arg_count != function.num_parameters {
            return Err(RuntimeError::wrong_arity(
                function.num_parameters,
                arg_count,
            ));
        }

        if self.frames.len() >= self.config.max_frames {
            return Err(RuntimeError::FrameOverflow(self.config.max_frames));
        }

        // Arguments already on the stack become the first locals
        let base_pointer = self.stack.len() - arg_count;
        let stack_top = base_pointer + function.num_locals.max(arg_count);
        if stack_top > self.config.stack_size {
            return Err(RuntimeError::StackOverflow);
        }
        self.stack.resize(stack_top, Value::Null);

        trace!(
            function = function.name.as_deref().unwrap_or("<anonymous>"),
            depth = self.frames.len() + 1,
            base_pointer,
            "push frame"
        );
        self.frames.push(CallFrame {
            closure,
            ip: 0,
            base_pointer,
        });
        Ok(())
    }

    /// Pop the current frame, discard its locals and callee, and push the
    /// return value for the caller.
    fn return_from_frame(&mut self, value: Value) -> VMResult<()> {
        let frame = self.frames.pop().ok_or(RuntimeError::NoFrame)?;
        trace!(depth = self.frames.len(), "pop frame");
        self.stack.truncate(frame.base_pointer.saturating_sub(1));
        self.push(value)
    }

    // ===== Decoding =====

    fn read_byte(&mut self) -> VMResult<u8> {
        let frame = self.current_frame_mut()?;
        let byte = frame
            .closure
            .function
            .instructions
            .get(frame.ip)
            .copied()
            .ok_or(RuntimeError::TruncatedInstruction(frame.ip))?;
        frame.ip += 1;
        Ok(byte)
    }

    fn read_u16(&mut self) -> VMResult<u16> {
        let frame = self.current_frame_mut()?;
        let ins = &frame.closure.function.instructions;
        if frame.ip + 2 > ins.len() {
            return Err(RuntimeError::TruncatedInstruction(frame.ip));
        }
        let value = instruction::read_u16(ins, frame.ip);
        frame.ip += 2;
        Ok(value)
    }

    // ===== Stack =====

    fn push(&mut self, value: Value) -> VMResult<()> {
        if self.stack.len() >= self.config.stack_size {
            return Err(RuntimeError::StackOverflow);
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> VMResult<Value> {
        self.stack.pop().ok_or(RuntimeError::StackUnderflow)
    }

    /// Pop the top `count` values, oldest first.
    fn pop_n(&mut self, count: usize) -> VMResult<Vec<Value>> {
        let start = self
            .stack
            .len()
            .checked_sub(count)
            .ok_or(RuntimeError::StackUnderflow)?;
        Ok(self.stack.split_off(start))
    }

    fn set_global(&mut self, index: usize, value: Value) -> VMResult<()> {
        if index >= self.config.max_globals {
            return Err(RuntimeError::TooManyGlobals {
                index,
                limit: self.config.max_globals,
            });
        }
        if index >= self.globals.len() {
            self.globals.resize(index + 1, None);
        }
        self.globals[index] = Some(value);
        Ok(())
    }

    // ===== Operators =====

    fn binary_op(&mut self, op: OpCode) -> VMResult<()> {
        let right = self.pop()?;
        let left = self.pop()?;

        let result = match (&left, &right) {
            (Value::Integer(a), Value::Integer(b)) => match op {
                OpCode::Add => a.wrapping_add(*b),
                OpCode::Sub => a.wrapping_sub(*b),
                OpCode::Mul => a.wrapping_mul(*b),
                _ => {
                    if *b == 0 {
                        return Err(RuntimeError::DivisionByZero);
                    }
                    a.wrapping_div(*b)
                }
            },
            _ => {
                return Err(RuntimeError::type_mismatch(
                    left.type_name(),
                    operator_symbol(op),
                    right.type_name(),
                ))
            }
        };

        self.push(Value::Integer(result))
    }

    fn comparison_op(&mut self, op: OpCode) -> VMResult<()> {
        let right = self.pop()?;
        let left = self.pop()?;

        let result = match (&left, &right) {
            (Value::Integer(a), Value::Integer(b)) if op == OpCode::GreaterThan => a > b,
            (Value::Integer(_), Value::Integer(_))
            | (Value::Boolean(_), Value::Boolean(_))
            | (Value::String(_), Value::String(_))
            | (Value::Null, Value::Null)
                if op != OpCode::GreaterThan =>
            {
                (left == right) == (op == OpCode::Equal)
            }
            _ => {
                return Err(RuntimeError::type_mismatch(
                    left.type_name(),
                    operator_symbol(op),
                    right.type_name(),
                ))
            }
        };

        self.push(Value::Boolean(result))
    }
}

impl Default for VM {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for VM {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VM")
            .field("stack", &self.stack.len())
            .field("frames", &self.frames.len())
            .field("globals", &self.globals.len())
            .field("config", &self.config)
            .finish()
    }
}

fn operator_symbol(op: OpCode) -> &'static str {
    match op {
        OpCode::Add => "+",
        OpCode::Sub => "-",
        OpCode::Mul => "*",
        OpCode::Div => "/",
        OpCode::Equal => "==",
        OpCode::NotEqual => "!=",
        OpCode::GreaterThan => ">",
        _ => "?",
    }
}

/// Pair up alternating keys and values into a hash.
fn build_hash(values: Vec<Value>) -> VMResult<Value> {
    let mut pairs = HashPairs::default();
    let mut iter = values.into_iter();

    while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
        let hash_key = key
            .hash_key()
            .ok_or(RuntimeError::UnusableHashKey(key.type_name()))?;
        pairs.insert(hash_key, HashPair { key, value });
    }

    Ok(Value::Hash(Rc::new(pairs)))
}

fn index_value(left: &Value, index: &Value) -> VMResult<Value> {
    match (left, index) {
        (Value::Array(elements), Value::Integer(i)) => Ok(usize::try_from(*i)
            .ok()
            .and_then(|i| elements.get(i))
            .cloned()
            .unwrap_or(Value::Null)),
        (Value::Hash(pairs), key) => {
            let hash_key = key
                .hash_key()
                .ok_or(RuntimeError::UnusableHashKey(key.type_name()))?;
            Ok(pairs
                .get(&hash_key)
                .map(|pair| pair.value.clone())
                .unwrap_or(Value::Null))
        }
        _ => Err(RuntimeError::index_not_supported(
            left.type_name(),
            index.type_name(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::chunk::Instructions;
    use crate::bytecode::instruction::make;
    use pretty_assertions::assert_eq;

    fn op(op: OpCode, operands: &[usize]) -> Vec<u8> {
        make(op, operands).unwrap()
    }

    fn bytecode(constants: Vec<Value>, instructions: Vec<Vec<u8>>) -> Bytecode {
        Bytecode {
            instructions: Instructions::concat(instructions),
            constants,
        }
    }

    fn run(constants: Vec<Value>, instructions: Vec<Vec<u8>>) -> VMResult<Value> {
        VM::new().run(&bytecode(constants, instructions))
    }

    #[test]
    fn test_simple_arithmetic() {
        let result = run(
            vec![Value::Integer(1), Value::Integer(2)],
            vec![
                op(OpCode::Constant, &[0]),
                op(OpCode::Constant, &[1]),
                op(OpCode::Add, &[]),
                op(OpCode::Pop, &[]),
            ],
        );
        assert_eq!(result, Ok(Value::Integer(3)));
    }

    #[test]
    fn test_empty_program_yields_null() {
        assert_eq!(run(vec![], vec![]), Ok(Value::Null));
    }

    #[test]
    fn test_arithmetic_wraps() {
        let result = run(
            vec![Value::Integer(i64::MAX), Value::Integer(1)],
            vec![
                op(OpCode::Constant, &[0]),
                op(OpCode::Constant, &[1]),
                op(OpCode::Add, &[]),
                op(OpCode::Pop, &[]),
            ],
        );
        assert_eq!(result, Ok(Value::Integer(i64::MIN)));
    }

    #[test]
    fn test_division_by_zero() {
        let result = run(
            vec![Value::Integer(1), Value::Integer(0)],
            vec![
                op(OpCode::Constant, &[0]),
                op(OpCode::Constant, &[1]),
                op(OpCode::Div, &[]),
                op(OpCode::Pop, &[]),
            ],
        );
        assert_eq!(result, Err(RuntimeError::DivisionByZero));
    }

    #[test]
    fn test_bang_rejects_integers() {
        let result = run(
            vec![Value::Integer(5)],
            vec![
                op(OpCode::Constant, &[0]),
                op(OpCode::Bang, &[]),
                op(OpCode::Pop, &[]),
            ],
        );
        assert_eq!(
            result,
            Err(RuntimeError::unsupported_operand("!", "INTEGER"))
        );

        let result = run(vec![], vec![op(OpCode::Null, &[]), op(OpCode::Bang, &[]), op(OpCode::Pop, &[])]);
        assert_eq!(result, Ok(Value::Boolean(true)));
    }

    #[test]
    fn test_equality_across_types_is_an_error() {
        let result = run(
            vec![Value::Integer(1)],
            vec![
                op(OpCode::Constant, &[0]),
                op(OpCode::True, &[]),
                op(OpCode::Equal, &[]),
                op(OpCode::Pop, &[]),
            ],
        );
        assert_eq!(
            result,
            Err(RuntimeError::type_mismatch("INTEGER", "==", "BOOLEAN"))
        );
    }

    #[test]
    fn test_string_equality() {
        let result = run(
            vec![Value::string("a"), Value::string("a")],
            vec![
                op(OpCode::Constant, &[0]),
                op(OpCode::Constant, &[1]),
                op(OpCode::NotEqual, &[]),
                op(OpCode::Pop, &[]),
            ],
        );
        assert_eq!(result, Ok(Value::Boolean(false)));
    }

    #[test]
    fn test_globals_persist_across_runs() {
        let mut vm = VM::new();
        let define = bytecode(
            vec![Value::Integer(7)],
            vec![op(OpCode::Constant, &[0]), op(OpCode::SetGlobal, &[3])],
        );
        assert_eq!(vm.run(&define), Ok(Value::Null));
        assert_eq!(vm.global(3), Some(&Value::Integer(7)));
        assert_eq!(vm.global(0), None);

        let read = bytecode(
            vec![],
            vec![op(OpCode::GetGlobal, &[3]), op(OpCode::Pop, &[])],
        );
        assert_eq!(vm.run(&read), Ok(Value::Integer(7)));
    }

    #[test]
    fn test_unbound_global() {
        let result = run(vec![], vec![op(OpCode::GetGlobal, &[0]), op(OpCode::Pop, &[])]);
        assert_eq!(result, Err(RuntimeError::UnboundGlobal(0)));
    }

    #[test]
    fn test_global_limit() {
        let mut vm = VM::with_config(VmConfig {
            max_globals: 2,
            ..VmConfig::default()
        });
        let result = vm.run(&bytecode(
            vec![],
            vec![op(OpCode::True, &[]), op(OpCode::SetGlobal, &[2])],
        ));
        assert_eq!(
            result,
            Err(RuntimeError::TooManyGlobals { index: 2, limit: 2 })
        );
    }

    #[test]
    fn test_invalid_opcode_and_truncation() {
        assert_eq!(run(vec![], vec![vec![250]]), Err(RuntimeError::InvalidOpcode(250)));
        assert_eq!(
            run(vec![], vec![vec![OpCode::Constant as u8, 0]]),
            Err(RuntimeError::TruncatedInstruction(1))
        );
        assert_eq!(
            run(vec![], vec![op(OpCode::Constant, &[4])]),
            Err(RuntimeError::InvalidConstant(4))
        );
    }

    #[test]
    fn test_stack_overflow_is_reported() {
        let mut vm = VM::with_config(VmConfig {
            stack_size: 2,
            ..VmConfig::default()
        });
        let result = vm.run(&bytecode(
            vec![],
            vec![
                op(OpCode::True, &[]),
                op(OpCode::True, &[]),
                op(OpCode::True, &[]),
            ],
        ));
        assert_eq!(result, Err(RuntimeError::StackOverflow));
    }

    #[test]
    fn test_call_closure_with_locals() {
        // fn(a) { let b = a; b } called with 9
        let body = CompiledFunction::new(
            Instructions::concat(vec![
                op(OpCode::GetLocal, &[0]),
                op(OpCode::SetLocal, &[1]),
                op(OpCode::GetLocal, &[1]),
                op(OpCode::ReturnValue, &[]),
            ]),
            2,
            1,
        );
        let mut vm = VM::new();
        let result = vm.run(&bytecode(
            vec![Value::CompiledFunction(Rc::new(body)), Value::Integer(9)],
            vec![
                op(OpCode::Closure, &[0, 0]),
                op(OpCode::Constant, &[1]),
                op(OpCode::Call, &[1]),
                op(OpCode::Pop, &[]),
            ],
        ));
        assert_eq!(result, Ok(Value::Integer(9)));
        assert_eq!(vm.stack_len(), 0);
    }

    #[test]
    fn test_closure_operand_must_be_function() {
        let result = run(vec![Value::Integer(1)], vec![op(OpCode::Closure, &[0, 0])]);
        assert_eq!(result, Err(RuntimeError::NotAFunction("INTEGER")));
    }

    #[test]
    fn test_calling_non_function() {
        let result = run(
            vec![Value::Integer(1)],
            vec![op(OpCode::Constant, &[0]), op(OpCode::Call, &[0])],
        );
        assert_eq!(result, Err(RuntimeError::NotCallable("INTEGER")));
    }

    #[test]
    fn test_top_level_return() {
        let result = run(
            vec![Value::Integer(1), Value::Integer(2)],
            vec![
                op(OpCode::Constant, &[0]),
                op(OpCode::ReturnValue, &[]),
                op(OpCode::Constant, &[1]),
                op(OpCode::Pop, &[]),
            ],
        );
        assert_eq!(result, Ok(Value::Integer(1)));
    }

    #[test]
    fn test_instruction_budget() {
        let mut vm = VM::with_config(VmConfig {
            instruction_budget: Some(3),
            ..VmConfig::default()
        });
        // jump back to the start forever
        let result = vm.run(&bytecode(vec![], vec![op(OpCode::Jump, &[0])]));
        assert_eq!(result, Err(RuntimeError::BudgetExhausted(3)));
    }

    #[test]
    fn test_index_out_of_range_is_null() {
        let arr = Value::array(vec![Value::Integer(1)]);
        for idx in [1, -1] {
            assert_eq!(index_value(&arr, &Value::Integer(idx)), Ok(Value::Null));
        }
        assert_eq!(index_value(&arr, &Value::Integer(0)), Ok(Value::Integer(1)));
        assert_eq!(
            index_value(&Value::Integer(1), &Value::Integer(0)),
            Err(RuntimeError::index_not_supported("INTEGER", "INTEGER"))
        );
    }

    #[test]
    fn test_array_index_must_be_integer() {
        let arr = Value::array(vec![Value::Integer(1)]);
        let err = index_value(&arr, &Value::string("a")).unwrap_err();

        assert_eq!(err, RuntimeError::index_not_supported("ARRAY", "STRING"));
        assert_eq!(err.to_string(), "index operator not supported: ARRAY[STRING]");
    }

    #[test]
    fn test_build_hash_rejects_unhashable_keys() {
        assert_eq!(
            build_hash(vec![Value::array(vec![]), Value::Integer(1)]),
            Err(RuntimeError::UnusableHashKey("ARRAY"))
        );
    }
}
