//! Bytecode compiler: transforms AST into bytecode.
//!
//! Single pass over the tree. Each function body gets its own compilation
//! scope (instruction buffer) and a matching symbol table scope.

use std::rc::Rc;

use tracing::debug;

use crate::ast::{BlockStatement, Expr, Program, Stmt};
use crate::bytecode::chunk::{Bytecode, Instructions};
use crate::bytecode::instruction::{make, OpCode};
use crate::bytecode::symbol_table::{Symbol, SymbolScope, SymbolTable};
use crate::bytecode::value::{CompiledFunction, Value};
use crate::error::CompileError;

/// Result type for compilation.
pub type CompileResult<T> = Result<T, CompileError>;

/// Placeholder operand for jumps patched once the target is known.
const PLACEHOLDER: usize = 9999;

#[derive(Debug, Clone, Copy)]
struct EmittedInstruction {
    opcode: OpCode,
    position: usize,
}

/// Instructions of one function body under construction.
#[derive(Debug, Default)]
struct CompilationScope {
    instructions: Instructions,
    last_instruction: Option<EmittedInstruction>,
    previous_instruction: Option<EmittedInstruction>,
}

/// The bytecode compiler.
pub struct Compiler {
    /// Function body currently being compiled
    current: CompilationScope,
    /// Enclosing function bodies, outermost first
    enclosing: Vec<CompilationScope>,
    /// Constant pool shared by every function of the unit
    constants: Vec<Value>,
    symbols: SymbolTable,
}

impl Compiler {
    /// Create a compiler whose global scope knows the builtins.
    pub fn new() -> Self {
        Self::with_state(SymbolTable::with_builtins(), Vec::new())
    }

    /// Resume from the symbols and constants of an earlier compilation.
    pub fn with_state(symbols: SymbolTable, constants: Vec<Value>) -> Self {
        Self {
            current: CompilationScope::default(),
            enclosing: Vec::new(),
            constants,
            symbols,
        }
    }

    /// Hand back the state needed to compile the next unit of a session.
    pub fn into_state(self) -> (SymbolTable, Vec<Value>) {
        (self.symbols, self.constants)
    }

    /// Compile a program into bytecode.
    ///
    /// Compilation stops at the first error. A failed unit produces no
    /// bytecode and leaves the symbol table and constant pool as they were,
    /// so the compiler can keep being used.
    pub fn compile(&mut self, program: &Program) -> CompileResult<Bytecode> {
        self.current = CompilationScope::default();
        self.enclosing.clear();

        let checkpoint = self.symbols.checkpoint();
        let num_constants = self.constants.len();

        let compiled = program
            .statements
            .iter()
            .try_for_each(|stmt| self.compile_statement(stmt));
        if let Err(e) = compiled {
            self.symbols.rollback(checkpoint);
            self.constants.truncate(num_constants);
            self.current = CompilationScope::default();
            self.enclosing.clear();
            debug!(error = %e, "compilation failed");
            return Err(e);
        }

        let instructions = std::mem::take(&mut self.current.instructions);
        debug!(
            instructions = instructions.len(),
            constants = self.constants.len(),
            "compiled program"
        );

        Ok(Bytecode {
            instructions,
            constants: self.constants.clone(),
        })
    }

    /// Compile a statement.
    fn compile_statement(&mut self, stmt: &Stmt) -> CompileResult<()> {
        match stmt {
            Stmt::Expression(expr) => {
                self.compile_expression(expr)?;
                self.emit(OpCode::Pop, &[])?;
            }

            Stmt::Let { name, value } => {
                self.compile_expression(value)?;
                let symbol = self.symbols.define(name);
                match symbol.scope {
                    SymbolScope::Global => self.emit(OpCode::SetGlobal, &[symbol.index])?,
                    _ => self.emit(OpCode::SetLocal, &[symbol.index])?,
                };
            }

            Stmt::Return(value) => {
                self.compile_expression(value)?;
                self.emit(OpCode::ReturnValue, &[])?;
            }
        }

        Ok(())
    }

    fn compile_block(&mut self, block: &BlockStatement) -> CompileResult<()> {
        for stmt in &block.statements {
            self.compile_statement(stmt)?;
        }
        Ok(())
    }

    /// Compile an expression.
    fn compile_expression(&mut self, expr: &Expr) -> CompileResult<()> {
        match expr {
            Expr::IntegerLiteral(n) => {
                let idx = self.add_constant(Value::Integer(*n));
                self.emit(OpCode::Constant, &[idx])?;
            }

            Expr::StringLiteral(s) => {
                let idx = self.add_constant(Value::string(s));
                self.emit(OpCode::Constant, &[idx])?;
            }

            Expr::Boolean(b) => {
                if *b {
                    self.emit(OpCode::True, &[])?;
                } else {
                    self.emit(OpCode::False, &[])?;
                }
            }

            Expr::Identifier(name) => {
                let symbol = self
                    .resolve(name)
                    .ok_or_else(|| CompileError::undefined_variable(name))?;
                self.load_symbol(&symbol)?;
            }

            Expr::Prefix { operator, right } => {
                let op = match operator.as_str() {
                    "!" => OpCode::Bang,
                    "-" => OpCode::Minus,
                    _ => return Err(CompileError::unknown_operator(operator)),
                };
                self.compile_expression(right)?;
                self.emit(op, &[])?;
            }

            Expr::Infix {
                left,
                operator,
                right,
            } => {
                // `a < b` runs as `b > a`
                if operator == "<" {
                    self.compile_expression(right)?;
                    self.compile_expression(left)?;
                    self.emit(OpCode::GreaterThan, &[])?;
                    return Ok(());
                }

                let op = match operator.as_str() {
                    "+" => OpCode::Add,
                    "-" => OpCode::Sub,
                    "*" => OpCode::Mul,
                    "/" => OpCode::Div,
                    ">" => OpCode::GreaterThan,
                    "==" => OpCode::Equal,
                    "!=" => OpCode::NotEqual,
                    _ => return Err(CompileError::unknown_operator(operator)),
                };
                self.compile_expression(left)?;
                self.compile_expression(right)?;
                self.emit(op, &[])?;
            }

            Expr::If {
                condition,
                consequence,
                alternative,
            } => {
                self.compile_expression(condition)?;

                let jump_not_truthy = self.emit(OpCode::JumpNotTruthy, &[PLACEHOLDER])?;
                self.compile_branch(consequence)?;
                let jump = self.emit(OpCode::Jump, &[PLACEHOLDER])?;

                let after_consequence = self.current.instructions.len();
                self.change_operand(jump_not_truthy, after_consequence)?;

                match alternative {
                    Some(block) => self.compile_branch(block)?,
                    None => {
                        self.emit(OpCode::Null, &[])?;
                    }
                }

                let after_alternative = self.current.instructions.len();
                self.change_operand(jump, after_alternative)?;
            }

            Expr::Function {
                parameters,
                body,
                name,
            } => {
                self.enter_scope();

                if let Some(name) = name {
                    self.symbols.define_function_name(name);
                }
                for param in parameters {
                    self.symbols.define(param);
                }

                self.compile_block(body)?;

                if self.last_instruction_is(OpCode::Pop) {
                    self.replace_last_pop_with_return()?;
                }
                if !self.last_instruction_is(OpCode::ReturnValue) {
                    self.emit(OpCode::Return, &[])?;
                }

                let free_symbols = self.symbols.free_symbols().to_vec();
                let num_locals = self.symbols.num_definitions();
                let instructions = self.leave_scope();

                for symbol in &free_symbols {
                    self.load_symbol(symbol)?;
                }

                let function = CompiledFunction {
                    instructions,
                    num_locals,
                    num_parameters: parameters.len(),
                    name: name.clone(),
                };
                let idx = self.add_constant(Value::CompiledFunction(Rc::new(function)));
                self.emit(OpCode::Closure, &[idx, free_symbols.len()])?;
            }

            Expr::Call {
                function,
                arguments,
            } => {
                self.compile_expression(function)?;
                for arg in arguments {
                    self.compile_expression(arg)?;
                }
                self.emit(OpCode::Call, &[arguments.len()])?;
            }

            Expr::Array(elements) => {
                for elem in elements {
                    self.compile_expression(elem)?;
                }
                self.emit(OpCode::Array, &[elements.len()])?;
            }

            Expr::Hash(pairs) => {
                for (key, value) in pairs {
                    self.compile_expression(key)?;
                    self.compile_expression(value)?;
                }
                self.emit(OpCode::Hash, &[pairs.len()])?;
            }

            Expr::Index { left, index } => {
                self.compile_expression(left)?;
                self.compile_expression(index)?;
                self.emit(OpCode::Index, &[])?;
            }
        }

        Ok(())
    }

    /// Compile an `if` arm so that it leaves exactly one value on the stack.
    fn compile_branch(&mut self, block: &BlockStatement) -> CompileResult<()> {
        let start = self.current.instructions.len();
        self.compile_block(block)?;

        let trailing_pop = matches!(
            self.current.last_instruction,
            Some(last) if last.opcode == OpCode::Pop && last.position >= start
        );
        if trailing_pop {
            self.remove_last_pop();
        } else if !self.last_instruction_is(OpCode::ReturnValue) {
            // empty arm, or one ending in `let`
            self.emit(OpCode::Null, &[])?;
        }
        Ok(())
    }

    // ===== Name resolution =====

    /// Resolve a name, capturing it as a free variable in every function
    /// scope between its definition and the use site.
    fn resolve(&mut self, name: &str) -> Option<Symbol> {
        let (origin_depth, origin) = self
            .symbols
            .resolve(name)
            .map(|(depth, symbol)| (depth, symbol.clone()))?;

        if matches!(origin.scope, SymbolScope::Global | SymbolScope::Builtin) {
            return Some(origin);
        }

        let mut symbol = origin;
        for depth in origin_depth + 1..=self.symbols.depth() {
            symbol = self.symbols.define_free(depth, symbol);
        }
        Some(symbol)
    }

    fn load_symbol(&mut self, symbol: &Symbol) -> CompileResult<usize> {
        match symbol.scope {
            SymbolScope::Global => self.emit(OpCode::GetGlobal, &[symbol.index]),
            SymbolScope::Local => self.emit(OpCode::GetLocal, &[symbol.index]),
            SymbolScope::Builtin => self.emit(OpCode::GetBuiltin, &[symbol.index]),
            SymbolScope::Free => self.emit(OpCode::GetFree, &[symbol.index]),
            SymbolScope::Function => self.emit(OpCode::CurrentClosure, &[]),
        }
    }

    // ===== Scope management =====

    fn enter_scope(&mut self) {
        let outer = std::mem::take(&mut self.current);
        self.enclosing.push(outer);
        self.symbols.enter_scope();
    }

    fn leave_scope(&mut self) -> Instructions {
        let scope = match self.enclosing.pop() {
            Some(outer) => std::mem::replace(&mut self.current, outer),
            None => std::mem::take(&mut self.current),
        };
        self.symbols.leave_scope();
        scope.instructions
    }

    // ===== Bytecode emission =====

    fn emit(&mut self, op: OpCode, operands: &[usize]) -> CompileResult<usize> {
        let instruction = make(op, operands)?;
        let position = self.current.instructions.push(&instruction);
        self.current.previous_instruction = self.current.last_instruction;
        self.current.last_instruction = Some(EmittedInstruction {
            opcode: op,
            position,
        });
        Ok(position)
    }

    fn last_instruction_is(&self, op: OpCode) -> bool {
        matches!(self.current.last_instruction, Some(last) if last.opcode == op)
    }

    fn remove_last_pop(&mut self) {
        if let Some(last) = self.current.last_instruction {
            self.current.instructions.truncate(last.position);
            self.current.last_instruction = self.current.previous_instruction;
        }
    }

    fn replace_last_pop_with_return(&mut self) -> CompileResult<()> {
        if let Some(last) = self.current.last_instruction.as_mut() {
            let instruction = make(OpCode::ReturnValue, &[])?;
            self.current.instructions.replace(last.position, &instruction);
            last.opcode = OpCode::ReturnValue;
        }
        Ok(())
    }

    /// Back-patch the operand of the single-operand instruction at `position`.
    fn change_operand(&mut self, position: usize, operand: usize) -> CompileResult<()> {
        if let Some(op) = self.current.instructions.opcode_at(position) {
            let instruction = make(op, &[operand])?;
            self.current.instructions.replace(position, &instruction);
        }
        Ok(())
    }

    fn add_constant(&mut self, value: Value) -> usize {
        self.constants.push(value);
        self.constants.len() - 1
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}
