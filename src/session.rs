//! REPL-style session management.
//!
//! A session evaluates successive units against one growing set of globals.
//! One compiler lives for the whole session, so its symbol table and
//! constant pool carry over, and the VM keeps its global slots between runs.

use std::io::Write;

use tracing::debug;

use crate::ast::Program;
use crate::bytecode::compiler::Compiler;
use crate::bytecode::value::Value;
use crate::bytecode::vm::{VmConfig, VM};
use crate::error::MonkeyError;

/// Compiler state and VM shared by every unit of one session.
pub struct Session {
    compiler: Compiler,
    vm: VM,
    units: usize,
}

impl Session {
    pub fn new() -> Self {
        Self::with_vm(VM::new())
    }

    pub fn with_config(config: VmConfig) -> Self {
        Self::with_vm(VM::with_config(config))
    }

    /// Start a session whose `puts` output goes to `output`.
    pub fn with_output(output: impl Write + 'static) -> Self {
        Self::with_vm(VM::new().with_output(output))
    }

    fn with_vm(vm: VM) -> Self {
        Self {
            compiler: Compiler::new(),
            vm,
            units: 0,
        }
    }

    /// Compile and run one unit.
    ///
    /// Names defined by a unit that fails to compile are discarded by the
    /// compiler's rollback. A unit that compiles but fails at runtime keeps
    /// its definitions; globals it never reached stay unbound.
    pub fn eval(&mut self, program: &Program) -> Result<Value, MonkeyError> {
        let bytecode = self.compiler.compile(program)?;

        self.units += 1;
        debug!(unit = self.units, "session eval");
        Ok(self.vm.run(&bytecode)?)
    }

    /// Number of units compiled successfully so far.
    pub fn units(&self) -> usize {
        self.units
    }

    pub fn vm(&self) -> &VM {
        &self.vm
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BlockStatement, Expr, Stmt};
    use crate::error::{CompileError, RuntimeError};
    use pretty_assertions::assert_eq;

    fn program(statements: Vec<Stmt>) -> Program {
        Program::new(statements)
    }

    #[test]
    fn test_globals_survive_between_units() {
        let mut session = Session::new();

        let result = session.eval(&program(vec![Stmt::let_("x", Expr::int(40))]));
        assert_eq!(result.unwrap(), Value::Null);

        let result = session.eval(&program(vec![Stmt::expr(Expr::infix(
            Expr::ident("x"),
            "+",
            Expr::int(2),
        ))]));
        assert_eq!(result.unwrap(), Value::Integer(42));
        assert_eq!(session.units(), 2);
    }

    #[test]
    fn test_functions_defined_earlier_are_callable() {
        let mut session = Session::new();
        session
            .eval(&program(vec![Stmt::let_(
                "double",
                Expr::function(
                    ["n"],
                    BlockStatement::new(vec![Stmt::expr(Expr::infix(
                        Expr::ident("n"),
                        "*",
                        Expr::int(2),
                    ))]),
                ),
            )]))
            .unwrap();

        let result = session.eval(&program(vec![Stmt::expr(Expr::call(
            Expr::ident("double"),
            vec![Expr::int(21)],
        ))]));
        assert_eq!(result.unwrap(), Value::Integer(42));
    }

    #[test]
    fn test_failed_compile_leaves_state_untouched() {
        let mut session = Session::new();

        // let y = 1; missing;
        let err = session
            .eval(&program(vec![
                Stmt::let_("y", Expr::int(1)),
                Stmt::expr(Expr::ident("missing")),
            ]))
            .unwrap_err();
        assert!(matches!(
            err,
            MonkeyError::Compile(CompileError::UndefinedVariable(_))
        ));

        let err = session
            .eval(&program(vec![Stmt::expr(Expr::ident("y"))]))
            .unwrap_err();
        assert!(matches!(err, MonkeyError::Compile(_)));
        assert_eq!(session.units(), 0);
    }

    #[test]
    fn test_runtime_error_keeps_earlier_globals() {
        let mut session = Session::new();
        session
            .eval(&program(vec![Stmt::let_("a", Expr::int(1))]))
            .unwrap();

        let err = session
            .eval(&program(vec![Stmt::expr(Expr::infix(
                Expr::ident("a"),
                "+",
                Expr::bool(true),
            ))]))
            .unwrap_err();
        assert!(matches!(
            err,
            MonkeyError::Runtime(RuntimeError::TypeMismatch { .. })
        ));

        let result = session.eval(&program(vec![Stmt::expr(Expr::ident("a"))]));
        assert_eq!(result.unwrap(), Value::Integer(1));
    }

    #[test]
    fn test_failed_function_body_does_not_leak_scopes() {
        let mut session = Session::new();

        // fn() { missing }
        let err = session
            .eval(&program(vec![Stmt::expr(Expr::function(
                Vec::<String>::new(),
                BlockStatement::new(vec![Stmt::expr(Expr::ident("missing"))]),
            ))]))
            .unwrap_err();
        assert!(matches!(err, MonkeyError::Compile(_)));

        let result = session.eval(&program(vec![
            Stmt::let_("a", Expr::int(1)),
            Stmt::expr(Expr::ident("a")),
        ]));
        assert_eq!(result.unwrap(), Value::Integer(1));
        assert_eq!(session.vm().global(0), Some(&Value::Integer(1)));
    }
}
