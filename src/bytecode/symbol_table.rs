//! Compile-time name resolution across nested lexical scopes.
//!
//! Scopes live in one arena ordered outermost first: index 0 is the global
//! table and each function body being compiled pushes a child whose outer
//! table is the previous entry. All of a function's scope data is released
//! together when the compiler leaves it.

use std::collections::HashMap;

use crate::bytecode::builtins::BUILTINS;

/// Where a resolved name lives at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolScope {
    Global,
    Local,
    Builtin,
    /// Captured from an enclosing function.
    Free,
    /// The function currently being compiled, referenced by its own name.
    Function,
}

/// A name bound to a scope kind and slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub scope: SymbolScope,
    pub index: usize,
}

impl Symbol {
    fn new(name: impl Into<String>, scope: SymbolScope, index: usize) -> Self {
        Self {
            name: name.into(),
            scope,
            index,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Scope {
    store: HashMap<String, Symbol>,
    num_definitions: usize,
    /// Original symbols captured by this scope, in capture order.
    free_symbols: Vec<Symbol>,
}

/// What a function scope leaves behind once compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedScope {
    pub num_definitions: usize,
    pub free_symbols: Vec<Symbol>,
}

/// Global scope state to restore when a compilation unit fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    num_globals: usize,
}

/// The scope chain.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    /// Global bindings replaced since the last checkpoint, oldest first.
    journal: Vec<(String, Option<Symbol>)>,
}

impl SymbolTable {
    /// A table holding only an empty global scope.
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::default()],
            journal: Vec::new(),
        }
    }

    /// A global table seeded with every builtin at its ordinal.
    pub fn with_builtins() -> Self {
        let mut table = Self::new();
        for (index, builtin) in BUILTINS.iter().enumerate() {
            table.define_builtin(index, builtin.name);
        }
        table
    }

    /// Index of the innermost scope; 0 means global.
    pub fn depth(&self) -> usize {
        self.scopes.len() - 1
    }

    pub fn enter_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    /// Pop the innermost function scope. The global scope is never popped.
    pub fn leave_scope(&mut self) -> Option<ClosedScope> {
        if self.scopes.len() == 1 {
            return None;
        }
        self.scopes.pop().map(|scope| ClosedScope {
            num_definitions: scope.num_definitions,
            free_symbols: scope.free_symbols,
        })
    }

    /// Bind `name` to the next slot of the innermost scope.
    ///
    /// Redefinition shadows the old binding; its slot is never reused.
    pub fn define(&mut self, name: &str) -> Symbol {
        let depth = self.depth();
        let scope_kind = if depth == 0 {
            SymbolScope::Global
        } else {
            SymbolScope::Local
        };
        let scope = self.innermost_mut();
        let symbol = Symbol::new(name, scope_kind, scope.num_definitions);
        scope.num_definitions += 1;
        let previous = scope.store.insert(name.to_string(), symbol.clone());
        if depth == 0 {
            self.journal.push((name.to_string(), previous));
        }
        symbol
    }

    /// Register a builtin in the global scope at a fixed ordinal.
    pub fn define_builtin(&mut self, index: usize, name: &str) -> Symbol {
        let symbol = Symbol::new(name, SymbolScope::Builtin, index);
        self.scopes[0].store.insert(name.to_string(), symbol.clone());
        symbol
    }

    /// Bind the name of the function being compiled inside its own body.
    pub fn define_function_name(&mut self, name: &str) -> Symbol {
        let symbol = Symbol::new(name, SymbolScope::Function, 0);
        self.innermost_mut()
            .store
            .insert(name.to_string(), symbol.clone());
        symbol
    }

    /// Record `original` as captured by the scope at `depth` and return the
    /// `Free` symbol that refers to it there.
    pub fn define_free(&mut self, depth: usize, original: Symbol) -> Symbol {
        let scope = &mut self.scopes[depth];
        let symbol = Symbol::new(
            original.name.clone(),
            SymbolScope::Free,
            scope.free_symbols.len(),
        );
        scope.free_symbols.push(original);
        scope.store.insert(symbol.name.clone(), symbol.clone());
        symbol
    }

    /// Start recording global definitions so they can be undone.
    pub fn checkpoint(&mut self) -> Checkpoint {
        self.journal.clear();
        Checkpoint {
            num_globals: self.scopes[0].num_definitions,
        }
    }

    /// Drop every function scope and undo the global definitions made since
    /// `checkpoint`.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        self.scopes.truncate(1);
        let global = &mut self.scopes[0];
        for (name, previous) in self.journal.drain(..).rev() {
            match previous {
                Some(symbol) => {
                    global.store.insert(name, symbol);
                }
                None => {
                    global.store.remove(&name);
                }
            }
        }
        global.num_definitions = checkpoint.num_globals;
    }

    /// Find where `name` originates, walking outward from the innermost
    /// scope. Returns the depth of the defining scope and its symbol.
    ///
    /// Reclassifying outer locals as free variables is the compiler's job.
    pub fn resolve(&self, name: &str) -> Option<(usize, &Symbol)> {
        self.scopes
            .iter()
            .enumerate()
            .rev()
            .find_map(|(depth, scope)| scope.store.get(name).map(|symbol| (depth, symbol)))
    }

    /// Slots claimed so far by the innermost scope.
    pub fn num_definitions(&self) -> usize {
        self.scopes[self.depth()].num_definitions
    }

    /// Symbols captured so far by the innermost scope.
    pub fn free_symbols(&self) -> &[Symbol] {
        &self.scopes[self.depth()].free_symbols
    }

    fn innermost_mut(&mut self) -> &mut Scope {
        let depth = self.depth();
        &mut self.scopes[depth]
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sym(name: &str, scope: SymbolScope, index: usize) -> Symbol {
        Symbol::new(name, scope, index)
    }

    fn resolved(table: &SymbolTable, name: &str) -> Option<Symbol> {
        table.resolve(name).map(|(_, s)| s.clone())
    }

    #[test]
    fn test_define() {
        let mut table = SymbolTable::new();
        assert_eq!(table.define("a"), sym("a", SymbolScope::Global, 0));
        assert_eq!(table.define("b"), sym("b", SymbolScope::Global, 1));

        table.enter_scope();
        assert_eq!(table.define("c"), sym("c", SymbolScope::Local, 0));
        assert_eq!(table.define("d"), sym("d", SymbolScope::Local, 1));

        table.enter_scope();
        assert_eq!(table.define("e"), sym("e", SymbolScope::Local, 0));
        assert_eq!(table.define("f"), sym("f", SymbolScope::Local, 1));
    }

    #[test]
    fn test_redefinition_claims_fresh_slot() {
        let mut table = SymbolTable::new();
        table.define("a");
        let again = table.define("a");

        assert_eq!(again, sym("a", SymbolScope::Global, 1));
        assert_eq!(resolved(&table, "a"), Some(again));
        assert_eq!(table.num_definitions(), 2);
    }

    #[test]
    fn test_resolve_reports_origin() {
        let mut table = SymbolTable::new();
        table.define("a");
        table.enter_scope();
        table.define("b");
        table.enter_scope();
        table.define("c");

        assert_eq!(
            table.resolve("a").map(|(d, s)| (d, s.clone())),
            Some((0, sym("a", SymbolScope::Global, 0)))
        );
        assert_eq!(
            table.resolve("b").map(|(d, s)| (d, s.clone())),
            Some((1, sym("b", SymbolScope::Local, 0)))
        );
        assert_eq!(
            table.resolve("c").map(|(d, s)| (d, s.clone())),
            Some((2, sym("c", SymbolScope::Local, 0)))
        );
        assert!(table.resolve("d").is_none());
    }

    #[test]
    fn test_builtins_live_in_global_scope() {
        let mut table = SymbolTable::with_builtins();
        table.enter_scope();
        table.enter_scope();

        for (i, builtin) in BUILTINS.iter().enumerate() {
            assert_eq!(
                resolved(&table, builtin.name),
                Some(sym(builtin.name, SymbolScope::Builtin, i))
            );
        }
        assert_eq!(table.num_definitions(), 0);
    }

    #[test]
    fn test_define_free() {
        let mut table = SymbolTable::new();
        table.enter_scope();
        let a = table.define("a");
        table.enter_scope();

        let free = table.define_free(2, a.clone());
        assert_eq!(free, sym("a", SymbolScope::Free, 0));
        assert_eq!(table.free_symbols(), &[a]);
        assert_eq!(resolved(&table, "a"), Some(free));

        let closed = table.leave_scope().unwrap();
        assert_eq!(closed.num_definitions, 0);
        assert_eq!(closed.free_symbols.len(), 1);
        assert_eq!(resolved(&table, "a"), Some(sym("a", SymbolScope::Local, 0)));
    }

    #[test]
    fn test_function_name_and_shadowing() {
        let mut table = SymbolTable::new();
        table.enter_scope();
        assert_eq!(
            table.define_function_name("a"),
            sym("a", SymbolScope::Function, 0)
        );
        assert_eq!(table.num_definitions(), 0);

        assert_eq!(table.define("a"), sym("a", SymbolScope::Local, 0));
        assert_eq!(resolved(&table, "a"), Some(sym("a", SymbolScope::Local, 0)));
    }

    #[test]
    fn test_rollback_restores_globals_and_unwinds_scopes() {
        let mut table = SymbolTable::with_builtins();
        table.define("a");
        let checkpoint = table.checkpoint();

        table.define("a");
        table.define("b");
        table.enter_scope();
        table.define("c");
        table.rollback(checkpoint);

        assert_eq!(table.depth(), 0);
        assert_eq!(table.num_definitions(), 1);
        assert_eq!(resolved(&table, "a"), Some(sym("a", SymbolScope::Global, 0)));
        assert!(table.resolve("b").is_none());
        assert_eq!(
            resolved(&table, "len"),
            Some(sym("len", SymbolScope::Builtin, 0))
        );
        assert_eq!(table.define("d"), sym("d", SymbolScope::Global, 1));
    }

    #[test]
    fn test_global_scope_is_never_left() {
        let mut table = SymbolTable::new();
        assert!(table.leave_scope().is_none());
        assert_eq!(table.depth(), 0);
    }
}
