//! Runtime values shared by the compiler's constant pool and the VM.

use std::fmt;
use std::hash::BuildHasher;
use std::rc::Rc;
use std::sync::OnceLock;

use indexmap::IndexMap;

use crate::bytecode::builtins::Builtin;
use crate::bytecode::chunk::Instructions;

/// Hash literal storage, keyed by the derived [`HashKey`].
pub type HashPairs = IndexMap<HashKey, HashPair, ahash::RandomState>;

/// Runtime value for the bytecode VM.
#[derive(Debug, Clone)]
pub enum Value {
    Integer(i64),
    Boolean(bool),
    Null,
    String(Rc<str>),
    Array(Rc<Vec<Value>>),
    Hash(Rc<HashPairs>),
    CompiledFunction(Rc<CompiledFunction>),
    Closure(Rc<Closure>),
    Builtin(&'static Builtin),
    /// Wrapper used by a tree-walking evaluator to unwind `return`. The VM
    /// never produces it.
    ReturnValue(Box<Value>),
    /// In-band error produced by builtins.
    Error(Rc<str>),
}

/// A compiled function body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledFunction {
    pub instructions: Instructions,
    /// Local slots, parameters included.
    pub num_locals: usize,
    pub num_parameters: usize,
    /// Binding name when the literal was the value of a `let`.
    pub name: Option<String>,
}

impl CompiledFunction {
    pub fn new(instructions: Instructions, num_locals: usize, num_parameters: usize) -> Self {
        Self {
            instructions,
            num_locals,
            num_parameters,
            name: None,
        }
    }
}

/// A compiled function bundled with the values it captured.
#[derive(Debug, Clone)]
pub struct Closure {
    pub function: Rc<CompiledFunction>,
    pub free: Vec<Value>,
}

impl Closure {
    pub fn new(function: Rc<CompiledFunction>, free: Vec<Value>) -> Self {
        Self { function, free }
    }
}

/// Type tag carried by a [`HashKey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashKeyKind {
    Integer,
    Boolean,
    String,
}

/// Type-tagged 64-bit digest used to compare values as hash keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HashKey {
    pub kind: HashKeyKind,
    pub value: u64,
}

/// A stored hash entry keeps the original key for display and iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct HashPair {
    pub key: Value,
    pub value: Value,
}

fn string_hasher() -> &'static ahash::RandomState {
    static HASHER: OnceLock<ahash::RandomState> = OnceLock::new();
    HASHER.get_or_init(|| {
        ahash::RandomState::with_seeds(
            0x6d6f_6e6b_6579_0001,
            0x243f_6a88_85a3_08d3,
            0x1319_8a2e_0370_7344,
            0xa409_3822_299f_31d0,
        )
    })
}

impl Value {
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::String(Rc::from(s.as_ref()))
    }

    pub fn array(elements: Vec<Value>) -> Self {
        Value::Array(Rc::new(elements))
    }

    pub fn error(message: impl AsRef<str>) -> Self {
        Value::Error(Rc::from(message.as_ref()))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "INTEGER",
            Value::Boolean(_) => "BOOLEAN",
            Value::Null => "NULL",
            Value::String(_) => "STRING",
            Value::Array(_) => "ARRAY",
            Value::Hash(_) => "HASH",
            Value::CompiledFunction(_) => "COMPILED_FUNCTION",
            Value::Closure(_) => "CLOSURE",
            Value::Builtin(_) => "BUILTIN",
            Value::ReturnValue(_) => "RETURN_VALUE",
            Value::Error(_) => "ERROR",
        }
    }

    /// Only `false` and `null` are falsy. Zero, empty strings and empty
    /// collections are truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Boolean(false) | Value::Null)
    }

    /// Derive the hash key, or `None` for values that cannot key a hash.
    ///
    /// Only immutable scalar content is hashable.
    pub fn hash_key(&self) -> Option<HashKey> {
        match self {
            Value::Integer(n) => Some(HashKey {
                kind: HashKeyKind::Integer,
                value: *n as u64,
            }),
            Value::Boolean(b) => Some(HashKey {
                kind: HashKeyKind::Boolean,
                value: u64::from(*b),
            }),
            Value::String(s) => Some(HashKey {
                kind: HashKeyKind::String,
                value: string_hasher().hash_one(s.as_bytes()),
            }),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Hash(a), Value::Hash(b)) => a == b,
            (Value::CompiledFunction(a), Value::CompiledFunction(b)) => a == b,
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => a.name == b.name,
            (Value::ReturnValue(a), Value::ReturnValue(b)) => a == b,
            (Value::Error(a), Value::Error(b)) => a == b,
            _ => false,
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{}", n),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Null => write!(f, "null"),
            Value::String(s) => write!(f, "{}", s),
            Value::Array(elements) => {
                write!(f, "[")?;
                for (i, val) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", val)?;
                }
                write!(f, "]")
            }
            Value::Hash(pairs) => {
                write!(f, "{{")?;
                for (i, pair) in pairs.values().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", pair.key, pair.value)?;
                }
                write!(f, "}}")
            }
            Value::CompiledFunction(function) => {
                write!(f, "CompiledFunction[{:p}]", Rc::as_ptr(function))
            }
            Value::Closure(closure) => write!(f, "Closure[{:p}]", Rc::as_ptr(closure)),
            Value::Builtin(_) => write!(f, "builtin function"),
            Value::ReturnValue(inner) => write!(f, "{}", inner),
            Value::Error(message) => write!(f, "ERROR: {}", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_string_hash_key() {
        let hello1 = Value::string("Hello World");
        let hello2 = Value::string("Hello World");
        let diff1 = Value::string("My name is johnny");
        let diff2 = Value::string("My name is johnny");

        assert_eq!(hello1.hash_key(), hello2.hash_key());
        assert_eq!(diff1.hash_key(), diff2.hash_key());
        assert_ne!(hello1.hash_key(), diff1.hash_key());
    }

    #[test]
    fn test_integer_and_boolean_keys_never_collide() {
        let one = Value::Integer(1).hash_key().unwrap();
        let truth = Value::Boolean(true).hash_key().unwrap();

        assert_eq!(one.value, truth.value);
        assert_ne!(one, truth);
        assert_eq!(Value::Integer(42).hash_key(), Value::Integer(42).hash_key());
    }

    #[test]
    fn test_unhashable_values() {
        assert_eq!(Value::array(vec![]).hash_key(), None);
        assert_eq!(Value::Null.hash_key(), None);
        assert_eq!(
            Value::CompiledFunction(Rc::new(CompiledFunction::default())).hash_key(),
            None
        );
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Boolean(false).is_truthy());
        assert!(!Value::Null.is_truthy());
        assert!(Value::Integer(0).is_truthy());
        assert!(Value::string("").is_truthy());
        assert!(Value::array(vec![]).is_truthy());
    }

    #[test]
    fn test_display() {
        let mut pairs = HashPairs::default();
        for (k, v) in [(Value::Integer(1), Value::string("a")), (Value::Boolean(true), Value::Null)] {
            pairs.insert(k.hash_key().unwrap(), HashPair { key: k, value: v });
        }

        assert_eq!(
            Value::array(vec![Value::Integer(1), Value::string("two")]).to_string(),
            "[1, two]"
        );
        assert_eq!(Value::Hash(Rc::new(pairs)).to_string(), "{1: a, true: null}");
        assert_eq!(Value::error("boom").to_string(), "ERROR: boom");
    }
}
