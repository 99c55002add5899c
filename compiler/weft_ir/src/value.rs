//! Parse values.
//!
//! Lists and objects are reference-counted so that memoized results can be
//! handed out repeatedly without deep copies. Mutation during construction
//! goes through `Arc::make_mut`, which is copy-free while the value is still
//! uniquely owned by the program building it.

use std::fmt;
use std::sync::Arc;

use crate::Name;

/// A value produced by a matcher.
#[derive(Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    /// Absent value (an unmatched `Optional`, an unset slot).
    #[default]
    Null,
    Bool(bool),
    Char(char),
    Int(i64),
    Float(f64),
    Str(String),
    List(Arc<Vec<Value>>),
    Node(Arc<Node>),
}

impl Value {
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Arc::new(items))
    }

    pub fn str(text: impl Into<String>) -> Self {
        Value::Str(text.into())
    }

    pub fn node(node: Node) -> Self {
        Value::Node(Arc::new(node))
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric value as `f64`; integers are widened.
    #[expect(
        clippy::cast_precision_loss,
        reason = "widening parsed integers to float is the documented behaviour"
    )]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(n) => Some(*n),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_char(&self) -> Option<char> {
        match self {
            Value::Char(c) => Some(*c),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Value::Node(node) => Some(node.as_ref()),
            _ => None,
        }
    }

    /// Short name of the value's variant, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Char(_) => "char",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Node(_) => "node",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Char(c) => write!(f, "{c:?}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(n) => write!(f, "{n:?}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Node(node) => write!(f, "{node}"),
        }
    }
}

/// An object produced by a typed sequence.
///
/// Fields keep the order in which they were first written, which for
/// grammar-built nodes is the declaration order of the sequence parts.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Node {
    ty: Name,
    fields: Vec<(Name, Value)>,
}

impl Node {
    pub fn new(ty: impl Into<Name>) -> Self {
        Self {
            ty: ty.into(),
            fields: Vec::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, slot: impl Into<Name>, value: Value) -> Self {
        self.set(slot.into(), value);
        self
    }

    pub fn ty(&self) -> &str {
        &self.ty
    }

    pub fn fields(&self) -> &[(Name, Value)] {
        &self.fields
    }

    pub fn get(&self, slot: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| &**name == slot)
            .map(|(_, v)| v)
    }

    /// Write a slot, replacing any earlier value.
    pub fn set(&mut self, slot: Name, value: Value) {
        match self.fields.iter_mut().find(|(name, _)| *name == slot) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((slot, value)),
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {{", self.ty)?;
        for (i, (name, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, " {name}: {value}")?;
        }
        f.write_str(" }")
    }
}
