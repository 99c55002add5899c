//! Typed extraction of parse values.

use std::sync::Arc;

use weft_ir::{Node, Value};

use crate::Error;

/// Conversion from a parse [`Value`] into a Rust type.
///
/// Used by [`Parser::parse_as`](crate::Parser::parse_as).
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, Error>;
}

fn mismatch(expected: &'static str, found: &Value) -> Error {
    Error::Conversion {
        expected,
        found: found.type_name(),
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, Error> {
        Ok(value)
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Str(text) => Ok(text),
            Value::Char(c) => Ok(c.to_string()),
            other => Err(mismatch("String", &other)),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<Self, Error> {
        value.as_int().ok_or_else(|| mismatch("i64", &value))
    }
}

/// Integers widen.
impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self, Error> {
        value.as_float().ok_or_else(|| mismatch("f64", &value))
    }
}

impl FromValue for char {
    fn from_value(value: Value) -> Result<Self, Error> {
        value.as_char().ok_or_else(|| mismatch("char", &value))
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, Error> {
        value.as_bool().ok_or_else(|| mismatch("bool", &value))
    }
}

impl FromValue for Node {
    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Node(node) => Ok(Arc::unwrap_or_clone(node)),
            other => Err(mismatch("Node", &other)),
        }
    }
}

/// `Null` is `None`.
impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::List(items) => Arc::unwrap_or_clone(items)
                .into_iter()
                .map(T::from_value)
                .collect(),
            other => Err(mismatch("Vec", &other)),
        }
    }
}
