use std::{fmt, rc::Rc};

use serde::{Deserialize, Serialize};

use crate::runtime::{data_type::DataType, error::EvalError, gc::Identifier};

/// Untagged payload of a [`TypedValue`].
///
/// Primitives are stored inline; everything else is an [`Identifier`] into
/// the heap. `Rc<str>` keeps cloning strings O(1) as values move between
/// Control, Stash and bindings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Unassigned,
    Boolean(bool),
    Number(f64),
    String(Rc<str>),
    /// Payload of the empty list.
    Null,
    Id(Identifier),
}

impl Value {
    /// The tag family this payload can legally carry.
    fn fits(&self, data_type: DataType) -> bool {
        match self {
            Value::Unassigned => data_type == DataType::Unassigned,
            Value::Boolean(_) => data_type == DataType::Boolean,
            Value::Number(_) => data_type == DataType::Number,
            Value::String(_) => data_type == DataType::ConstString,
            Value::Null => data_type == DataType::EmptyList,
            Value::Id(_) => data_type.is_reference(),
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Value::Unassigned => "unassigned",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Null => "null",
            Value::Id(_) => "identifier",
        }
    }
}

/// A tagged value as it flows through the machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedValue {
    pub data_type: DataType,
    pub value: Value,
}

impl TypedValue {
    /// Tags `value` with `data_type`, rejecting payloads that cannot carry the tag.
    ///
    /// `List` is an assertion-only tag; a `Null` payload becomes `EmptyList`
    /// and an identifier becomes `Pair`.
    pub fn new(data_type: DataType, value: Value) -> Result<Self, EvalError> {
        let data_type = match (data_type, &value) {
            (DataType::List, Value::Null) => DataType::EmptyList,
            (DataType::List, Value::Id(_)) => DataType::Pair,
            _ => data_type,
        };
        if !value.fits(data_type) {
            return Err(EvalError::TypeMismatch {
                context: "Value does not match its type".to_string(),
                expected: data_type.label().to_string(),
                actual: value.kind_name().to_string(),
            });
        }
        Ok(Self { data_type, value })
    }

    pub fn unassigned() -> Self {
        Self {
            data_type: DataType::Unassigned,
            value: Value::Unassigned,
        }
    }

    pub fn boolean(value: bool) -> Self {
        Self {
            data_type: DataType::Boolean,
            value: Value::Boolean(value),
        }
    }

    pub fn number(value: f64) -> Self {
        Self {
            data_type: DataType::Number,
            value: Value::Number(value),
        }
    }

    pub fn string(value: &str) -> Self {
        Self {
            data_type: DataType::ConstString,
            value: Value::String(Rc::from(value)),
        }
    }

    pub fn empty_list() -> Self {
        Self {
            data_type: DataType::EmptyList,
            value: Value::Null,
        }
    }

    /// Wraps a heap identifier. `data_type` must be a reference tag.
    pub fn reference(data_type: DataType, id: Identifier) -> Self {
        debug_assert!(data_type.is_reference());
        Self {
            data_type,
            value: Value::Id(id),
        }
    }

    /// Returns the heap identifier when this value is reference-typed.
    pub fn identifier(&self) -> Option<Identifier> {
        match (&self.value, self.data_type.is_reference()) {
            (Value::Id(id), true) => Some(*id),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self.value {
            Value::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self.value {
            Value::Boolean(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Value::Unassigned => write!(f, "undefined"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Null => write!(f, "null"),
            Value::Id(id) => write!(f, "<{} {}>", self.data_type.label().to_lowercase(), id),
        }
    }
}

/// Renders integral numbers without a trailing `.0`.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}
