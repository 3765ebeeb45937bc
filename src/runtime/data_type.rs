use std::fmt;

use serde::{Deserialize, Serialize};

/// Tag carried by every value flowing through Control, Stash and bindings.
///
/// `Pair`, `Array`, `Closure`, `Opaque` and `Frame` values are identifiers
/// into the heap; the rest are primitives stored inline. `List` is only ever
/// used as an expected type in assertions, where it accepts either a `Pair`
/// or the `EmptyList`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum DataType {
    /// An unassigned variable, or the return type of a native closure that
    /// produces nothing. Also the tag of a free heap slot.
    Unassigned = 0,
    Boolean = 1,
    Number = 2,
    ConstString = 3,
    /// The empty list. Its value is always `Value::Null`.
    EmptyList = 4,
    Pair = 5,
    Array = 6,
    Closure = 7,
    Opaque = 8,
    List = 9,
    Frame = 10,
}

impl DataType {
    pub const ALL: [DataType; 11] = [
        DataType::Unassigned,
        DataType::Boolean,
        DataType::Number,
        DataType::ConstString,
        DataType::EmptyList,
        DataType::Pair,
        DataType::Array,
        DataType::Closure,
        DataType::Opaque,
        DataType::List,
        DataType::Frame,
    ];

    /// Returns `true` for tags whose value is a heap identifier.
    pub fn is_reference(self) -> bool {
        matches!(
            self,
            DataType::Pair
                | DataType::Array
                | DataType::Closure
                | DataType::Opaque
                | DataType::Frame
        )
    }

    /// Returns `true` when a value tagged `self` satisfies an assertion for `expected`.
    pub fn satisfies(self, expected: DataType) -> bool {
        if self == expected {
            return true;
        }
        expected == DataType::List && matches!(self, DataType::Pair | DataType::EmptyList)
    }

    /// Stable user-visible label used in error messages.
    pub fn label(self) -> &'static str {
        match self {
            DataType::Unassigned => "UNASSIGNED",
            DataType::Boolean => "BOOLEAN",
            DataType::Number => "NUMBER",
            DataType::ConstString => "CONST_STRING",
            DataType::EmptyList => "EMPTY_LIST",
            DataType::Pair => "PAIR",
            DataType::Array => "ARRAY",
            DataType::Closure => "CLOSURE",
            DataType::Opaque => "OPAQUE",
            DataType::List => "LIST",
            DataType::Frame => "FRAME",
        }
    }

    pub fn to_extern(self) -> ExternType {
        match self {
            DataType::Unassigned | DataType::Frame => ExternType::Void,
            DataType::Boolean => ExternType::Boolean,
            DataType::Number => ExternType::Number,
            DataType::ConstString => ExternType::ConstString,
            DataType::EmptyList => ExternType::EmptyList,
            DataType::Pair => ExternType::Pair,
            DataType::Array => ExternType::Array,
            DataType::Closure => ExternType::Closure,
            DataType::Opaque => ExternType::Opaque,
            DataType::List => ExternType::List,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Type tags as seen by hosts and modules outside the machine.
///
/// Frames never leave the machine, so there is no extern counterpart for
/// `DataType::Frame`; it maps to `Void` like `Unassigned`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ExternType {
    Void = 0,
    Boolean = 1,
    Number = 2,
    ConstString = 3,
    EmptyList = 4,
    Pair = 5,
    Array = 6,
    Closure = 7,
    Opaque = 8,
    List = 9,
}

impl ExternType {
    pub fn to_internal(self) -> DataType {
        match self {
            ExternType::Void => DataType::Unassigned,
            ExternType::Boolean => DataType::Boolean,
            ExternType::Number => DataType::Number,
            ExternType::ConstString => DataType::ConstString,
            ExternType::EmptyList => DataType::EmptyList,
            ExternType::Pair => DataType::Pair,
            ExternType::Array => DataType::Array,
            ExternType::Closure => DataType::Closure,
            ExternType::Opaque => DataType::Opaque,
            ExternType::List => DataType::List,
        }
    }
}

impl From<ExternType> for DataType {
    fn from(value: ExternType) -> Self {
        value.to_internal()
    }
}

impl From<DataType> for ExternType {
    fn from(value: DataType) -> Self {
        value.to_extern()
    }
}

impl TryFrom<u8> for DataType {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        DataType::ALL.get(byte as usize).copied().ok_or(byte)
    }
}
