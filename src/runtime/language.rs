use std::fmt;

use serde::{Deserialize, Serialize};

use crate::runtime::{
    error::EvalError, instruction::Instruction, state::MachineState, value::TypedValue,
};

/// A position in chunk text. Lines are 1-based, columns 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// One parsed unit of source. The payload is opaque to the machine.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment<T> {
    pub start: SourceLocation,
    pub end: SourceLocation,
    pub fragment: T,
}

impl<T> Fragment<T> {
    pub fn new(start: SourceLocation, end: SourceLocation, fragment: T) -> Self {
        Self {
            start,
            end,
            fragment,
        }
    }
}

/// The language collaborator: parsing, lowering and operator semantics.
///
/// The machine never looks inside a fragment. It hands fragments back to the
/// language, which lowers them into instructions in Control order (the last
/// element of the returned list runs next).
pub trait Language {
    type Fragment: Clone + fmt::Debug + 'static;

    fn process_chunk(&self, chunk: &str) -> Result<Fragment<Self::Fragment>, EvalError>;

    fn evaluate_fragment(
        &self,
        fragment: &Fragment<Self::Fragment>,
        state: &MachineState<Self::Fragment>,
    ) -> Result<Vec<Instruction<Self::Fragment>>, EvalError>;

    fn binary_op(
        &self,
        op: &str,
        lhs: &TypedValue,
        rhs: &TypedValue,
    ) -> Result<TypedValue, EvalError>;

    fn unary_op(&self, op: &str, operand: &TypedValue) -> Result<TypedValue, EvalError>;
}
