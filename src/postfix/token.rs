use std::fmt;

use crate::runtime::language::SourceLocation;

/// Every word the postfix lexer recognises.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenType {
    Number(f64),
    Str(String),
    Bool(bool),
    Nil,
    Name(String),
    /// `=x`
    Assign(String),
    /// `->x`
    Define(String),
    /// `=>x`
    DefineConst(String),
    BinaryOp(String),
    UnaryOp(String),
    Pop,
    /// `array/N`
    Array(usize),
    /// `@`
    Index,
    /// `@=`
    IndexAssign,
    /// `len`
    Length,
    /// `call/N`
    Call(usize),
    If,
    Else,
    End,
    /// `fn(a,b)`
    Fn(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    pub literal: String,
    pub position: SourceLocation,
}

impl Token {
    pub fn new(token_type: TokenType, literal: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            token_type,
            literal: literal.into(),
            position: SourceLocation::new(line, column),
        }
    }

    /// Location just past the last character of this token.
    pub fn end(&self) -> SourceLocation {
        SourceLocation::new(
            self.position.line,
            self.position.column + self.literal.chars().count(),
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} at {}", self.literal, self.position)
    }
}

pub(crate) const BINARY_OPERATORS: &[&str] =
    &["+", "-", "*", "/", "%", "<", ">", "<=", ">=", "==", "!="];

pub(crate) const UNARY_OPERATORS: &[&str] = &["neg", "not"];
