//! A small stack language used to drive the machine from the CLI and tests.
//!
//! ```text
//! 1 2 + ->x              # define x = 3
//! fn(a,b) a b * end =>mul
//! x 4 mul call/2         # 12
//! x 10 < if "small" else "big" end
//! ```

use std::rc::Rc;

use crate::runtime::{
    error::EvalError,
    instruction::Instruction,
    language::{Fragment, Language, SourceLocation},
    state::MachineState,
    value::TypedValue,
};

pub mod lexer;
mod lowering;
pub mod ops;
pub mod parser;
pub mod token;

pub use parser::Node;

/// A parsed chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct Program(pub Rc<[Node]>);

#[derive(Debug, Default, Clone, Copy)]
pub struct PostfixLanguage;

impl PostfixLanguage {
    pub fn new() -> Self {
        Self
    }

    /// Parses `source` without wrapping it in a fragment.
    pub fn parse(&self, source: &str) -> Result<Vec<Node>, EvalError> {
        let tokens = lexer::tokenize(source)?;
        parser::Parser::new(tokens).parse_program()
    }
}

/// Net number of `if` / `fn(...)` blocks opened and not yet closed by `end`.
pub fn block_depth(text: &str) -> i64 {
    let mut depth = 0;
    for line in text.lines() {
        for word in line.split_whitespace() {
            if word.starts_with('#') {
                break;
            }
            if word == "if" || word.starts_with("fn(") {
                depth += 1;
            } else if word == "end" {
                depth -= 1;
            }
        }
    }
    depth
}

/// Groups source lines into chunks, one per line except that an open `if`
/// or `fn(...)` block keeps following lines in the same chunk until its `end`.
pub fn split_chunks(source: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut depth = 0;
    for line in source.lines() {
        depth += block_depth(line);
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);
        if depth <= 0 {
            if !current.trim().is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            current.clear();
            depth = 0;
        }
    }
    if !current.trim().is_empty() {
        chunks.push(current);
    }
    chunks
}

impl Language for PostfixLanguage {
    type Fragment = Program;

    fn process_chunk(&self, chunk: &str) -> Result<Fragment<Program>, EvalError> {
        let tokens = lexer::tokenize(chunk)?;
        let start = tokens
            .first()
            .map(|t| t.position)
            .unwrap_or_else(|| SourceLocation::new(1, 0));
        let end = tokens.last().map(|t| t.end()).unwrap_or(start);
        let nodes = parser::Parser::new(tokens).parse_program()?;
        Ok(Fragment::new(start, end, Program(Rc::from(nodes))))
    }

    fn evaluate_fragment(
        &self,
        fragment: &Fragment<Program>,
        _state: &MachineState<Program>,
    ) -> Result<Vec<Instruction<Program>>, EvalError> {
        Ok(lowering::lower(&fragment.fragment.0))
    }

    fn binary_op(&self, op: &str, lhs: &TypedValue, rhs: &TypedValue) -> Result<TypedValue, EvalError> {
        ops::binary_op(op, lhs, rhs)
    }

    fn unary_op(&self, op: &str, operand: &TypedValue) -> Result<TypedValue, EvalError> {
        ops::unary_op(op, operand)
    }
}
