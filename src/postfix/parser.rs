use std::rc::Rc;

use crate::runtime::{error::EvalError, language::SourceLocation, value::TypedValue};

use super::token::{Token, TokenType};

/// Postfix syntax tree. Each node consumes and produces stash values in the
/// order written.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Literal(TypedValue),
    Name(Rc<str>),
    Assign(Rc<str>),
    Define { name: Rc<str>, constant: bool },
    BinaryOp(Rc<str>),
    UnaryOp(Rc<str>),
    Pop,
    Array(usize),
    Index,
    IndexAssign,
    Length,
    Call(usize),
    If {
        consequent: Vec<Node>,
        alternate: Option<Vec<Node>>,
    },
    Function {
        params: Vec<String>,
        body: Vec<Node>,
    },
}

/// What closed a nested block.
enum Terminator {
    Else,
    End,
    Eof,
}

/// Builds nodes from a token stream.
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            position: 0,
        }
    }

    pub fn parse_program(&mut self) -> Result<Vec<Node>, EvalError> {
        let (nodes, terminator) = self.parse_block()?;
        match terminator {
            Terminator::Eof => Ok(nodes),
            Terminator::Else => Err(self.error_at_previous("else without if")),
            Terminator::End => Err(self.error_at_previous("end without if or fn")),
        }
    }

    fn parse_block(&mut self) -> Result<(Vec<Node>, Terminator), EvalError> {
        let mut nodes = Vec::new();
        while let Some(token) = self.tokens.get(self.position).cloned() {
            self.position += 1;
            let start = token.position;
            let node = match token.token_type {
                TokenType::Else => return Ok((nodes, Terminator::Else)),
                TokenType::End => return Ok((nodes, Terminator::End)),
                TokenType::If => self.parse_if(start)?,
                TokenType::Fn(params) => self.parse_function(start, params)?,
                TokenType::Number(n) => Node::Literal(TypedValue::number(n)),
                TokenType::Str(s) => Node::Literal(TypedValue::string(&s)),
                TokenType::Bool(b) => Node::Literal(TypedValue::boolean(b)),
                TokenType::Nil => Node::Literal(TypedValue::empty_list()),
                TokenType::Name(name) => Node::Name(Rc::from(name)),
                TokenType::Assign(name) => Node::Assign(Rc::from(name)),
                TokenType::Define(name) => Node::Define {
                    name: Rc::from(name),
                    constant: false,
                },
                TokenType::DefineConst(name) => Node::Define {
                    name: Rc::from(name),
                    constant: true,
                },
                TokenType::BinaryOp(op) => Node::BinaryOp(Rc::from(op)),
                TokenType::UnaryOp(op) => Node::UnaryOp(Rc::from(op)),
                TokenType::Pop => Node::Pop,
                TokenType::Array(n) => Node::Array(n),
                TokenType::Index => Node::Index,
                TokenType::IndexAssign => Node::IndexAssign,
                TokenType::Length => Node::Length,
                TokenType::Call(n) => Node::Call(n),
            };
            nodes.push(node);
        }
        Ok((nodes, Terminator::Eof))
    }

    fn parse_if(&mut self, start: SourceLocation) -> Result<Node, EvalError> {
        let (consequent, terminator) = self.parse_block()?;
        let alternate = match terminator {
            Terminator::End => None,
            Terminator::Else => {
                let (alternate, terminator) = self.parse_block()?;
                match terminator {
                    Terminator::End => Some(alternate),
                    Terminator::Else => return Err(self.error_at_previous("second else in if")),
                    Terminator::Eof => return Err(error_at(start, "unterminated if")),
                }
            }
            Terminator::Eof => return Err(error_at(start, "unterminated if")),
        };
        Ok(Node::If {
            consequent,
            alternate,
        })
    }

    fn parse_function(&mut self, start: SourceLocation, params: Vec<String>) -> Result<Node, EvalError> {
        let (body, terminator) = self.parse_block()?;
        match terminator {
            Terminator::End => Ok(Node::Function { params, body }),
            Terminator::Else => Err(self.error_at_previous("else without if")),
            Terminator::Eof => Err(error_at(start, "unterminated fn")),
        }
    }

    fn error_at_previous(&self, message: &str) -> EvalError {
        let position = self
            .position
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|t| t.position)
            .unwrap_or_default();
        error_at(position, message)
    }
}

fn error_at(position: SourceLocation, message: &str) -> EvalError {
    EvalError::Evaluator(format!("{}: {}", position, message))
}
