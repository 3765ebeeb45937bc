//! Splits postfix source into tokens.
//!
//! Words are separated by whitespace; `#` starts a comment that runs to the
//! end of the line. String literals are single words and cannot contain
//! spaces.

use crate::runtime::error::EvalError;

use super::token::{BINARY_OPERATORS, Token, TokenType, UNARY_OPERATORS};

/// Tokenises a whole chunk.
pub fn tokenize(source: &str) -> Result<Vec<Token>, EvalError> {
    let mut tokens = Vec::new();
    for (line_index, line) in source.lines().enumerate() {
        let line_number = line_index + 1;
        for (column, word) in words(line) {
            if word.starts_with('#') {
                break;
            }
            let token_type = classify(word).map_err(|message| {
                EvalError::Evaluator(format!("{}:{}: {}", line_number, column, message))
            })?;
            tokens.push(Token::new(token_type, word, line_number, column));
        }
    }
    Ok(tokens)
}

/// Whitespace-separated words with their starting column.
fn words(line: &str) -> Vec<(usize, &str)> {
    let mut words = Vec::new();
    let mut start: Option<usize> = None;
    let mut column = 0;
    let mut start_column = 0;
    for (offset, ch) in line.char_indices() {
        if ch.is_whitespace() {
            if let Some(begin) = start.take() {
                words.push((start_column, &line[begin..offset]));
            }
        } else if start.is_none() {
            start = Some(offset);
            start_column = column;
        }
        column += 1;
    }
    if let Some(begin) = start {
        words.push((start_column, &line[begin..]));
    }
    words
}

fn classify(word: &str) -> Result<TokenType, String> {
    if BINARY_OPERATORS.contains(&word) {
        return Ok(TokenType::BinaryOp(word.to_string()));
    }
    if UNARY_OPERATORS.contains(&word) {
        return Ok(TokenType::UnaryOp(word.to_string()));
    }
    match word {
        "true" => return Ok(TokenType::Bool(true)),
        "false" => return Ok(TokenType::Bool(false)),
        "nil" => return Ok(TokenType::Nil),
        "pop" => return Ok(TokenType::Pop),
        "@" => return Ok(TokenType::Index),
        "@=" => return Ok(TokenType::IndexAssign),
        "len" => return Ok(TokenType::Length),
        "if" => return Ok(TokenType::If),
        "else" => return Ok(TokenType::Else),
        "end" => return Ok(TokenType::End),
        _ => {}
    }

    if let Some(rest) = word.strip_prefix('"') {
        return match rest.strip_suffix('"') {
            Some(body) => Ok(TokenType::Str(body.to_string())),
            None => Err(format!("unterminated string {}", word)),
        };
    }
    if let Some(name) = word.strip_prefix("=>") {
        return identifier(name).map(TokenType::DefineConst);
    }
    if let Some(name) = word.strip_prefix("->") {
        return identifier(name).map(TokenType::Define);
    }
    if let Some(name) = word.strip_prefix('=') {
        return identifier(name).map(TokenType::Assign);
    }
    if let Some(count) = word.strip_prefix("array/") {
        return count_suffix(word, count).map(TokenType::Array);
    }
    if let Some(count) = word.strip_prefix("call/") {
        return count_suffix(word, count).map(TokenType::Call);
    }
    if let Some(params) = word.strip_prefix("fn(") {
        let params = params
            .strip_suffix(')')
            .ok_or_else(|| format!("malformed parameter list {}", word))?;
        return parameters(params).map(TokenType::Fn);
    }
    if starts_like_number(word) {
        return word
            .parse::<f64>()
            .map(TokenType::Number)
            .map_err(|_| format!("invalid number {}", word));
    }
    identifier(word).map(TokenType::Name)
}

fn starts_like_number(word: &str) -> bool {
    let digits = word.strip_prefix('-').unwrap_or(word);
    digits.starts_with(|c: char| c.is_ascii_digit() || c == '.')
}

fn identifier(name: &str) -> Result<String, String> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_');
    if valid {
        Ok(name.to_string())
    } else {
        Err(format!("invalid name {:?}", name))
    }
}

fn count_suffix(word: &str, count: &str) -> Result<usize, String> {
    count
        .parse::<usize>()
        .map_err(|_| format!("invalid count in {}", word))
}

fn parameters(list: &str) -> Result<Vec<String>, String> {
    if list.is_empty() {
        return Ok(Vec::new());
    }
    let params = list
        .split(',')
        .map(identifier)
        .collect::<Result<Vec<_>, _>>()?;
    for (i, param) in params.iter().enumerate() {
        if params[..i].contains(param) {
            return Err(format!("duplicate parameter {}", param));
        }
    }
    Ok(params)
}
