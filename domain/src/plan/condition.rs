//! Step condition expressions.
//!
//! Grammar:
//!
//! ```text
//! expr    := and ( "||" and )*
//! and     := unary ( "&&" unary )*
//! unary   := "!" unary | compare
//! compare := operand ( ("==" | "!=" | "<" | "<=" | ">" | ">=") operand )?
//! operand := "(" expr ")" | number | string | true | false | null | reference
//! ```
//!
//! References are written either `${step.field}` or bare (`step.field[0]`).
//! A lone operand is tested for truthiness.
//!
//! Conditions come from untrusted plans, so parsing is bounded: at most
//! [`MAX_CONDITION_TOKENS`] tokens and [`MAX_CONDITION_DEPTH`] levels of
//! parentheses or negation.

use super::binding::{BindingError, BindingScope, Reference};
use crate::tool::schema::json_type_name;
use serde_json::Value;
use std::cmp::Ordering;
use thiserror::Error;

/// Upper bound on tokens in one condition.
pub const MAX_CONDITION_TOKENS: usize = 1_024;

/// Upper bound on nested parentheses and `!` operators.
pub const MAX_CONDITION_DEPTH: usize = 64;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConditionError {
    #[error("condition parse error at {position}: {message}")]
    Parse { position: usize, message: String },

    #[error(transparent)]
    Binding(#[from] BindingError),

    #[error("cannot compare {left} with {right}")]
    Incomparable {
        left: &'static str,
        right: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Literal(Value),
    Ref(Reference),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Or(Box<Condition>, Box<Condition>),
    And(Box<Condition>, Box<Condition>),
    Not(Box<Condition>),
    Compare(Operand, CompareOp, Operand),
    Truthy(Operand),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LParen,
    RParen,
    Not,
    And,
    Or,
    Op(CompareOp),
    Literal(Value),
    Ref(Reference),
}

fn parse_error(position: usize, message: impl Into<String>) -> ConditionError {
    ConditionError::Parse {
        position,
        message: message.into(),
    }
}

fn tokenize(text: &str) -> Result<Vec<(usize, Token)>, ConditionError> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let start = i;
        let next = chars.get(i + 1).copied();
        match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '(' => {
                tokens.push((start, Token::LParen));
                i += 1;
            }
            ')' => {
                tokens.push((start, Token::RParen));
                i += 1;
            }
            '&' if next == Some('&') => {
                tokens.push((start, Token::And));
                i += 2;
            }
            '|' if next == Some('|') => {
                tokens.push((start, Token::Or));
                i += 2;
            }
            '=' if next == Some('=') => {
                tokens.push((start, Token::Op(CompareOp::Eq)));
                i += 2;
            }
            '!' if next == Some('=') => {
                tokens.push((start, Token::Op(CompareOp::Ne)));
                i += 2;
            }
            '!' => {
                tokens.push((start, Token::Not));
                i += 1;
            }
            '<' | '>' => {
                let with_eq = next == Some('=');
                let op = match (c, with_eq) {
                    ('<', false) => CompareOp::Lt,
                    ('<', true) => CompareOp::Le,
                    ('>', false) => CompareOp::Gt,
                    _ => CompareOp::Ge,
                };
                tokens.push((start, Token::Op(op)));
                i += if with_eq { 2 } else { 1 };
            }
            '"' | '\'' => {
                let quote = c;
                let mut value = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(parse_error(start, "unterminated string")),
                        Some('\\') => {
                            if let Some(escaped) = chars.get(i + 1) {
                                value.push(*escaped);
                            }
                            i += 2;
                        }
                        Some(ch) if *ch == quote => {
                            i += 1;
                            break;
                        }
                        Some(ch) => {
                            value.push(*ch);
                            i += 1;
                        }
                    }
                }
                tokens.push((start, Token::Literal(Value::String(value))));
            }
            '$' if next == Some('{') => {
                let Some(offset) = chars[i + 2..].iter().position(|ch| *ch == '}') else {
                    return Err(parse_error(start, "unterminated '${'"));
                };
                let inner: String = chars[i + 2..i + 2 + offset].iter().collect();
                tokens.push((start, Token::Ref(Reference::parse(&inner)?)));
                i += offset + 3;
            }
            c if c.is_ascii_digit() || (c == '-' && next.is_some_and(|n| n.is_ascii_digit())) => {
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let raw: String = chars[start..i].iter().collect();
                let number: Value = serde_json::from_str(&raw)
                    .map_err(|_| parse_error(start, format!("invalid number '{}'", raw)))?;
                tokens.push((start, Token::Literal(number)));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                while i < chars.len()
                    && (chars[i].is_ascii_alphanumeric() || matches!(chars[i], '_' | '-' | '.' | '[' | ']'))
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                let token = match word.as_str() {
                    "true" => Token::Literal(Value::Bool(true)),
                    "false" => Token::Literal(Value::Bool(false)),
                    "null" => Token::Literal(Value::Null),
                    _ => Token::Ref(Reference::parse(&word)?),
                };
                tokens.push((start, token));
            }
            other => return Err(parse_error(start, format!("unexpected character '{}'", other))),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn position(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |(p, _)| *p)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        self.pos += 1;
        token
    }

    fn descend(&mut self) -> Result<(), ConditionError> {
        self.depth += 1;
        if self.depth > MAX_CONDITION_DEPTH {
            return Err(parse_error(self.position(), "condition nested too deeply"));
        }
        Ok(())
    }

    fn expr(&mut self) -> Result<Condition, ConditionError> {
        let mut left = self.and()?;
        while self.peek() == Some(&Token::Or) {
            self.advance();
            let right = self.and()?;
            left = Condition::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Condition, ConditionError> {
        let mut left = self.unary()?;
        while self.peek() == Some(&Token::And) {
            self.advance();
            let right = self.unary()?;
            left = Condition::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Condition, ConditionError> {
        if self.peek() == Some(&Token::Not) {
            self.advance();
            self.descend()?;
            let inner = self.unary()?;
            self.depth -= 1;
            return Ok(Condition::Not(Box::new(inner)));
        }
        self.compare()
    }

    fn compare(&mut self) -> Result<Condition, ConditionError> {
        if self.peek() == Some(&Token::LParen) {
            self.advance();
            self.descend()?;
            let inner = self.expr()?;
            if self.advance() != Some(Token::RParen) {
                return Err(parse_error(self.position(), "expected ')'"));
            }
            self.depth -= 1;
            return Ok(inner);
        }

        let left = self.operand()?;
        if let Some(Token::Op(op)) = self.peek().cloned() {
            self.advance();
            let right = self.operand()?;
            return Ok(Condition::Compare(left, op, right));
        }
        Ok(Condition::Truthy(left))
    }

    fn operand(&mut self) -> Result<Operand, ConditionError> {
        let position = self.position();
        match self.advance() {
            Some(Token::Literal(value)) => Ok(Operand::Literal(value)),
            Some(Token::Ref(reference)) => Ok(Operand::Ref(reference)),
            Some(other) => Err(parse_error(position, format!("unexpected token {:?}", other))),
            None => Err(parse_error(position, "unexpected end of expression")),
        }
    }
}

impl Condition {
    pub fn parse(text: &str) -> Result<Self, ConditionError> {
        let tokens = tokenize(text)?;
        if tokens.is_empty() {
            return Err(parse_error(0, "empty condition"));
        }
        if tokens.len() > MAX_CONDITION_TOKENS {
            return Err(parse_error(
                0,
                format!("condition has {} tokens, at most {} allowed", tokens.len(), MAX_CONDITION_TOKENS),
            ));
        }
        let mut parser = Parser {
            tokens,
            pos: 0,
            end: text.len(),
            depth: 0,
        };
        let condition = parser.expr()?;
        if parser.pos < parser.tokens.len() {
            return Err(parse_error(parser.position(), "trailing input"));
        }
        Ok(condition)
    }

    pub fn references(&self) -> Vec<&Reference> {
        let mut out = Vec::new();
        self.collect(&mut out);
        out
    }

    fn collect<'a>(&'a self, out: &mut Vec<&'a Reference>) {
        match self {
            Condition::Or(a, b) | Condition::And(a, b) => {
                a.collect(out);
                b.collect(out);
            }
            Condition::Not(inner) => inner.collect(out),
            Condition::Compare(left, _, right) => {
                for operand in [left, right] {
                    if let Operand::Ref(reference) = operand {
                        out.push(reference);
                    }
                }
            }
            Condition::Truthy(Operand::Ref(reference)) => out.push(reference),
            Condition::Truthy(Operand::Literal(_)) => {}
        }
    }

    pub fn evaluate(&self, scope: &BindingScope) -> Result<bool, ConditionError> {
        match self {
            Condition::Or(a, b) => Ok(a.evaluate(scope)? || b.evaluate(scope)?),
            Condition::And(a, b) => Ok(a.evaluate(scope)? && b.evaluate(scope)?),
            Condition::Not(inner) => Ok(!inner.evaluate(scope)?),
            Condition::Truthy(operand) => Ok(truthy(&operand_value(operand, scope)?)),
            Condition::Compare(left, op, right) => {
                let l = operand_value(left, scope)?;
                let r = operand_value(right, scope)?;
                compare(&l, *op, &r)
            }
        }
    }
}

fn operand_value(operand: &Operand, scope: &BindingScope) -> Result<Value, ConditionError> {
    match operand {
        Operand::Literal(value) => Ok(value.clone()),
        Operand::Ref(reference) => Ok(reference.resolve(scope)?.clone()),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn compare(left: &Value, op: CompareOp, right: &Value) -> Result<bool, ConditionError> {
    let ordering = match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64().zip(b.as_f64()).and_then(|(a, b)| a.partial_cmp(&b)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    };

    match op {
        CompareOp::Eq => Ok(ordering.map_or(left == right, |o| o == Ordering::Equal)),
        CompareOp::Ne => Ok(ordering.map_or(left != right, |o| o != Ordering::Equal)),
        _ => {
            let ordering = ordering.ok_or(ConditionError::Incomparable {
                left: json_type_name(left),
                right: json_type_name(right),
            })?;
            Ok(match op {
                CompareOp::Lt => ordering == Ordering::Less,
                CompareOp::Le => ordering != Ordering::Greater,
                CompareOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            })
        }
    }
}
