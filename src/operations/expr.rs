//! Arithmetic formulas over row fields, evaluated by [`MathMapper`](super::mappers::MathMapper).
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! xor   := sum ('^' sum)*
//! sum   := term (('+' | '-') term)*
//! term  := unary (('*' | '/') unary)*
//! unary := '-' unary | power
//! power := atom ('**' unary)?
//! atom  := number | field | '(' xor ')'
//! ```
//!
//! `**` is right-associative and binds tighter than a leading minus, so `-2 ** 2` is `-4`.
//! Integer operands stay integral under `+ - * ** ^`; `/` always yields a float.

use crate::error::{Error, Result};
use crate::row::Row;
use crate::value::Value;
use std::iter::Peekable;
use std::str::CharIndices;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Xor,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Num(Value),
    Field(String),
    Neg(Box<Expr>),
    Bin(BinOp, Box<Expr>, Box<Expr>),
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Num(Value),
    Ident(String),
    Op(BinOp),
    LParen,
    RParen,
}

fn tokenize(src: &str) -> std::result::Result<Vec<Token>, String> {
    let mut out = Vec::new();
    let mut chars: Peekable<CharIndices> = src.char_indices().peekable();
    while let Some(&(start, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '0'..='9' | '.' => {
                let mut end = start;
                let mut float = false;
                while let Some(&(i, d)) = chars.peek() {
                    if d.is_ascii_digit() {
                        end = i + 1;
                    } else if d == '.' || d == 'e' || d == 'E' {
                        float = true;
                        end = i + 1;
                    } else if (d == '+' || d == '-') && src[..i].ends_with(['e', 'E']) {
                        end = i + 1;
                    } else {
                        break;
                    }
                    chars.next();
                }
                let text = &src[start..end];
                let num = if float {
                    text.parse::<f64>().map(Value::Float).map_err(|_| ())
                } else {
                    text.parse::<i64>().map(Value::Int).map_err(|_| ())
                };
                out.push(Token::Num(
                    num.map_err(|()| format!("invalid number `{text}`"))?,
                ));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut end = start;
                while let Some(&(i, d)) = chars.peek() {
                    if d.is_alphanumeric() || d == '_' {
                        end = i + d.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                out.push(Token::Ident(src[start..end].to_string()));
            }
            '*' => {
                chars.next();
                if chars.peek().is_some_and(|&(_, d)| d == '*') {
                    chars.next();
                    out.push(Token::Op(BinOp::Pow));
                } else {
                    out.push(Token::Op(BinOp::Mul));
                }
            }
            '+' | '-' | '/' | '^' | '(' | ')' => {
                chars.next();
                out.push(match c {
                    '+' => Token::Op(BinOp::Add),
                    '-' => Token::Op(BinOp::Sub),
                    '/' => Token::Op(BinOp::Div),
                    '^' => Token::Op(BinOp::Xor),
                    '(' => Token::LParen,
                    _ => Token::RParen,
                });
            }
            other => return Err(format!("unsupported character `{other}` at {start}")),
        }
    }
    Ok(out)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn eat_op(&mut self, ops: &[BinOp]) -> Option<BinOp> {
        match self.peek() {
            Some(Token::Op(op)) if ops.contains(op) => {
                let op = *op;
                self.pos += 1;
                Some(op)
            }
            _ => None,
        }
    }

    fn left_assoc(
        &mut self,
        ops: &[BinOp],
        next: fn(&mut Self) -> std::result::Result<Expr, String>,
    ) -> std::result::Result<Expr, String> {
        let mut lhs = next(self)?;
        while let Some(op) = self.eat_op(ops) {
            let rhs = next(self)?;
            lhs = Expr::Bin(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn xor(&mut self) -> std::result::Result<Expr, String> {
        self.left_assoc(&[BinOp::Xor], Self::sum)
    }

    fn sum(&mut self) -> std::result::Result<Expr, String> {
        self.left_assoc(&[BinOp::Add, BinOp::Sub], Self::term)
    }

    fn term(&mut self) -> std::result::Result<Expr, String> {
        self.left_assoc(&[BinOp::Mul, BinOp::Div], Self::unary)
    }

    fn unary(&mut self) -> std::result::Result<Expr, String> {
        if self.eat_op(&[BinOp::Sub]).is_some() {
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        self.power()
    }

    fn power(&mut self) -> std::result::Result<Expr, String> {
        let base = self.atom()?;
        if self.eat_op(&[BinOp::Pow]).is_some() {
            let exp = self.unary()?;
            return Ok(Expr::Bin(BinOp::Pow, Box::new(base), Box::new(exp)));
        }
        Ok(base)
    }

    fn atom(&mut self) -> std::result::Result<Expr, String> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        match token {
            Some(Token::Num(v)) => Ok(Expr::Num(v)),
            Some(Token::Ident(name)) => Ok(Expr::Field(name)),
            Some(Token::LParen) => {
                let inner = self.xor()?;
                match self.tokens.get(self.pos) {
                    Some(Token::RParen) => {
                        self.pos += 1;
                        Ok(inner)
                    }
                    _ => Err("missing `)`".to_string()),
                }
            }
            Some(t) => Err(format!("unexpected token {t:?}")),
            None => Err("unexpected end of formula".to_string()),
        }
    }
}

impl Expr {
    /// Parse `formula`; the error is a human-readable reason.
    pub fn parse(formula: &str) -> std::result::Result<Expr, String> {
        let mut parser = Parser {
            tokens: tokenize(formula)?,
            pos: 0,
        };
        let expr = parser.xor()?;
        match parser.peek() {
            None => Ok(expr),
            Some(t) => Err(format!("unexpected trailing token {t:?}")),
        }
    }

    /// Evaluate against `row`. `formula` only labels errors.
    ///
    /// # Errors
    /// [`Error::MissingField`] for unknown fields, [`Error::Expression`] for non-numeric
    /// operands, overflow, division by zero or `^` on non-integers.
    pub fn eval(&self, row: &Row, formula: &str) -> Result<Value> {
        match self {
            Expr::Num(v) => Ok(v.clone()),
            Expr::Field(name) => {
                let v = row.get(name)?;
                if v.is_number() {
                    Ok(v.clone())
                } else {
                    Err(Error::expression(
                        formula,
                        format!("field `{name}` is {}, not a number", v.kind()),
                    ))
                }
            }
            Expr::Neg(inner) => match inner.eval(row, formula)? {
                Value::Int(i) => i
                    .checked_neg()
                    .map(Value::Int)
                    .ok_or_else(|| Error::expression(formula, "integer overflow")),
                other => Ok(Value::Float(-other.as_f64()?)),
            },
            Expr::Bin(op, lhs, rhs) => {
                apply(*op, lhs.eval(row, formula)?, rhs.eval(row, formula)?, formula)
            }
        }
    }
}

fn apply(op: BinOp, a: Value, b: Value, formula: &str) -> Result<Value> {
    let overflow = || Error::expression(formula, "integer overflow");
    if let (Value::Int(x), Value::Int(y)) = (&a, &b) {
        let (x, y) = (*x, *y);
        match op {
            BinOp::Add => return x.checked_add(y).map(Value::Int).ok_or_else(overflow),
            BinOp::Sub => return x.checked_sub(y).map(Value::Int).ok_or_else(overflow),
            BinOp::Mul => return x.checked_mul(y).map(Value::Int).ok_or_else(overflow),
            BinOp::Xor => return Ok(Value::Int(x ^ y)),
            BinOp::Pow if y >= 0 => {
                let exp = u32::try_from(y).map_err(|_| overflow())?;
                return x.checked_pow(exp).map(Value::Int).ok_or_else(overflow);
            }
            BinOp::Div | BinOp::Pow => {}
        }
    }
    let (x, y) = (a.as_f64()?, b.as_f64()?);
    match op {
        BinOp::Add => Ok(Value::Float(x + y)),
        BinOp::Sub => Ok(Value::Float(x - y)),
        BinOp::Mul => Ok(Value::Float(x * y)),
        BinOp::Div if y == 0.0 => Err(Error::expression(formula, "division by zero")),
        BinOp::Div => Ok(Value::Float(x / y)),
        BinOp::Pow => Ok(Value::Float(x.powf(y))),
        BinOp::Xor => Err(Error::expression(formula, "`^` needs integer operands")),
    }
}
