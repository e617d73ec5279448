//! Symbolic expression text: tokenizer, recursive-descent parser and a
//! canonical printer.
//!
//! The grammar covers what users type into angle, phase and operator fields:
//! numbers, names, `+ - * / ^` (`**` is accepted as `^`), unary signs,
//! parentheses and function calls such as `cos(q)`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest expression, in tokens, the parser accepts.
pub const MAX_TOKENS: usize = 2048;
/// Deepest nesting of parentheses, calls and unary signs.
pub const MAX_NESTING: usize = 100;

const NEG_PRECEDENCE: u8 = 3;
const ATOM_PRECEDENCE: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinaryOp {
    fn precedence(self) -> u8 {
        match self {
            Self::Add | Self::Sub => 1,
            Self::Mul | Self::Div => 2,
            Self::Pow => 4,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Self::Add => " + ",
            Self::Sub => " - ",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Pow => "^",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expr {
    Number(String),
    Ident(String),
    Neg(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// Zero-based character column where parsing stopped.
    pub position: usize,
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at column {}", self.message, self.position + 1)
    }
}

impl std::error::Error for ParseError {}

/// True for ASCII names of the form `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl Expr {
    fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Self::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Self::Number(_) | Self::Ident(_) | Self::Call { .. } => ATOM_PRECEDENCE,
            Self::Neg(_) => NEG_PRECEDENCE,
            Self::Binary { op, .. } => op.precedence(),
        }
    }

    fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Expr)) {
        visit(self);
        match self {
            Self::Number(_) | Self::Ident(_) => {}
            Self::Neg(inner) => inner.walk(visit),
            Self::Binary { lhs, rhs, .. } => {
                lhs.walk(visit);
                rhs.walk(visit);
            }
            Self::Call { args, .. } => {
                for arg in args {
                    arg.walk(visit);
                }
            }
        }
    }

    /// Names used as values, in first-seen order and without duplicates.
    pub fn identifiers(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        self.walk(&mut |e| {
            if let Expr::Ident(name) = e {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
        });
        out
    }

    /// Names used as functions, in first-seen order and without duplicates.
    pub fn function_names(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        self.walk(&mut |e| {
            if let Expr::Call { name, .. } = e {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
        });
        out
    }

    fn write_with(&self, f: &mut fmt::Formatter<'_>, min_precedence: u8) -> fmt::Result {
        if self.precedence() < min_precedence {
            write!(f, "(")?;
            self.write_inner(f)?;
            write!(f, ")")
        } else {
            self.write_inner(f)
        }
    }

    fn write_inner(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(text) | Self::Ident(text) => write!(f, "{text}"),
            Self::Neg(inner) => {
                write!(f, "-")?;
                inner.write_with(f, NEG_PRECEDENCE + 1)
            }
            Self::Binary { op, lhs, rhs } => {
                let p = op.precedence();
                let (lhs_min, rhs_min) = match op {
                    BinaryOp::Pow => (ATOM_PRECEDENCE, p),
                    _ => (p, p + 1),
                };
                lhs.write_with(f, lhs_min)?;
                write!(f, "{}", op.symbol())?;
                rhs.write_with(f, rhs_min)
            }
            Self::Call { name, args } => {
                write!(f, "{name}(")?;
                for (idx, arg) in args.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    arg.write_with(f, 0)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_with(f, 0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Number(String),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
    Comma,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Self::Number(n) => format!("number '{n}'"),
            Self::Ident(name) => format!("name '{name}'"),
            Self::Plus => "'+'".to_string(),
            Self::Minus => "'-'".to_string(),
            Self::Star => "'*'".to_string(),
            Self::Slash => "'/'".to_string(),
            Self::Caret => "'^'".to_string(),
            Self::LParen => "'('".to_string(),
            Self::RParen => "')'".to_string(),
            Self::Comma => "','".to_string(),
        }
    }
}

fn tokenize(text: &str) -> Result<Vec<(usize, Token)>, ParseError> {
    let chars: Vec<char> = text.chars().collect();
    let mut out = Vec::new();
    let mut idx = 0usize;
    while idx < chars.len() {
        let ch = chars[idx];
        let single = match ch {
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '/' => Some(Token::Slash),
            '^' => Some(Token::Caret),
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            ',' => Some(Token::Comma),
            _ => None,
        };
        if let Some(token) = single {
            out.push((idx, token));
            idx += 1;
            continue;
        }
        match ch {
            c if c.is_whitespace() => idx += 1,
            '*' => {
                if chars.get(idx + 1) == Some(&'*') {
                    out.push((idx, Token::Caret));
                    idx += 2;
                } else {
                    out.push((idx, Token::Star));
                    idx += 1;
                }
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = idx;
                let mut seen_dot = false;
                while idx < chars.len() {
                    let c = chars[idx];
                    if c.is_ascii_digit() {
                        idx += 1;
                    } else if c == '.' && !seen_dot {
                        seen_dot = true;
                        idx += 1;
                    } else {
                        break;
                    }
                }
                let number: String = chars[start..idx].iter().collect();
                if number == "." {
                    return Err(ParseError {
                        position: start,
                        message: "Expected digits around '.'".to_string(),
                    });
                }
                if let Some(&next) = chars.get(idx) {
                    if next.is_ascii_alphabetic() || next == '_' {
                        return Err(ParseError {
                            position: idx,
                            message: format!(
                                "Missing operator between number '{number}' and '{next}'"
                            ),
                        });
                    }
                }
                out.push((start, Token::Number(number)));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = idx;
                while idx < chars.len() && (chars[idx].is_ascii_alphanumeric() || chars[idx] == '_')
                {
                    idx += 1;
                }
                out.push((start, Token::Ident(chars[start..idx].iter().collect())));
            }
            other => {
                return Err(ParseError {
                    position: idx,
                    message: format!("Unexpected character '{other}'"),
                });
            }
        }
    }
    Ok(out)
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

    fn column(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(col, _)| *col)
            .unwrap_or(self.end)
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            position: self.column(),
            message: message.into(),
        }
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), ParseError> {
        match self.peek() {
            Some(t) if *t == expected => {
                self.pos += 1;
                Ok(())
            }
            Some(t) => Err(self.error(format!(
                "Expected {} but found {}",
                expected.describe(),
                t.describe()
            ))),
            None => Err(self.error(format!(
                "Expected {} but the expression ended",
                expected.describe()
            ))),
        }
    }

    fn parse_sum(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_product()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_product()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_product(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_unary()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.depth >= MAX_NESTING {
            return Err(self.error(format!(
                "Expression is nested deeper than {MAX_NESTING} levels"
            )));
        }
        self.depth += 1;
        let expr = self.parse_signed();
        self.depth -= 1;
        expr
    }

    fn parse_signed(&mut self) -> Result<Expr, ParseError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(Expr::Neg(Box::new(self.parse_unary()?)))
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.parse_unary()
            }
            _ => self.parse_power(),
        }
    }

    fn parse_power(&mut self) -> Result<Expr, ParseError> {
        let base = self.parse_atom()?;
        if self.peek() == Some(&Token::Caret) {
            self.pos += 1;
            let exponent = self.parse_unary()?;
            return Ok(Expr::binary(BinaryOp::Pow, base, exponent));
        }
        Ok(base)
    }

    fn parse_atom(&mut self) -> Result<Expr, ParseError> {
        let column = self.column();
        match self.bump() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Ident(name)) => {
                if self.peek() != Some(&Token::LParen) {
                    return Ok(Expr::Ident(name));
                }
                self.pos += 1;
                let mut args = Vec::new();
                if self.peek() == Some(&Token::RParen) {
                    self.pos += 1;
                    return Ok(Expr::Call { name, args });
                }
                loop {
                    args.push(self.parse_sum()?);
                    match self.peek() {
                        Some(Token::Comma) => self.pos += 1,
                        _ => break,
                    }
                }
                self.expect(Token::RParen)?;
                Ok(Expr::Call { name, args })
            }
            Some(Token::LParen) => {
                let inner = self.parse_sum()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(other) => Err(ParseError {
                position: column,
                message: format!("Unexpected {}", other.describe()),
            }),
            None => Err(ParseError {
                position: column,
                message: "Unexpected end of expression".to_string(),
            }),
        }
    }
}

pub fn parse_expression(text: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(text)?;
    if tokens.is_empty() {
        return Err(ParseError {
            position: 0,
            message: "Empty expression".to_string(),
        });
    }
    if tokens.len() > MAX_TOKENS {
        return Err(ParseError {
            position: tokens[MAX_TOKENS].0,
            message: format!("Expression is longer than {MAX_TOKENS} tokens"),
        });
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: text.chars().count(),
        depth: 0,
    };
    let expr = parser.parse_sum()?;
    if let Some(token) = parser.peek() {
        return Err(parser.error(format!("Unexpected {}", token.describe())));
    }
    Ok(expr)
}
