//! Arithmetic expression parsing
//!
//! Tokenize → recursive-descent parse → evaluate. The grammar is limited to
//! numeric literals, identifiers, `+ - * /`, unary sign and parentheses:
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := factor (('*' | '/') factor)*
//! factor := ('+' | '-') factor | NUMBER | IDENT+ | '(' expr ')'
//! ```
//!
//! Identifiers are accepted by the parser so formula templates can be
//! validated before any property values exist. Evaluation only succeeds once
//! every identifier has been substituted away.

use crate::formula::FormulaError;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Variable(String),
    Negate(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

/// Parse failure with the byte offset where it was detected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub offset: usize,
    pub message: String,
}

impl SyntaxError {
    fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at offset {}", self.message, self.offset)
    }
}

impl std::error::Error for SyntaxError {}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

pub fn tokenize(source: &str) -> Result<Vec<(usize, Token)>, SyntaxError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(offset, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '+' | '-' | '*' | '/' | '(' | ')' => {
                chars.next();
                let token = match c {
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '*' => Token::Star,
                    '/' => Token::Slash,
                    '(' => Token::LParen,
                    _ => Token::RParen,
                };
                tokens.push((offset, token));
            }
            c if c.is_ascii_digit() || c == '.' => {
                let mut end = offset;
                let mut seen_dot = false;
                while let Some(&(i, d)) = chars.peek() {
                    if d.is_ascii_digit() {
                        end = i + d.len_utf8();
                    } else if d == '.' && !seen_dot {
                        seen_dot = true;
                        end = i + 1;
                    } else {
                        break;
                    }
                    chars.next();
                }
                let literal = &source[offset..end];
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| SyntaxError::new(offset, format!("invalid number '{}'", literal)))?;
                tokens.push((offset, Token::Number(value)));
            }
            c if is_ident_start(c) => {
                let mut end = offset;
                while let Some(&(i, d)) = chars.peek() {
                    if !is_ident_continue(d) {
                        break;
                    }
                    end = i + d.len_utf8();
                    chars.next();
                }
                tokens.push((offset, Token::Ident(source[offset..end].to_string())));
            }
            other => {
                return Err(SyntaxError::new(
                    offset,
                    format!("unexpected character '{}'", other),
                ))
            }
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end_offset: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(o, _)| *o)
            .unwrap_or(self.end_offset)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        self.pos += 1;
        token
    }

    fn expr(&mut self) -> Result<Expr, SyntaxError> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.term()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn term(&mut self) -> Result<Expr, SyntaxError> {
        let mut lhs = self.factor()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.factor()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn factor(&mut self) -> Result<Expr, SyntaxError> {
        let offset = self.offset();
        match self.advance() {
            Some(Token::Plus) => self.factor(),
            Some(Token::Minus) => Ok(Expr::Negate(Box::new(self.factor()?))),
            Some(Token::Number(value)) => Ok(Expr::Number(value)),
            Some(Token::Ident(first)) => {
                // Adjacent identifiers form one multi-word name ("breedte plank")
                let mut name = first;
                while let Some(Token::Ident(next)) = self.peek() {
                    name.push(' ');
                    name.push_str(next);
                    self.pos += 1;
                }
                Ok(Expr::Variable(name))
            }
            Some(Token::LParen) => {
                let inner = self.expr()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(SyntaxError::new(offset, "unclosed parenthesis")),
                }
            }
            Some(token) => Err(SyntaxError::new(
                offset,
                format!("unexpected token {:?}", token),
            )),
            None => Err(SyntaxError::new(offset, "unexpected end of expression")),
        }
    }
}

impl Expr {
    /// Parse a complete expression; trailing tokens are an error
    pub fn parse(source: &str) -> Result<Expr, SyntaxError> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err(SyntaxError::new(0, "empty expression"));
        }

        let mut parser = Parser {
            tokens,
            pos: 0,
            end_offset: source.len(),
        };
        let expr = parser.expr()?;
        if parser.pos < parser.tokens.len() {
            return Err(SyntaxError::new(parser.offset(), "unexpected trailing input"));
        }
        Ok(expr)
    }

    /// Identifiers referenced by this expression, in first-seen order
    pub fn variables(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Number(_) => {}
            Expr::Variable(name) => {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
            Expr::Negate(inner) => inner.collect_variables(out),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_variables(out);
                rhs.collect_variables(out);
            }
        }
    }

    /// Evaluate a fully substituted expression
    ///
    /// Any remaining identifier yields `FormulaError::UnknownVariable`; a
    /// non-finite result (e.g. division by zero) yields `ComputationError`.
    pub fn eval(&self) -> Result<f64, FormulaError> {
        let value = match self {
            Expr::Number(value) => *value,
            Expr::Variable(name) => return Err(FormulaError::unknown_variable(name.clone())),
            Expr::Negate(inner) => -inner.eval()?,
            Expr::Binary { op, lhs, rhs } => {
                let (l, r) = (lhs.eval()?, rhs.eval()?);
                match op {
                    BinaryOp::Add => l + r,
                    BinaryOp::Sub => l - r,
                    BinaryOp::Mul => l * r,
                    BinaryOp::Div => l / r,
                }
            }
        };

        if value.is_finite() {
            Ok(value)
        } else {
            Err(FormulaError::computation(format!(
                "result is not a finite number ({})",
                value
            )))
        }
    }
}
