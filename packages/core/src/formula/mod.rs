//! Formula Evaluation
//!
//! Property values may be arithmetic formulas over sibling property names
//! (`lengte * breedte`). Evaluation never hands text to a general-purpose
//! interpreter: names are substituted by value, the result is checked to
//! contain arithmetic characters only, and a dedicated parser evaluates it.
//!
//! # Modules
//!
//! - [`expression`] - tokenizer, recursive-descent parser and evaluator
//! - [`substitution`] - whole-word, case-insensitive binding substitution
//! - [`resolver`] - chained resolution of formula-valued siblings with a cycle guard
//!
//! # Examples
//!
//! ```rust
//! use objectspace_core::formula::evaluate;
//! use std::collections::HashMap;
//!
//! let bindings = HashMap::from([("lengte".to_string(), 3.0), ("breedte".to_string(), 4.0)]);
//! assert_eq!(evaluate("lengte * breedte", &bindings).unwrap(), 12.0);
//! ```

pub mod expression;
pub mod resolver;
pub mod substitution;

pub use expression::{Expr, SyntaxError};
pub use resolver::{PropertyScope, Resolution};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Formula evaluation errors
///
/// Surfaced per property; none of them is fatal to the surrounding tree.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FormulaError {
    /// An identifier had no binding
    #[error("Unknown variable: {name}")]
    UnknownVariable { name: String },

    /// Malformed expression or non-finite result
    #[error("Computation error: {reason}")]
    ComputationError { reason: String },

    /// A property's value depends on itself
    #[error("Cyclic reference through: {name}")]
    CyclicReference { name: String },
}

impl FormulaError {
    pub fn unknown_variable(name: impl Into<String>) -> Self {
        Self::UnknownVariable { name: name.into() }
    }

    pub fn computation(reason: impl Into<String>) -> Self {
        Self::ComputationError {
            reason: reason.into(),
        }
    }

    pub fn cyclic(name: impl Into<String>) -> Self {
        Self::CyclicReference { name: name.into() }
    }
}

const OPERATOR_CHARS: [char; 6] = ['+', '-', '*', '/', '(', ')'];

fn is_arithmetic_char(c: char) -> bool {
    c.is_ascii_digit() || c == '.' || c.is_whitespace() || OPERATOR_CHARS.contains(&c)
}

/// How a raw property value should be treated
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueKind<'a> {
    Empty,
    Literal(f64),
    Formula(&'a str),
    Text,
}

/// Parse a literal number, accepting a single decimal comma ("3,5")
pub fn parse_literal(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let parsed = raw.parse::<f64>().ok().or_else(|| {
        if !raw.contains('.') && raw.matches(',').count() == 1 {
            raw.replace(',', ".").parse::<f64>().ok()
        } else {
            None
        }
    })?;
    parsed.is_finite().then_some(parsed)
}

/// Classify a raw value: literal number, formula (contains an operator), or text
pub fn classify(raw: &str) -> ValueKind<'_> {
    let raw = raw.trim();
    if raw.is_empty() {
        return ValueKind::Empty;
    }
    if let Some(value) = parse_literal(raw) {
        return ValueKind::Literal(value);
    }
    if raw.contains(&OPERATOR_CHARS[..]) {
        return ValueKind::Formula(raw);
    }
    ValueKind::Text
}

/// Evaluate `expression` with the given name → value bindings
///
/// # Errors
///
/// - `UnknownVariable` when anything other than digits, `+ - * /`,
///   parentheses, decimal points and whitespace survives substitution
/// - `ComputationError` for malformed expressions and non-finite results
pub fn evaluate(expression: &str, bindings: &HashMap<String, f64>) -> Result<f64, FormulaError> {
    let substituted = substitution::substitute(expression, bindings)?;
    evaluate_substituted(&substituted)
}

/// Arithmetic-only check followed by parse and evaluation
pub(crate) fn evaluate_substituted(substituted: &str) -> Result<f64, FormulaError> {
    if let Some(pos) = substituted.find(|c: char| !is_arithmetic_char(c)) {
        let rest = &substituted[pos..];
        let name: String = rest
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_')
            .collect();
        let name = if name.is_empty() {
            rest.chars().next().map(String::from).unwrap_or_default()
        } else {
            name
        };
        return Err(FormulaError::unknown_variable(name));
    }

    let expr = Expr::parse(substituted).map_err(|e| FormulaError::computation(e.to_string()))?;
    expr.eval()
}

/// Check that a template expression is syntactically valid
///
/// Identifiers are allowed; returns the referenced names on success. Adjacent
/// words are read as one multi-word name.
pub fn validate_expression(expression: &str) -> Result<Vec<String>, FormulaError> {
    let expr = Expr::parse(expression).map_err(|e| FormulaError::computation(e.to_string()))?;
    Ok(expr.variables().into_iter().map(str::to_string).collect())
}
