//! Whole-word binding substitution
//!
//! Property names are matched case-insensitively and only as whole words, so a
//! binding for `lengte` never touches `lengte2` or `totaallengte`.

use crate::formula::FormulaError;
use regex::{Regex, RegexBuilder};
use std::collections::HashMap;
use std::ops::Range;

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// A property name compiled once for repeated whole-word matching
#[derive(Debug, Clone)]
pub struct NamePattern {
    name: String,
    regex: Option<Regex>,
}

impl NamePattern {
    pub fn new(name: &str) -> Self {
        let name = name.trim();
        let regex = if name.is_empty() {
            None
        } else {
            RegexBuilder::new(&regex::escape(name))
                .case_insensitive(true)
                .build()
                .ok()
        };
        Self {
            name: name.to_string(),
            regex,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Byte ranges of every whole-word occurrence in `haystack`
    pub fn find_in(&self, haystack: &str) -> Vec<Range<usize>> {
        let Some(pattern) = &self.regex else {
            return Vec::new();
        };

        let mut ranges = Vec::new();
        let mut start = 0;
        while let Some(m) = pattern.find_at(haystack, start) {
            let clear_before = haystack[..m.start()]
                .chars()
                .next_back()
                .map_or(true, |c| !is_word_char(c));
            let clear_after = haystack[m.end()..]
                .chars()
                .next()
                .map_or(true, |c| !is_word_char(c));

            if clear_before && clear_after {
                ranges.push(m.range());
                start = m.end();
            } else {
                // Retry one character later; a valid match may overlap this one
                start = m.start()
                    + haystack[m.start()..]
                        .chars()
                        .next()
                        .map_or(1, char::len_utf8);
            }
            if start >= haystack.len() {
                break;
            }
        }
        ranges
    }
}

/// Byte ranges of every whole-word, case-insensitive occurrence of `name`
pub fn find_whole_word(haystack: &str, name: &str) -> Vec<Range<usize>> {
    NamePattern::new(name).find_in(haystack)
}

pub fn references(expression: &str, name: &str) -> bool {
    !find_whole_word(expression, name).is_empty()
}

/// Longest name first, ties broken alphabetically
fn substitution_order(a: &NamePattern, b: &NamePattern) -> std::cmp::Ordering {
    b.name.len().cmp(&a.name.len()).then_with(|| a.name.cmp(&b.name))
}

/// Indices of the patterns that substitution would replace in `expression`
///
/// Follows the same longest-first order as [`substitute_patterns`], so a
/// shorter name inside a multi-word name is not counted as a reference.
pub fn referenced_patterns(expression: &str, patterns: &[NamePattern]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..patterns.len()).collect();
    order.sort_by(|&a, &b| substitution_order(&patterns[a], &patterns[b]));

    let mut masked = expression.to_string();
    let mut found = Vec::new();
    for idx in order {
        let ranges = patterns[idx].find_in(&masked);
        if ranges.is_empty() {
            continue;
        }
        found.push(idx);
        for range in ranges.into_iter().rev() {
            let filler = "#".repeat(range.len());
            masked.replace_range(range, &filler);
        }
    }
    found.sort_unstable();
    found
}

/// Render a bound value so the parser reads it back unchanged
fn render_number(value: f64) -> String {
    if value < 0.0 {
        format!("({})", value)
    } else {
        value.to_string()
    }
}

/// Replace every bound name in `expression` with its numeric value
///
/// Longer names are substituted first so a multi-word name is never split by a
/// shorter one it contains.
pub fn substitute(expression: &str, bindings: &HashMap<String, f64>) -> Result<String, FormulaError> {
    let patterns: Vec<(NamePattern, f64)> = bindings
        .iter()
        .map(|(name, value)| (NamePattern::new(name), *value))
        .collect();
    substitute_patterns(expression, patterns.iter().map(|(p, v)| (p, *v)))
}

/// [`substitute`] over names that are already compiled
///
/// Only referenced bindings must be finite; an unused `NaN` is ignored.
pub fn substitute_patterns<'p>(
    expression: &str,
    bindings: impl IntoIterator<Item = (&'p NamePattern, f64)>,
) -> Result<String, FormulaError> {
    let mut bindings: Vec<(&NamePattern, f64)> = bindings.into_iter().collect();
    bindings.sort_by(|a, b| substitution_order(a.0, b.0));

    let mut output = expression.to_string();
    for (pattern, value) in bindings {
        let ranges = pattern.find_in(&output);
        if ranges.is_empty() {
            continue;
        }
        if !value.is_finite() {
            return Err(FormulaError::computation(format!(
                "binding '{}' is not a finite number",
                pattern.name()
            )));
        }

        let rendered = render_number(value);
        for range in ranges.into_iter().rev() {
            output.replace_range(range, &rendered);
        }
    }
    Ok(output)
}
