//! Chained resolution of property values
//!
//! A property's formula may reference siblings that are formulas themselves.
//! When a scope is built, each sibling name is compiled once and the
//! references between siblings form a dependency graph. A property that can
//! reach itself through that graph is cyclic: it resolves to
//! `CyclicReference` and contributes `0`. Properties outside a cycle see a
//! cyclic sibling as `0` and resolve normally. Every other value is computed
//! once per scope and reused by all formulas that reference it.

use crate::formula::substitution::{self, NamePattern};
use crate::formula::{classify, evaluate_substituted, FormulaError, ValueKind};
use crate::models::Property;
use std::collections::HashSet;

/// Outcome of resolving one property
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Value(f64),
    /// The value depends on itself through `name`
    Cyclic { name: String },
    /// Blank or free-text value, not a number
    NotNumeric,
    Failed(FormulaError),
}

impl Resolution {
    /// Amount added to totals; cyclic values degrade to zero
    pub fn contribution(&self) -> Option<f64> {
        match self {
            Resolution::Value(v) => Some(*v),
            Resolution::Cyclic { .. } => Some(0.0),
            Resolution::NotNumeric | Resolution::Failed(_) => None,
        }
    }
}

impl From<Result<Option<f64>, FormulaError>> for Resolution {
    fn from(result: Result<Option<f64>, FormulaError>) -> Self {
        match result {
            Ok(Some(value)) => Resolution::Value(value),
            Ok(None) => Resolution::NotNumeric,
            Err(FormulaError::CyclicReference { name }) => Resolution::Cyclic { name },
            Err(e) => Resolution::Failed(e),
        }
    }
}

type Outcome = Result<Option<f64>, FormulaError>;

/// The property a name resolves to; later duplicates are shadowed
#[derive(Debug, Clone)]
struct Entry<'a> {
    property: &'a Property,
    depends_on: Vec<usize>,
    on_cycle: bool,
}

/// Sibling properties of one object, the namespace formulas resolve in
#[derive(Debug, Clone)]
pub struct PropertyScope<'a> {
    properties: &'a [Property],
    entries: Vec<Entry<'a>>,
    patterns: Vec<NamePattern>,
    outcomes: Vec<Outcome>,
}

impl<'a> PropertyScope<'a> {
    pub fn new(properties: &'a [Property]) -> Self {
        Self::build(properties, None)
    }

    /// Hide one property (by id), e.g. the one a template result is written to
    pub fn excluding(self, property_id: &'a str) -> Self {
        Self::build(self.properties, Some(property_id))
    }

    fn build(properties: &'a [Property], excluded: Option<&'a str>) -> Self {
        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        let mut patterns = Vec::new();

        for property in properties {
            if Some(property.id.as_str()) == excluded {
                continue;
            }
            // Duplicate names: first property wins
            if !seen.insert(property.name.trim().to_lowercase()) {
                continue;
            }
            entries.push(Entry {
                property,
                depends_on: Vec::new(),
                on_cycle: false,
            });
            patterns.push(NamePattern::new(&property.name));
        }

        for entry in &mut entries {
            if let ValueKind::Formula(expression) = classify(entry.property.expression()) {
                entry.depends_on = substitution::referenced_patterns(expression, &patterns);
            }
        }
        let on_cycle: Vec<bool> = (0..entries.len())
            .map(|idx| reaches_itself(&entries, idx))
            .collect();
        for (entry, cyclic) in entries.iter_mut().zip(on_cycle) {
            entry.on_cycle = cyclic;
        }

        let mut scope = Self {
            properties,
            entries,
            patterns,
            outcomes: Vec::new(),
        };

        let mut memo: Vec<Option<Outcome>> = vec![None; scope.entries.len()];
        let outcomes: Vec<Outcome> = (0..scope.entries.len())
            .map(|idx| scope.settle(idx, &mut memo))
            .collect();
        scope.outcomes = outcomes;
        scope
    }

    pub fn lookup(&self, name: &str) -> Option<&'a Property> {
        self.entries
            .iter()
            .map(|entry| entry.property)
            .find(|p| p.name_matches(name))
    }

    pub fn resolve(&self, property: &Property) -> Resolution {
        if let Some(idx) = self.entries.iter().position(|e| e.property.id == property.id) {
            return self.outcomes[idx].clone().into();
        }

        // Shadowed duplicate or hidden property: evaluated against the scope
        match classify(property.expression()) {
            ValueKind::Empty | ValueKind::Text => Resolution::NotNumeric,
            ValueKind::Literal(value) => Resolution::Value(value),
            ValueKind::Formula(expression) => {
                let own_name = NamePattern::new(&property.name);
                if !own_name.find_in(expression).is_empty() {
                    return Resolution::Cyclic {
                        name: own_name.name().to_string(),
                    };
                }
                self.evaluate(expression).map(Some).into()
            }
        }
    }

    /// Resolve by property name
    pub fn resolve_name(&self, name: &str) -> Option<Resolution> {
        self.lookup(name).map(|p| self.resolve(p))
    }

    /// Evaluate an arbitrary expression (e.g. a formula template) in this scope
    pub fn evaluate(&self, expression: &str) -> Result<f64, FormulaError> {
        let depends_on = substitution::referenced_patterns(expression, &self.patterns);
        let mut bindings = Vec::with_capacity(depends_on.len());
        for idx in depends_on {
            let value = if self.entries[idx].on_cycle {
                Some(0.0)
            } else {
                self.outcomes[idx].clone()?
            };
            // Free-text siblings stay unbound and surface as UnknownVariable
            if let Some(value) = value {
                bindings.push((&self.patterns[idx], value));
            }
        }
        let substituted = substitution::substitute_patterns(expression, bindings)?;
        evaluate_substituted(&substituted)
    }

    /// Compute entry `idx` once, resolving its dependencies first
    fn settle(&self, idx: usize, memo: &mut [Option<Outcome>]) -> Outcome {
        if let Some(outcome) = &memo[idx] {
            return outcome.clone();
        }

        let entry = &self.entries[idx];
        let outcome = match classify(entry.property.expression()) {
            ValueKind::Empty | ValueKind::Text => Ok(None),
            ValueKind::Literal(value) => Ok(Some(value)),
            ValueKind::Formula(_) if entry.on_cycle => {
                Err(FormulaError::cyclic(entry.property.name.trim()))
            }
            ValueKind::Formula(expression) => self.evaluate_entry(expression, &entry.depends_on, memo),
        };

        memo[idx] = Some(outcome.clone());
        outcome
    }

    fn evaluate_entry(
        &self,
        expression: &str,
        depends_on: &[usize],
        memo: &mut [Option<Outcome>],
    ) -> Outcome {
        let mut bindings = Vec::with_capacity(depends_on.len());
        for &dep in depends_on {
            // A cyclic sibling reads as 0 for formulas outside its cycle
            let value = if self.entries[dep].on_cycle {
                Some(0.0)
            } else {
                self.settle(dep, memo)?
            };
            if let Some(value) = value {
                bindings.push((&self.patterns[dep], value));
            }
        }
        let substituted = substitution::substitute_patterns(expression, bindings)?;
        evaluate_substituted(&substituted).map(Some)
    }
}

/// Whether entry `start` depends on itself, directly or transitively
fn reaches_itself(entries: &[Entry<'_>], start: usize) -> bool {
    let mut visited = vec![false; entries.len()];
    let mut pending: Vec<usize> = entries[start].depends_on.clone();

    while let Some(idx) = pending.pop() {
        if idx == start {
            return true;
        }
        if std::mem::replace(&mut visited[idx], true) {
            continue;
        }
        pending.extend(entries[idx].depends_on.iter().copied());
    }
    false
}
