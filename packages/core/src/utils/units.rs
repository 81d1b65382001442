//! Unit conversion for property values
//!
//! A fixed table of base-relative multipliers per family. Conversion is a
//! best-effort convenience: unknown units, blank units and cross-family pairs
//! return the value unchanged instead of failing.

/// Dimension a unit measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitFamily {
    Length,
    Mass,
    Volume,
}

/// (symbol, family, multiplier relative to the family's base unit)
const UNIT_TABLE: &[(&str, UnitFamily, f64)] = &[
    ("m", UnitFamily::Length, 1.0),
    ("cm", UnitFamily::Length, 0.01),
    ("mm", UnitFamily::Length, 0.001),
    ("kg", UnitFamily::Mass, 1.0),
    ("g", UnitFamily::Mass, 0.001),
    ("L", UnitFamily::Volume, 1.0),
    ("mL", UnitFamily::Volume, 0.001),
];

fn lookup(unit: &str) -> Option<(&'static str, UnitFamily, f64)> {
    let unit = unit.trim();
    if unit.is_empty() {
        return None;
    }

    // Exact symbol first, then a case-insensitive match ("l", "ml", "KG")
    UNIT_TABLE
        .iter()
        .find(|(symbol, _, _)| *symbol == unit)
        .or_else(|| {
            UNIT_TABLE
                .iter()
                .find(|(symbol, _, _)| symbol.eq_ignore_ascii_case(unit))
        })
        .copied()
}

pub fn family_of(unit: &str) -> Option<UnitFamily> {
    lookup(unit).map(|(_, family, _)| family)
}

/// Base unit of the family `unit` belongs to (`cm` → `m`)
pub fn base_unit(unit: &str) -> Option<&'static str> {
    let (_, family, _) = lookup(unit)?;
    UNIT_TABLE
        .iter()
        .find(|(_, f, factor)| *f == family && *factor == 1.0)
        .map(|(symbol, _, _)| *symbol)
}

/// Convert `value` from `from_unit` to `to_unit`
///
/// Returns `value` unchanged when either unit is blank or unknown, or when the
/// units belong to different families.
pub fn convert(value: f64, from_unit: &str, to_unit: &str) -> f64 {
    match (lookup(from_unit), lookup(to_unit)) {
        (Some((_, from_family, from_factor)), Some((_, to_family, to_factor)))
            if from_family == to_family =>
        {
            value * from_factor / to_factor
        }
        _ => value,
    }
}
