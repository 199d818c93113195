//! Cell-level equivalence rules shared by every validation.

use crate::flatten::{Scalar, is_null_text};
use crate::matrix::parse_numeric;

/// Placeholders the warehouse writes for an empty element inside a list cell.
const NULL_TOKENS: [&str; 2] = ["' '", "''"];

/// Keys naming the sample sub-record compare the first value against the
/// whole cell, once.
const SAMPLES_MARKER: &str = "samples";

const DECIMALS: i32 = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldComparison {
    pub matched: usize,
    pub total: usize,
    /// Text of the first remote value that could not be found in the cell.
    pub first_mismatch: Option<String>,
}

impl FieldComparison {
    pub fn is_match(&self) -> bool {
        self.first_mismatch.is_none() && self.matched == self.total
    }
}

/// Compares every value of a flattened field against one matrix cell.
///
/// Multi-valued fields are exported as a list literal, so each remote value
/// is looked up in what remains of the cell and consumed on success. Any
/// other cell holds a single value and must equal each remote value exactly.
/// Comparison stops at the first value that cannot be found.
pub fn compare_field(column: &str, values: &[Scalar], cell: &str) -> FieldComparison {
    let mut outcome = FieldComparison::default();

    if column.contains(SAMPLES_MARKER) {
        outcome.total = 1;
        match values.first() {
            Some(value) if scalar_matches_cell(value, cell) => outcome.matched = 1,
            Some(value) => outcome.first_mismatch = Some(value.to_string()),
            None => outcome.first_mismatch = Some(String::new()),
        }
        return outcome;
    }

    if is_null_text(cell) {
        for value in values {
            outcome.total += 1;
            if !value.is_null_like() {
                outcome.first_mismatch = Some(value.to_string());
                break;
            }
            outcome.matched += 1;
        }
        return outcome;
    }

    let is_list = cell.trim_start().starts_with('[');
    let mut remaining = cell.to_string();
    for value in values {
        outcome.total += 1;
        let found = if is_list {
            consume(&mut remaining, value)
        } else {
            scalar_matches_cell(value, cell)
        };
        if found {
            outcome.matched += 1;
        } else {
            outcome.first_mismatch = Some(value.to_string());
            break;
        }
    }
    outcome
}

fn consume(remaining: &mut String, value: &Scalar) -> bool {
    if value.is_null_like() {
        if let Some(token) = NULL_TOKENS.iter().find(|token| remaining.contains(**token)) {
            *remaining = remaining.replacen(token, "", 1);
            return true;
        }
        return is_null_text(remaining);
    }

    let text = value.to_string();
    if !text.is_empty() && remaining.contains(&text) {
        *remaining = remaining.replacen(&text, "", 1);
        return true;
    }
    if numbers_equal(value, remaining) {
        remaining.clear();
        return true;
    }
    false
}

/// Single remote value against a whole matrix cell: nulls are equivalent,
/// text must match exactly, numbers compare by value.
pub fn scalar_matches_cell(value: &Scalar, cell: &str) -> bool {
    if value.is_null_like() || is_null_text(cell) {
        return value.is_null_like() && is_null_text(cell);
    }
    if value.to_string() == cell.trim() {
        return true;
    }
    numbers_equal(value, cell)
}

fn numbers_equal(value: &Scalar, cell: &str) -> bool {
    match (value.as_f64(), cell.trim().parse::<f64>()) {
        (Some(left), Ok(right)) => left == right,
        _ => false,
    }
}

/// Two matrix-style cells: equal text, equal numbers, or both null.
pub fn cells_equal(left: &str, right: &str) -> bool {
    let (left, right) = (left.trim(), right.trim());
    if left == right {
        return true;
    }
    if is_null_text(left) || is_null_text(right) {
        return is_null_text(left) && is_null_text(right);
    }
    match (left.parse::<f64>(), right.parse::<f64>()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

pub fn round10(value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let factor = 10f64.powi(DECIMALS);
    let rounded = (value * factor).round() / factor;
    if rounded.is_finite() { rounded } else { value }
}

/// Rounded equality where NaN equals NaN.
pub fn floats_match(left: f64, right: f64) -> bool {
    if left.is_nan() || right.is_nan() {
        return left.is_nan() && right.is_nan();
    }
    round10(left) == round10(right)
}

/// `log2(x + 1)` rounded to ten decimals, the warehouse's expression transform.
pub fn log2_plus_one(value: f64) -> f64 {
    round10((value + 1.0).log2())
}

/// Matrix cell read as a rounded float.
pub fn matrix_value(cell: &str) -> f64 {
    round10(parse_numeric(cell))
}
