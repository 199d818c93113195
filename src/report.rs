use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationKind {
    Clinical,
    Survival,
    SurvivalEndpoint,
    Expression,
    CopyNumber,
}

impl fmt::Display for ValidationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValidationKind::Clinical => "clinical",
            ValidationKind::Survival => "survival",
            ValidationKind::SurvivalEndpoint => "survival-endpoint",
            ValidationKind::Expression => "expression",
            ValidationKind::CopyNumber => "copy-number",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mismatch {
    pub id: String,
    pub column: String,
    pub remote: String,
    pub matrix: String,
}

/// Outcome of one validation run. `successes` and `total` count compared
/// units (cases, samples); the cell counters count individual comparisons.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub validation: ValidationKind,
    pub generated_at: DateTime<Utc>,
    pub successes: usize,
    pub total: usize,
    pub expected: usize,
    pub cells_matched: usize,
    pub cells_compared: usize,
    pub failed: Vec<String>,
    /// Identifiers present on the GDC side but absent from the matrix.
    pub missing_from_matrix: Vec<String>,
    /// Identifiers present in the matrix that were never compared.
    pub not_compared: Vec<String>,
    pub mismatches: Vec<Mismatch>,
    pub diagnostics: Vec<String>,
}

impl ComparisonReport {
    pub fn new(validation: ValidationKind) -> Self {
        Self {
            validation,
            generated_at: Utc::now(),
            successes: 0,
            total: 0,
            expected: 0,
            cells_matched: 0,
            cells_compared: 0,
            failed: Vec::new(),
            missing_from_matrix: Vec::new(),
            not_compared: Vec::new(),
            mismatches: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn record_success(&mut self) {
        self.successes += 1;
        self.total += 1;
    }

    pub fn record_failure(&mut self, id: impl Into<String>) {
        self.failed.push(id.into());
        self.total += 1;
    }

    pub fn record_cells(&mut self, matched: usize, compared: usize) {
        self.cells_matched += matched;
        self.cells_compared += compared;
    }

    /// Keeps only the first mismatch per identifier and column.
    pub fn push_mismatch(&mut self, mismatch: Mismatch) {
        let seen = self
            .mismatches
            .iter()
            .any(|existing| existing.id == mismatch.id && existing.column == mismatch.column);
        if !seen {
            self.mismatches.push(mismatch);
        }
    }

    pub fn push_missing(&mut self, id: impl Into<String>) {
        let id = id.into();
        if !self.missing_from_matrix.contains(&id) {
            self.missing_from_matrix.push(id);
        }
    }

    pub fn diagnostic(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{message}");
        self.diagnostics.push(message);
    }

    /// A run with nothing compared never passes.
    pub fn passed(&self) -> bool {
        self.total > 0
            && self.failed.is_empty()
            && self.missing_from_matrix.is_empty()
            && self.not_compared.is_empty()
            && self.successes == self.total
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairCorrelation {
    pub left: String,
    pub right: String,
    pub pearson: Option<f64>,
    pub spearman: Option<f64>,
    /// True when the pair was correlated on the first row rather than the
    /// first sample column.
    pub by_row: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CorrelationReport {
    pub generated_at: DateTime<Utc>,
    pub sample: Option<String>,
    pub pairs: Vec<PairCorrelation>,
}
