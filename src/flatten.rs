//! Bounded-depth flattening of nested GDC records into dotted-key fields.
//!
//! Objects extend the key path, arrays keep it, so repeated groups (several
//! diagnoses, several treatments) accumulate as multi-valued fields under
//! one key. Depth is counted in layers: the fields of the record itself sit
//! on layer 1, and nothing deeper than `max_depth` layers is kept.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::domain::EXCLUDED_SAMPLE_TYPES;

pub const TREATMENT_MARKER: &str = "treatments";
pub const SAMPLE_TYPE_KEY: &str = "sample_type";
pub const SUBMITTER_ID_KEY: &str = "submitter_id";
pub const DEFAULT_MAX_DEPTH: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Scalar {
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Scalar::Null),
            Value::Bool(flag) => Some(Scalar::Bool(*flag)),
            Value::Number(number) => Some(match number.as_i64() {
                Some(int) => Scalar::Int(int),
                None => Scalar::Float(number.as_f64().unwrap_or(f64::NAN)),
            }),
            Value::String(text) => Some(Scalar::Str(text.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn placeholder() -> Self {
        Scalar::Str(String::new())
    }

    pub fn is_null_like(&self) -> bool {
        match self {
            Scalar::Null => true,
            Scalar::Float(value) => value.is_nan(),
            Scalar::Str(text) => is_null_text(text),
            Scalar::Bool(_) | Scalar::Int(_) => false,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(value) => Some(*value as f64),
            Scalar::Float(value) => Some(*value),
            Scalar::Str(text) => text.trim().parse::<f64>().ok(),
            Scalar::Null | Scalar::Bool(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Str(text) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => write!(f, "None"),
            Scalar::Bool(true) => write!(f, "True"),
            Scalar::Bool(false) => write!(f, "False"),
            Scalar::Int(value) => write!(f, "{value}"),
            Scalar::Float(value) if value.is_finite() && value.fract() == 0.0 => {
                write!(f, "{value:.1}")
            }
            Scalar::Float(value) => write!(f, "{value}"),
            Scalar::Str(text) => write!(f, "{text}"),
        }
    }
}

/// Null encodings used by the warehouse export and the padding placeholder.
pub fn is_null_text(text: &str) -> bool {
    matches!(
        text.trim(),
        "" | "NaN" | "nan" | "None" | "''" | "' '" | "\"\""
    )
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlatRecord {
    fields: Vec<(String, Vec<Scalar>)>,
}

impl FlatRecord {
    pub fn push(&mut self, key: &str, value: Scalar) {
        match self.fields.iter_mut().find(|(name, _)| name == key) {
            Some((_, values)) => values.push(value),
            None => self.fields.push((key.to_string(), vec![value])),
        }
    }

    pub fn get(&self, key: &str) -> Option<&[Scalar]> {
        self.fields
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, values)| values.as_slice())
    }

    pub fn first(&self, key: &str) -> Option<&Scalar> {
        self.get(key).and_then(|values| values.first())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Scalar])> {
        self.fields
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Length of the longest list among keys containing `marker`.
    pub fn longest(&self, marker: &str) -> Option<usize> {
        self.fields
            .iter()
            .filter(|(name, _)| name.contains(marker))
            .map(|(_, values)| values.len())
            .max()
    }

    /// Pads every key containing `marker` with placeholders up to `len`.
    /// Longer lists are left untouched.
    pub fn pad_to(&mut self, marker: &str, len: usize) {
        for (name, values) in self.fields.iter_mut() {
            if name.contains(marker) && values.len() < len {
                values.resize(len, Scalar::placeholder());
            }
        }
    }
}

/// Treatment fields are exported as parallel lists of equal length; shorter
/// lists are padded to the longest treatment list of the record.
pub fn pad_treatments(record: &mut FlatRecord) {
    if let Some(len) = record.longest(TREATMENT_MARKER) {
        record.pad_to(TREATMENT_MARKER, len);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlattenDiagnostic {
    pub path: String,
    pub depth: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Flattened {
    pub record: FlatRecord,
    pub diagnostics: Vec<FlattenDiagnostic>,
    pub unmatched_samples: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Flattener {
    max_depth: usize,
    excluded_sample_types: Vec<String>,
    known_samples: Option<HashSet<String>>,
}

impl Default for Flattener {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            excluded_sample_types: EXCLUDED_SAMPLE_TYPES
                .iter()
                .map(|value| value.to_string())
                .collect(),
            known_samples: None,
        }
    }
}

impl Flattener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_excluded_sample_types(mut self, types: Vec<String>) -> Self {
        self.excluded_sample_types = types;
        self
    }

    /// Sample sub-records whose submitter id is outside `samples` are
    /// skipped and reported as unmatched.
    pub fn with_known_samples<I, S>(mut self, samples: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_samples = Some(samples.into_iter().map(Into::into).collect());
        self
    }

    pub fn flatten(&self, record: &Value) -> Flattened {
        let mut out = Flattened::default();
        match record {
            Value::Object(map) => {
                for (key, value) in map {
                    self.walk(value, key, 1, &mut out);
                }
            }
            other => self.walk(other, "", 1, &mut out),
        }
        out
    }

    fn walk(&self, value: &Value, path: &str, depth: usize, out: &mut Flattened) {
        match value {
            Value::Array(items) => {
                if items.is_empty() {
                    return;
                }
                if depth >= self.max_depth {
                    self.too_deep(path, depth, out);
                    return;
                }
                for item in items {
                    self.walk(item, path, depth + 1, out);
                }
            }
            Value::Object(map) => {
                if map.is_empty() || self.skip_sample(map, out) {
                    return;
                }
                if depth >= self.max_depth {
                    self.too_deep(path, depth, out);
                    return;
                }
                for (key, item) in map {
                    self.walk(item, &join(path, key), depth + 1, out);
                }
            }
            scalar => {
                if let Some(scalar) = Scalar::from_json(scalar) {
                    out.record.push(path, scalar);
                }
            }
        }
    }

    fn skip_sample(&self, map: &serde_json::Map<String, Value>, out: &mut Flattened) -> bool {
        let Some(sample_type) = map.get(SAMPLE_TYPE_KEY) else {
            return false;
        };
        if let Some(sample_type) = sample_type.as_str() {
            if self
                .excluded_sample_types
                .iter()
                .any(|excluded| excluded == sample_type)
            {
                return true;
            }
        }
        if let Some(known) = &self.known_samples {
            let submitter = map
                .get(SUBMITTER_ID_KEY)
                .and_then(Value::as_str)
                .unwrap_or_default();
            if !known.contains(submitter) {
                out.unmatched_samples.push(submitter.to_string());
                return true;
            }
        }
        false
    }

    fn too_deep(&self, path: &str, depth: usize, out: &mut Flattened) {
        tracing::debug!(path, depth, "dropping value nested beyond flatten depth");
        out.diagnostics.push(FlattenDiagnostic {
            path: path.to_string(),
            depth: depth + 1,
        });
    }
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

/// Reverses the dot-separated components of a field name. Xena clinical
/// headers name fields leaf-first (`submitter_id.samples`), the GDC names
/// them root-first (`samples.submitter_id`).
pub fn flip_field(field: &str) -> String {
    field.split('.').rev().collect::<Vec<_>>().join(".")
}
