use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ValidatorError;

/// Sample types the warehouse never exports; flattened records skip them.
pub const EXCLUDED_SAMPLE_TYPES: &[&str] = &["FFPE Scrolls", "Blood Derived Normal"];

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectId(String);

impl ProjectId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProjectId {
    type Err = ValidatorError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_string();
        let is_valid = normalized
            .split_once('-')
            .map(|(program, rest)| {
                !program.is_empty()
                    && !rest.is_empty()
                    && normalized
                        .chars()
                        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
            })
            .unwrap_or(false);
        if !is_valid {
            return Err(ValidatorError::InvalidProjectId(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

fn uuid_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
            .expect("static uuid regex")
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId(String);

impl FileId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for FileId {
    type Err = ValidatorError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        if !uuid_regex().is_match(&normalized) {
            return Err(ValidatorError::InvalidFileId(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

/// Quantification column of a STAR augmented gene counts file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum ExpressionDataType {
    Fpkm,
    FpkmUq,
    Tpm,
    StarCounts,
}

impl ExpressionDataType {
    pub fn column(&self) -> &'static str {
        match self {
            ExpressionDataType::Fpkm => "fpkm_unstranded",
            ExpressionDataType::FpkmUq => "fpkm_uq_unstranded",
            ExpressionDataType::Tpm => "tpm_unstranded",
            ExpressionDataType::StarCounts => "unstranded",
        }
    }
}

impl fmt::Display for ExpressionDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpressionDataType::Fpkm => write!(f, "fpkm"),
            ExpressionDataType::FpkmUq => write!(f, "fpkm_uq"),
            ExpressionDataType::Tpm => write!(f, "tpm"),
            ExpressionDataType::StarCounts => write!(f, "star_counts"),
        }
    }
}

impl FromStr for ExpressionDataType {
    type Err = ValidatorError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "fpkm" => Ok(ExpressionDataType::Fpkm),
            "fpkm_uq" => Ok(ExpressionDataType::FpkmUq),
            "tpm" => Ok(ExpressionDataType::Tpm),
            "star_counts" => Ok(ExpressionDataType::StarCounts),
            other => Err(ValidatorError::InvalidDataType(other.to_string())),
        }
    }
}

/// Where survival data is sourced from on the GDC side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SurvivalSource {
    Cases,
    AnalysisEndpoint,
}
