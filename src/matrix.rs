use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use csv::ReaderBuilder;

use crate::error::ValidatorError;

/// Ordered identifiers from the header line of a matrix: every column after
/// the row-label column, whitespace-trimmed.
pub fn read_header_ids(path: &Path) -> Result<Vec<String>, ValidatorError> {
    let file = File::open(path).map_err(|_| ValidatorError::MatrixRead(path.to_path_buf()))?;
    let mut line = String::new();
    BufReader::new(file)
        .read_line(&mut line)
        .map_err(|_| ValidatorError::MatrixRead(path.to_path_buf()))?;
    header_ids_from_line(&line)
}

pub fn header_ids_from_line(line: &str) -> Result<Vec<String>, ValidatorError> {
    let line = line.trim_end_matches(['\n', '\r']);
    if line.trim().is_empty() {
        return Err(ValidatorError::Matrix("empty header line".to_string()));
    }
    Ok(line
        .split('\t')
        .skip(1)
        .map(|value| value.trim().to_string())
        .collect())
}

/// A tab-separated matrix loaded verbatim. Column 0 is the row index.
#[derive(Debug, Clone)]
pub struct Matrix {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Matrix {
    pub fn load(path: &Path) -> Result<Self, ValidatorError> {
        let file = File::open(path).map_err(|_| ValidatorError::MatrixRead(path.to_path_buf()))?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ValidatorError> {
        let mut rdr = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .quoting(false)
            .flexible(false)
            .from_reader(reader);

        let headers = rdr
            .headers()
            .map_err(|err| ValidatorError::Matrix(err.to_string()))?
            .iter()
            .map(|value| value.trim().to_string())
            .collect::<Vec<_>>();
        if headers.is_empty() || headers.iter().all(|value| value.is_empty()) {
            return Err(ValidatorError::Matrix("missing header row".to_string()));
        }

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record.map_err(|err| ValidatorError::Matrix(err.to_string()))?;
            rows.push(record.iter().map(|value| value.to_string()).collect());
        }

        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Identifiers of the data columns, i.e. every header but the row label.
    pub fn column_ids(&self) -> &[String] {
        &self.headers[1..]
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    pub fn require_column(&self, name: &str) -> Result<usize, ValidatorError> {
        self.column_index(name)
            .ok_or_else(|| ValidatorError::MissingColumn(name.to_string()))
    }

    pub fn row_label(&self, row: usize) -> Option<&str> {
        self.cell(row, 0)
    }

    pub fn row_labels(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|row| row[0].as_str())
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|values| values.get(column))
            .map(String::as_str)
    }

    pub fn cell_by_name(&self, row: usize, column: &str) -> Option<&str> {
        self.column_index(column)
            .and_then(|index| self.cell(row, index))
    }

    /// Cell parsed as a float; blank and `NaN` cells read as `NaN`.
    pub fn numeric(&self, row: usize, column: usize) -> Option<f64> {
        self.cell(row, column).map(parse_numeric)
    }

    pub fn column_values(&self, column: usize) -> impl Iterator<Item = &str> {
        self.rows
            .iter()
            .map(move |row| row.get(column).map(String::as_str).unwrap_or(""))
    }

    /// Distinct values of a column, in the order they first appear.
    pub fn distinct_values(&self, column: usize) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for value in self.column_values(column) {
            if seen.insert(value) {
                out.push(value.to_string());
            }
        }
        out
    }

    pub fn find_row(&self, column: usize, value: &str) -> Option<usize> {
        self.rows
            .iter()
            .position(|row| row.get(column).map(|cell| cell == value).unwrap_or(false))
    }

    /// First row holding `value` in any column, scanning row-major.
    pub fn find_row_any(&self, value: &str) -> Option<usize> {
        self.rows
            .iter()
            .position(|row| row.iter().any(|cell| cell == value))
    }
}

pub fn parse_numeric(value: &str) -> f64 {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}
