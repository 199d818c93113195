use std::collections::HashSet;

use serde_json::Value;

use crate::compare::compare_field;
use crate::config::ResolvedConfig;
use crate::error::ValidatorError;
use crate::flatten::{FlatRecord, Flattener, SUBMITTER_ID_KEY, flip_field, pad_treatments};
use crate::gdc::{Endpoint, GdcClient, SearchQuery};
use crate::matrix::Matrix;
use crate::report::{ComparisonReport, Mismatch, ValidationKind};

/// GDC field holding the sample submitter id; also the search filter.
pub const SAMPLE_FIELD: &str = "samples.submitter_id";

/// Fields to request from `/cases`: every matrix header turned back into
/// GDC order, plus the sample submitter id.
pub fn request_fields(matrix: &Matrix) -> Vec<String> {
    let mut fields = matrix
        .headers()
        .iter()
        .map(|header| flip_field(header))
        .collect::<Vec<_>>();
    if !fields.iter().any(|field| field == SAMPLE_FIELD) {
        fields.push(SAMPLE_FIELD.to_string());
    }
    fields
}

pub struct ClinicalValidator<'a, C: GdcClient> {
    client: &'a C,
    config: &'a ResolvedConfig,
}

#[derive(Default)]
struct Pass {
    compared_samples: Vec<String>,
    unmatched_samples: Vec<String>,
}

impl<'a, C: GdcClient> ClinicalValidator<'a, C> {
    pub fn new(client: &'a C, config: &'a ResolvedConfig) -> Self {
        Self { client, config }
    }

    /// Re-fetches the clinical records of every matrix sample and compares
    /// them field by field. Samples left uncompared after the first pass
    /// (cases holding several matrix samples) are queried once more.
    pub fn validate(&self, matrix: &Matrix) -> Result<ComparisonReport, ValidatorError> {
        let sample_column = matrix.require_column(&flip_field(SAMPLE_FIELD))?;
        let samples = matrix
            .column_values(sample_column)
            .map(str::to_string)
            .collect::<Vec<_>>();
        let fields = request_fields(matrix);

        let mut report = ComparisonReport::new(ValidationKind::Clinical);
        report.expected = samples.len();

        let first = self.run_pass(matrix, &fields, &samples, &mut report)?;
        let mut missing = uncompared(&samples, &first.compared_samples);
        let mut unmatched = first.unmatched_samples;

        if !missing.is_empty() {
            tracing::info!(samples = missing.len(), "second pass for uncompared samples");
            let second = self.run_pass(matrix, &fields, &missing, &mut report)?;
            missing = uncompared(&missing, &second.compared_samples);
            unmatched.extend(second.unmatched_samples);
        }

        let matrix_samples = samples.iter().map(String::as_str).collect::<HashSet<_>>();
        for sample in unmatched {
            if !matrix_samples.contains(sample.as_str()) {
                report.push_missing(sample);
            }
        }
        report.not_compared = missing;
        Ok(report)
    }

    fn run_pass(
        &self,
        matrix: &Matrix,
        fields: &[String],
        samples: &[String],
        report: &mut ComparisonReport,
    ) -> Result<Pass, ValidatorError> {
        let query = SearchQuery::new(SAMPLE_FIELD, samples.to_vec())
            .fields(fields.iter().cloned())
            .size(self.config.page_sizes.cases);
        let hits = self.client.search(Endpoint::Cases, &query)?;
        tracing::info!(cases = hits.len(), "comparing clinical records");

        let flattener = Flattener::new()
            .with_max_depth(self.config.max_flatten_depth)
            .with_excluded_sample_types(self.config.excluded_sample_types.clone())
            .with_known_samples(samples.iter().cloned());

        let mut pass = Pass::default();
        for hit in &hits {
            let flattened = flattener.flatten(hit);
            for diagnostic in &flattened.diagnostics {
                report.diagnostic(format!(
                    "{} nested beyond depth {}, value dropped",
                    diagnostic.path, diagnostic.depth
                ));
            }
            pass.unmatched_samples.extend(flattened.unmatched_samples);

            let mut record = flattened.record;
            pad_treatments(&mut record);
            let sample = record.first(SAMPLE_FIELD).map(ToString::to_string);
            self.compare_case(matrix, hit, &record, sample.as_deref(), report);
            pass.compared_samples.extend(sample);
        }
        Ok(pass)
    }

    fn compare_case(
        &self,
        matrix: &Matrix,
        hit: &Value,
        record: &FlatRecord,
        sample: Option<&str>,
        report: &mut ComparisonReport,
    ) {
        let case_id = match record.first(SUBMITTER_ID_KEY) {
            Some(id) => id.to_string(),
            None => {
                let id = hit
                    .get("id")
                    .and_then(Value::as_str)
                    .unwrap_or("<unknown>")
                    .to_string();
                report.diagnostic(format!("case {id} has no submitter_id"));
                report.record_failure(id);
                return;
            }
        };
        // The sample's own row when the case spans several matrix rows.
        let row = sample
            .and_then(|sample| {
                let column = matrix.column_index(&flip_field(SAMPLE_FIELD))?;
                matrix.find_row(column, sample)
            })
            .or_else(|| matrix.find_row_any(&case_id));
        let Some(row) = row else {
            report.diagnostic(format!("case {case_id} not found in matrix"));
            report.record_failure(case_id);
            return;
        };

        let mut passed = true;
        for (key, values) in record.iter() {
            let column = flip_field(key);
            // The GDC adds fields nobody asked for (the hit `id`).
            let Some(index) = matrix.column_index(&column) else {
                tracing::debug!(column = %column, case = %case_id, "no matrix column, skipped");
                continue;
            };
            let cell = matrix.cell(row, index).unwrap_or_default();
            let outcome = compare_field(&column, values, cell);
            report.record_cells(outcome.matched, outcome.total);
            if let Some(remote) = outcome.first_mismatch {
                passed = false;
                report.push_mismatch(Mismatch {
                    id: case_id.clone(),
                    column,
                    remote,
                    matrix: cell.to_string(),
                });
            }
        }

        if passed {
            report.record_success();
        } else {
            tracing::debug!(case = %case_id, "clinical comparison failed");
            report.record_failure(case_id);
        }
    }
}

fn uncompared(samples: &[String], compared: &[String]) -> Vec<String> {
    let compared = compared.iter().map(String::as_str).collect::<HashSet<_>>();
    samples
        .iter()
        .filter(|sample| !compared.contains(sample.as_str()))
        .cloned()
        .collect()
}
