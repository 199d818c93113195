use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::config::ResolvedConfig;
use crate::domain::ProjectId;
use crate::error::ValidatorError;
use crate::gdc::{Endpoint, GdcClient, SearchQuery};
use crate::matrix::{Matrix, parse_numeric};
use crate::report::{ComparisonReport, Mismatch, ValidationKind};

pub const PATIENT_COLUMN: &str = "_PATIENT";
pub const OS_TIME_COLUMN: &str = "OS.time";
pub const OS_COLUMN: &str = "OS";

const PROJECT_FIELD: &str = "project.project_id";
const ANALYSIS_PROJECT_FIELD: &str = "cases.project.project_id";
const SUBMITTER_ID: &str = "submitter_id";
const VITAL_STATUS: &str = "vital_status";

pub const SURVIVAL_FIELDS: &[&str] = &[
    "demographic.days_to_death",
    "samples.submitter_id",
    "submitter_id",
    "diagnoses.days_to_best_overall_response",
    "diagnoses.days_to_last_follow_up",
    "diagnoses.days_to_last_known_disease_status",
    "diagnoses.days_to_recurrence",
    "follow_ups.days_to_adverse_event",
    "follow_ups.days_to_comorbidity",
    "follow_ups.days_to_follow_up",
    "follow_ups.days_to_progression",
    "follow_ups.days_to_progression_free",
    "follow_ups.days_to_recurrence",
    "demographic.vital_status",
];

const STATUS_FIELDS: &[&str] = &["demographic.vital_status", "submitter_id"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurvivalRecord {
    pub patient: String,
    pub os_time: f64,
    pub os: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Excluded {
    NoSubmitterId,
    NoTime,
    NoVitalStatus,
    NonPositiveTime,
}

impl fmt::Display for Excluded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Excluded::NoSubmitterId => "no submitter id",
            Excluded::NoTime => "no event time",
            Excluded::NoVitalStatus => "no vital status",
            Excluded::NonPositiveTime => "event time not positive",
        };
        write!(f, "{reason}")
    }
}

/// `Alive` is 0, `Dead` is 1; anything else is unknown.
pub fn vital_status_code(status: &str) -> Option<u8> {
    match status {
        "Alive" => Some(0),
        "Dead" => Some(1),
        _ => None,
    }
}

/// Derives OS.time and OS from one `/cases` hit. The event time is the
/// largest day count found in the demographic block, the first diagnosis
/// and every follow-up.
pub fn survival_from_case(hit: &Value) -> Result<SurvivalRecord, Excluded> {
    let patient = hit
        .get(SUBMITTER_ID)
        .and_then(Value::as_str)
        .ok_or(Excluded::NoSubmitterId)?;

    let mut times = Vec::new();
    let mut status = None;
    if let Some(Value::Object(demographic)) = hit.get("demographic") {
        for (name, value) in demographic {
            if name == VITAL_STATUS {
                status = value.as_str().and_then(vital_status_code);
            } else if let Some(days) = value.as_f64() {
                times.push(days);
            }
        }
    }
    if let Some(Value::Object(diagnosis)) = hit
        .get("diagnoses")
        .and_then(Value::as_array)
        .and_then(|diagnoses| diagnoses.first())
    {
        times.extend(diagnosis.values().filter_map(Value::as_f64));
    }
    if let Some(follow_ups) = hit.get("follow_ups").and_then(Value::as_array) {
        for follow_up in follow_ups.iter().filter_map(Value::as_object) {
            times.extend(follow_up.values().filter_map(Value::as_f64));
        }
    }

    let os_time = times.into_iter().reduce(f64::max).ok_or(Excluded::NoTime)?;
    let os = status.ok_or(Excluded::NoVitalStatus)?;
    if os_time <= 0.0 {
        return Err(Excluded::NonPositiveTime);
    }
    Ok(SurvivalRecord {
        patient: patient.to_string(),
        os_time,
        os: Some(os),
    })
}

pub fn sort_by_time(records: &mut [SurvivalRecord]) {
    records.sort_by(|a, b| a.os_time.partial_cmp(&b.os_time).unwrap_or(Ordering::Equal));
}

pub struct SurvivalValidator<'a, C: GdcClient> {
    client: &'a C,
    config: &'a ResolvedConfig,
}

impl<'a, C: GdcClient> SurvivalValidator<'a, C> {
    pub fn new(client: &'a C, config: &'a ResolvedConfig) -> Self {
        Self { client, config }
    }

    /// Survival derived independently from the `/cases` clinical fields.
    pub fn validate_cases(
        &self,
        matrix: &Matrix,
        project: &ProjectId,
    ) -> Result<ComparisonReport, ValidatorError> {
        let mut report = ComparisonReport::new(ValidationKind::Survival);
        let records = self.records_from_cases(project, &mut report)?;
        compare_survival(matrix, &records, &mut report)?;
        Ok(report)
    }

    /// Survival times from `/analysis/survival`, vital status from `/cases`.
    pub fn validate_endpoint(
        &self,
        matrix: &Matrix,
        project: &ProjectId,
    ) -> Result<ComparisonReport, ValidatorError> {
        let mut report = ComparisonReport::new(ValidationKind::SurvivalEndpoint);
        let records = self.records_from_endpoint(project, &mut report)?;
        compare_survival(matrix, &records, &mut report)?;
        Ok(report)
    }

    pub fn project_case_ids(&self, project: &ProjectId) -> Result<Vec<String>, ValidatorError> {
        let query = SearchQuery::new(PROJECT_FIELD, vec![project.to_string()])
            .fields([SUBMITTER_ID, "case_id"])
            .size(self.config.page_sizes.survival);
        let hits = self.client.search(Endpoint::Cases, &query)?;
        Ok(hits
            .iter()
            .filter_map(|hit| hit.get(SUBMITTER_ID).and_then(Value::as_str))
            .map(str::to_string)
            .collect())
    }

    fn records_from_cases(
        &self,
        project: &ProjectId,
        report: &mut ComparisonReport,
    ) -> Result<Vec<SurvivalRecord>, ValidatorError> {
        let case_ids = self.project_case_ids(project)?;
        tracing::info!(project = %project, cases = case_ids.len(), "project cases listed");
        if case_ids.is_empty() {
            report.diagnostic(format!("project {project} has no cases"));
            return Ok(Vec::new());
        }

        let query = SearchQuery::new(SUBMITTER_ID, case_ids)
            .fields(SURVIVAL_FIELDS.iter().copied())
            .size(self.config.page_sizes.survival);
        let hits = self.client.search(Endpoint::Cases, &query)?;

        let mut records = Vec::new();
        let mut excluded = 0usize;
        for hit in &hits {
            match survival_from_case(hit) {
                Ok(record) => records.push(record),
                Err(reason) => {
                    excluded += 1;
                    let case = hit.get(SUBMITTER_ID).and_then(Value::as_str).unwrap_or_default();
                    tracing::debug!(
                        case,
                        %reason,
                        "case excluded from survival"
                    );
                }
            }
        }
        if excluded > 0 {
            tracing::info!(excluded, "cases without usable survival data");
        }
        sort_by_time(&mut records);
        Ok(records)
    }

    fn records_from_endpoint(
        &self,
        project: &ProjectId,
        report: &mut ComparisonReport,
    ) -> Result<Vec<SurvivalRecord>, ValidatorError> {
        let query = SearchQuery::new(ANALYSIS_PROJECT_FIELD, vec![project.to_string()])
            .size(self.config.page_sizes.survival);
        let donors = self.client.survival(&query)?;
        tracing::info!(project = %project, donors = donors.len(), "survival donors fetched");

        let mut pending = Vec::new();
        for donor in &donors {
            let patient = donor.get(SUBMITTER_ID).and_then(Value::as_str);
            let time = donor.get("time").and_then(Value::as_f64);
            match (patient, time) {
                (Some(patient), Some(time)) => pending.push((patient.to_string(), time)),
                _ => report.diagnostic(format!("survival donor without submitter_id or time: {donor}")),
            }
        }
        if pending.is_empty() {
            return Ok(Vec::new());
        }

        let ids = pending.iter().map(|(patient, _)| patient.clone()).collect::<Vec<_>>();
        let statuses = self.vital_statuses(ids)?;
        let mut records = pending
            .into_iter()
            .map(|(patient, os_time)| {
                let os = statuses.get(&patient).copied();
                SurvivalRecord {
                    patient,
                    os_time,
                    os,
                }
            })
            .collect::<Vec<_>>();
        sort_by_time(&mut records);
        Ok(records)
    }

    fn vital_statuses(&self, ids: Vec<String>) -> Result<HashMap<String, u8>, ValidatorError> {
        let query = SearchQuery::new(SUBMITTER_ID, ids)
            .fields(STATUS_FIELDS.iter().copied())
            .size(self.config.page_sizes.survival);
        let hits = self.client.search(Endpoint::Cases, &query)?;
        let mut statuses = HashMap::new();
        for hit in &hits {
            let Some(patient) = hit.get(SUBMITTER_ID).and_then(Value::as_str) else {
                continue;
            };
            let code = hit
                .get("demographic")
                .and_then(|demographic| demographic.get(VITAL_STATUS))
                .and_then(Value::as_str)
                .and_then(vital_status_code);
            match code {
                Some(code) => {
                    statuses.insert(patient.to_string(), code);
                }
                None => tracing::warn!(case = patient, "unrecognized vital status"),
            }
        }
        Ok(statuses)
    }
}

/// Matches remote records to matrix rows on `_PATIENT` and compares
/// `OS.time` and `OS`. A remote case missing from the matrix is reported
/// with its values; a matrix patient no remote record covers is reported
/// as not compared.
pub fn compare_survival(
    matrix: &Matrix,
    records: &[SurvivalRecord],
    report: &mut ComparisonReport,
) -> Result<(), ValidatorError> {
    let patient_column = matrix.require_column(PATIENT_COLUMN)?;
    let time_column = matrix.require_column(OS_TIME_COLUMN)?;
    let os_column = matrix.require_column(OS_COLUMN)?;
    report.expected = records.len();

    let mut seen = HashSet::new();
    for record in records {
        seen.insert(record.patient.as_str());
        let Some(row) = matrix.find_row(patient_column, &record.patient) else {
            report.diagnostic(format!(
                "case {} missing from survival matrix ({OS_TIME_COLUMN}={}, {OS_COLUMN}={})",
                record.patient,
                record.os_time,
                display_status(record.os)
            ));
            report.push_missing(record.patient.clone());
            continue;
        };

        let matrix_time = matrix.cell(row, time_column).unwrap_or_default();
        let matrix_os = matrix.cell(row, os_column).unwrap_or_default();
        let time_ok = parse_numeric(matrix_time) == record.os_time;
        let os_ok = record
            .os
            .map(|os| parse_numeric(matrix_os) == f64::from(os))
            .unwrap_or(false);
        report.record_cells(usize::from(time_ok) + usize::from(os_ok), 2);

        if !time_ok {
            report.push_mismatch(Mismatch {
                id: record.patient.clone(),
                column: OS_TIME_COLUMN.to_string(),
                remote: record.os_time.to_string(),
                matrix: matrix_time.to_string(),
            });
        }
        if !os_ok {
            report.push_mismatch(Mismatch {
                id: record.patient.clone(),
                column: OS_COLUMN.to_string(),
                remote: display_status(record.os),
                matrix: matrix_os.to_string(),
            });
        }
        if time_ok && os_ok {
            report.record_success();
        } else {
            report.record_failure(record.patient.clone());
        }
    }

    let mut not_compared = Vec::new();
    for patient in matrix.column_values(patient_column) {
        if !seen.contains(patient) && !not_compared.iter().any(|known| known == patient) {
            not_compared.push(patient.to_string());
        }
    }
    report.not_compared = not_compared;
    Ok(())
}

fn display_status(os: Option<u8>) -> String {
    os.map(|value| value.to_string())
        .unwrap_or_else(|| "None".to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn takes_largest_time_across_blocks() {
        let hit = json!({
            "submitter_id": "C1",
            "demographic": {"days_to_death": null, "vital_status": "Alive"},
            "diagnoses": [{"days_to_last_follow_up": 120}, {"days_to_last_follow_up": 900}],
            "follow_ups": [{"days_to_follow_up": 300}, {"days_to_progression": 45}]
        });
        let record = survival_from_case(&hit).unwrap();
        assert_eq!(record.os_time, 300.0);
        assert_eq!(record.os, Some(0));
    }

    #[test]
    fn excludes_non_positive_time() {
        let hit = json!({
            "submitter_id": "C2",
            "demographic": {"days_to_death": 0, "vital_status": "Dead"}
        });
        assert_eq!(survival_from_case(&hit), Err(Excluded::NonPositiveTime));
    }
}
