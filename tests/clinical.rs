mod common;

use serde_json::json;

use xena_gdc_validator::clinical::{ClinicalValidator, SAMPLE_FIELD, request_fields};
use xena_gdc_validator::config::ResolvedConfig;
use xena_gdc_validator::gdc::Endpoint;
use xena_gdc_validator::matrix::Matrix;

use common::MockGdc;

const HEADER: &str = "sample\tsubmitter_id\tsubmitter_id.samples\tgender.demographic\tage_at_diagnosis.diagnoses\ttreatment_type.treatments.diagnoses\ttreatment_or_therapy.treatments.diagnoses\n";

fn clinical_matrix(rows: &[&str]) -> Matrix {
    let mut content = HEADER.to_string();
    for row in rows {
        content.push_str(row);
        content.push('\n');
    }
    Matrix::from_reader(content.as_bytes()).unwrap()
}

const CASE_1: &str = "CASE-1-01A\tCASE-1\tCASE-1-01A\tmale\t12000\t['Radiation Therapy, NOS', 'Chemotherapy']\t['yes', '']";
const CASE_2: &str = "CASE-2-01A\tCASE-2\tCASE-2-01A\tfemale\tNaN\t['Surgery, NOS']\t['no']";

#[test]
fn matching_matrix_passes() {
    let client = MockGdc::new().respond_fixture(Endpoint::Cases, SAMPLE_FIELD, "clinical_cases.json");
    let config = ResolvedConfig::default();
    let matrix = clinical_matrix(&[CASE_1, CASE_2]);

    let report = ClinicalValidator::new(&client, &config)
        .validate(&matrix)
        .unwrap();

    assert!(report.passed(), "{report:?}");
    assert_eq!(report.successes, 2);
    assert_eq!(report.expected, 2);
    assert!(report.mismatches.is_empty());
    assert!(report.cells_compared > 0);
    assert_eq!(report.cells_matched, report.cells_compared);
}

#[test]
fn query_filters_on_matrix_samples() {
    let client = MockGdc::new().respond_fixture(Endpoint::Cases, SAMPLE_FIELD, "clinical_cases.json");
    let config = ResolvedConfig::default();
    let matrix = clinical_matrix(&[CASE_1, CASE_2]);

    ClinicalValidator::new(&client, &config)
        .validate(&matrix)
        .unwrap();

    let requests = client.requests_to(Endpoint::Cases);
    assert_eq!(requests.len(), 1);
    let body = &requests[0];
    assert_eq!(body["filters"]["content"]["value"], json!(["CASE-1-01A", "CASE-2-01A"]));
    assert_eq!(body["size"], "20000");
    let fields = body["fields"].as_str().unwrap();
    assert!(fields.contains("diagnoses.treatments.treatment_type"));
    assert!(fields.contains("samples.submitter_id"));
}

#[test]
fn changed_value_is_reported_with_both_sides() {
    let client = MockGdc::new().respond_fixture(Endpoint::Cases, SAMPLE_FIELD, "clinical_cases.json");
    let config = ResolvedConfig::default();
    let matrix = clinical_matrix(&[
        CASE_1,
        "CASE-2-01A\tCASE-2\tCASE-2-01A\tmale\tNaN\t['Surgery, NOS']\t['no']",
    ]);

    let report = ClinicalValidator::new(&client, &config)
        .validate(&matrix)
        .unwrap();

    assert!(!report.passed());
    assert_eq!(report.successes, 1);
    assert_eq!(report.failed, vec!["CASE-2"]);
    assert_eq!(report.mismatches.len(), 1);
    let mismatch = &report.mismatches[0];
    assert_eq!(mismatch.column, "gender.demographic");
    assert_eq!(mismatch.remote, "female");
    assert_eq!(mismatch.matrix, "male");
}

#[test]
fn value_contained_in_cell_is_still_a_mismatch() {
    let hit = json!({
        "id": "0b1f2a6e-6a0f-4b7e-8f2e-7d1c1c7d2a01",
        "submitter_id": "CASE-1",
        "demographic": {"gender": "male"},
        "diagnoses": [{"age_at_diagnosis": 1200}],
        "samples": [{"submitter_id": "CASE-1-01A", "sample_type": "Primary Tumor"}]
    });
    let client = MockGdc::new().respond(Endpoint::Cases, SAMPLE_FIELD, json!({"data": {"hits": [hit]}}));
    let config = ResolvedConfig::default();
    let matrix = Matrix::from_reader(
        "sample\tsubmitter_id\tsubmitter_id.samples\tgender.demographic\tage_at_diagnosis.diagnoses\n\
         CASE-1-01A\tCASE-1\tCASE-1-01A\tfemale\t12000\n"
            .as_bytes(),
    )
    .unwrap();

    let report = ClinicalValidator::new(&client, &config)
        .validate(&matrix)
        .unwrap();

    assert!(!report.passed());
    assert_eq!(report.failed, vec!["CASE-1"]);
    let columns: Vec<_> = report.mismatches.iter().map(|m| m.column.as_str()).collect();
    assert_eq!(columns, ["gender.demographic", "age_at_diagnosis.diagnoses"]);
}

#[test]
fn gdc_sample_absent_from_matrix_is_reported() {
    let mut response = common::fixture_json("clinical_cases.json");
    response["data"]["hits"][1]["samples"]
        .as_array_mut()
        .unwrap()
        .push(json!({"submitter_id": "CASE-2-02A", "sample_type": "Recurrent Tumor"}));
    let client = MockGdc::new().respond(Endpoint::Cases, SAMPLE_FIELD, response);
    let config = ResolvedConfig::default();
    let matrix = clinical_matrix(&[CASE_1, CASE_2]);

    let report = ClinicalValidator::new(&client, &config)
        .validate(&matrix)
        .unwrap();

    assert_eq!(report.successes, 2);
    assert_eq!(report.missing_from_matrix, vec!["CASE-2-02A"]);
    assert!(!report.passed());
}

#[test]
fn excluded_sample_types_are_not_reported_missing() {
    let client = MockGdc::new().respond_fixture(Endpoint::Cases, SAMPLE_FIELD, "clinical_cases.json");
    let config = ResolvedConfig::default();
    let matrix = clinical_matrix(&[CASE_1, CASE_2]);

    let report = ClinicalValidator::new(&client, &config)
        .validate(&matrix)
        .unwrap();

    // CASE-1-10A is a blood derived normal
    assert!(report.missing_from_matrix.is_empty());
}

#[test]
fn second_pass_covers_case_with_two_samples() {
    let hit = json!({
        "id": "0b1f2a6e-6a0f-4b7e-8f2e-7d1c1c7d2a01",
        "submitter_id": "CASE-1",
        "demographic": {"gender": "male"},
        "samples": [
            {"submitter_id": "CASE-1-01A", "sample_type": "Primary Tumor"},
            {"submitter_id": "CASE-1-02A", "sample_type": "Recurrent Tumor"}
        ]
    });
    let response = json!({"data": {"hits": [hit]}});
    let client = MockGdc::new().respond(Endpoint::Cases, SAMPLE_FIELD, response);
    let config = ResolvedConfig::default();
    let matrix = Matrix::from_reader(
        "sample\tsubmitter_id\tsubmitter_id.samples\tgender.demographic\n\
         CASE-1-01A\tCASE-1\tCASE-1-01A\tmale\n\
         CASE-1-02A\tCASE-1\tCASE-1-02A\tmale\n"
            .as_bytes(),
    )
    .unwrap();

    let report = ClinicalValidator::new(&client, &config)
        .validate(&matrix)
        .unwrap();

    let requests = client.requests_to(Endpoint::Cases);
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1]["filters"]["content"]["value"], json!(["CASE-1-02A"]));
    assert!(report.passed(), "{report:?}");
    assert_eq!(report.total, 2);
    assert!(report.not_compared.is_empty());
}

#[test]
fn sample_without_gdc_record_is_not_compared() {
    let client = MockGdc::new()
        .respond_fixture(Endpoint::Cases, SAMPLE_FIELD, "clinical_cases.json")
        .respond(Endpoint::Cases, SAMPLE_FIELD, json!({"data": {"hits": []}}));
    let config = ResolvedConfig::default();
    let matrix = clinical_matrix(&[
        CASE_1,
        CASE_2,
        "CASE-9-01A\tCASE-9\tCASE-9-01A\tmale\tNaN\t''\t''",
    ]);

    let report = ClinicalValidator::new(&client, &config)
        .validate(&matrix)
        .unwrap();

    assert_eq!(client.requests_to(Endpoint::Cases).len(), 2);
    assert_eq!(report.successes, 2);
    assert_eq!(report.not_compared, vec!["CASE-9-01A"]);
    assert!(!report.passed());
}

#[test]
fn request_fields_are_gdc_ordered() {
    let matrix = clinical_matrix(&[CASE_1]);
    let fields = request_fields(&matrix);
    assert_eq!(fields[0], "sample");
    assert!(fields.contains(&"demographic.gender".to_string()));
    assert!(fields.contains(&"diagnoses.age_at_diagnosis".to_string()));
    assert_eq!(
        fields.iter().filter(|field| *field == SAMPLE_FIELD).count(),
        1
    );
}
