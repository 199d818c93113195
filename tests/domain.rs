use assert_matches::assert_matches;

use xena_gdc_validator::domain::{ExpressionDataType, FileId, ProjectId};
use xena_gdc_validator::error::ValidatorError;

#[test]
fn parse_project_id_valid() {
    let project: ProjectId = "TCGA-BRCA".parse().unwrap();
    assert_eq!(project.as_str(), "TCGA-BRCA");
    assert_eq!(project.to_string(), "TCGA-BRCA");
}

#[test]
fn parse_project_id_invalid() {
    assert_matches!(
        "TCGA BRCA".parse::<ProjectId>(),
        Err(ValidatorError::InvalidProjectId(_))
    );
    assert_matches!(
        "-BRCA".parse::<ProjectId>(),
        Err(ValidatorError::InvalidProjectId(_))
    );
}

#[test]
fn file_ids_sort_and_compare_normalized() {
    let upper: FileId = "7A6B5C4D-3E2F-4A1B-9C8D-7E6F5A4B3C22".parse().unwrap();
    let lower: FileId = "7a6b5c4d-3e2f-4a1b-9c8d-7e6f5a4b3c22".parse().unwrap();
    let first: FileId = "4f5d2c1e-9a3b-4c8d-8e7f-1a2b3c4d5e61".parse().unwrap();
    assert_eq!(upper, lower);
    assert!(first < lower);
}

#[test]
fn file_id_rejects_non_uuid() {
    assert_matches!(
        "4f5d2c1e-9a3b-4c8d-8e7f".parse::<FileId>(),
        Err(ValidatorError::InvalidFileId(_))
    );
}

#[test]
fn data_types_map_to_star_columns() {
    let cases = [
        ("fpkm", "fpkm_unstranded"),
        ("fpkm_uq", "fpkm_uq_unstranded"),
        ("tpm", "tpm_unstranded"),
        ("star_counts", "unstranded"),
    ];
    for (name, column) in cases {
        let data_type: ExpressionDataType = name.parse().unwrap();
        assert_eq!(data_type.column(), column);
        assert_eq!(data_type.to_string(), name);
    }
}

#[test]
fn unknown_data_type_is_rejected() {
    assert_matches!(
        "counts".parse::<ExpressionDataType>(),
        Err(ValidatorError::InvalidDataType(_))
    );
}
