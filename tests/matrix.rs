mod common;

use assert_matches::assert_matches;
use tempfile::tempdir;

use xena_gdc_validator::error::ValidatorError;
use xena_gdc_validator::matrix::{Matrix, read_header_ids};

use common::write_matrix;

#[test]
fn header_ids_skip_row_label() {
    let dir = tempdir().unwrap();
    let path = write_matrix(
        dir.path(),
        "counts.tsv",
        "Ensembl_ID\tTCGA-01 \tTCGA-02\nENSG01\t1\t2\n",
    );
    assert_eq!(read_header_ids(&path).unwrap(), vec!["TCGA-01", "TCGA-02"]);
}

#[test]
fn empty_file_has_no_header() {
    let dir = tempdir().unwrap();
    let path = write_matrix(dir.path(), "empty.tsv", "");
    assert_matches!(read_header_ids(&path), Err(ValidatorError::Matrix(_)));
}

#[test]
fn missing_file_is_read_error() {
    let dir = tempdir().unwrap();
    assert_matches!(
        Matrix::load(&dir.path().join("absent.tsv")),
        Err(ValidatorError::MatrixRead(_))
    );
}

#[test]
fn cells_are_kept_verbatim() {
    let matrix = Matrix::from_reader(
        "sample\ttreatment_type.treatments.diagnoses\tage\n\
         S1\t['Radiation', '']\t\n"
            .as_bytes(),
    )
    .unwrap();
    assert_eq!(matrix.cell_by_name(0, "treatment_type.treatments.diagnoses"), Some("['Radiation', '']"));
    assert_eq!(matrix.cell(0, 2), Some(""));
    assert!(matrix.numeric(0, 2).unwrap().is_nan());
}

#[test]
fn ragged_rows_are_rejected() {
    assert_matches!(
        Matrix::from_reader("a\tb\nx\ty\tz\n".as_bytes()),
        Err(ValidatorError::Matrix(_))
    );
}

#[test]
fn lookups_by_column_and_value() {
    let matrix = Matrix::from_reader(
        "sample\t_PATIENT\tOS\n\
         S1\tP1\t1\n\
         S2\tP1\t1\n\
         S3\tP2\t0\n"
            .as_bytes(),
    )
    .unwrap();

    assert_eq!(matrix.len(), 3);
    assert_eq!(matrix.column_ids(), ["_PATIENT", "OS"]);
    let patient = matrix.require_column("_PATIENT").unwrap();
    assert_eq!(matrix.distinct_values(patient), vec!["P1", "P2"]);
    assert_eq!(matrix.find_row(patient, "P2"), Some(2));
    assert_eq!(matrix.find_row_any("S2"), Some(1));
    assert_eq!(matrix.find_row_any("P9"), None);
    assert_eq!(matrix.row_labels().collect::<Vec<_>>(), vec!["S1", "S2", "S3"]);
    assert_matches!(
        matrix.require_column("OS.time"),
        Err(ValidatorError::MissingColumn(name)) if name == "OS.time"
    );
}
