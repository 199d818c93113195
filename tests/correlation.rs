mod common;

use std::path::PathBuf;

use assert_matches::assert_matches;
use tempfile::tempdir;

use xena_gdc_validator::correlation::{correlate, exp2_minus_one, pearson, spearman};
use xena_gdc_validator::error::ValidatorError;

use common::write_matrix;

#[test]
fn counts_pair_uses_first_row() {
    let dir = tempdir().unwrap();
    let counts = write_matrix(
        dir.path(),
        "TCGA-TEST.star_counts.tsv",
        "Ensembl_ID\tS1\tS2\tS3\nENSG01\t1\t2\t3\nENSG02\t5\t5\t5\n",
    );
    let tpm = write_matrix(
        dir.path(),
        "TCGA-TEST.star_tpm.tsv",
        "Ensembl_ID\tS1\tS2\tS3\nENSG01\t2\t4\t6\nENSG02\t1\t1\t1\n",
    );

    let report = correlate(&[counts, tpm]).unwrap();

    assert_eq!(report.sample.as_deref(), Some("S1"));
    assert_eq!(report.pairs.len(), 1);
    let pair = &report.pairs[0];
    assert!(pair.by_row);
    assert_eq!(pair.left, "counts.tsv");
    assert_eq!(pair.right, "tpm.tsv");
    assert!(pair.pearson.unwrap() > 0.9);
    assert_eq!(pair.spearman, None);
}

#[test]
fn sample_pairs_report_both_coefficients() {
    let dir = tempdir().unwrap();
    let tpm = write_matrix(
        dir.path(),
        "P.star_tpm.tsv",
        "Ensembl_ID\tS1\tS2\nG1\t1\t0\nG2\t2\t0\nG3\t3\t0\nG4\t4\t0\n",
    );
    let fpkm = write_matrix(
        dir.path(),
        "P.star_fpkm.tsv",
        "Ensembl_ID\tS1\nG4\t4\nG3\t3\nG2\t2\nG1\t1\n",
    );
    let fpkm_uq = write_matrix(
        dir.path(),
        "P.star_fpkm-uq.tsv",
        "Ensembl_ID\tS1\nG1\t4\nG2\t3\nG3\t2\nG4\t1\n",
    );

    let report = correlate(&[tpm, fpkm, fpkm_uq]).unwrap();

    assert_eq!(report.pairs.len(), 3);
    let same = &report.pairs[0];
    assert!(!same.by_row);
    assert!((same.pearson.unwrap() - 1.0).abs() < 1e-9);
    assert!((same.spearman.unwrap() - 1.0).abs() < 1e-9);

    let reversed = &report.pairs[1];
    assert_eq!(reversed.right, "fpkm-uq.tsv");
    assert!((reversed.spearman.unwrap() + 1.0).abs() < 1e-9);
}

#[test]
fn matrix_count_outside_two_to_four_is_usage_error() {
    let paths = vec![PathBuf::from("only.tsv")];
    assert_matches!(correlate(&paths), Err(ValidatorError::Usage(_)));

    let paths = vec![PathBuf::from("a.tsv"); 5];
    assert_matches!(correlate(&paths), Err(ValidatorError::Usage(_)));
}

#[test]
fn unreadable_matrix_is_reported() {
    let dir = tempdir().unwrap();
    let paths = vec![dir.path().join("a.tsv"), dir.path().join("b.tsv")];
    assert_matches!(correlate(&paths), Err(ValidatorError::MatrixRead(_)));
}

#[test]
fn coefficients_skip_missing_values() {
    let xs = [1.0, 2.0, f64::NAN, 3.0];
    let ys = [2.0, 4.0, 100.0, 6.0];
    assert!((pearson(&xs, &ys).unwrap() - 1.0).abs() < 1e-12);
    assert!((spearman(&xs, &ys).unwrap() - 1.0).abs() < 1e-12);
}

#[test]
fn constant_series_has_no_coefficient() {
    assert_eq!(pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]), None);
}

#[test]
fn exp2_minus_one_inverts_log_transform() {
    assert_eq!(exp2_minus_one(&[0.0, 1.0, 3.0]), vec![0.0, 1.0, 7.0]);
}
