use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::ValidatorError;
use crate::matrix::Matrix;
use crate::report::{CorrelationReport, PairCorrelation};

/// Raw counts matrices are correlated on their first row.
pub const COUNTS_SUFFIX: &str = "counts.tsv";

const MATRIX_SUFFIXES: [&str; 4] = [COUNTS_SUFFIX, "tpm.tsv", "fpkm.tsv", "fpkm-uq.tsv"];

/// Pearson correlation over the pairs where both values are finite.
pub fn pearson(left: &[f64], right: &[f64]) -> Option<f64> {
    let (xs, ys): (Vec<f64>, Vec<f64>) = left
        .iter()
        .zip(right)
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|(x, y)| (*x, *y))
        .unzip();
    if xs.len() < 2 {
        return None;
    }
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;
    let mut covariance = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(&ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        covariance += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(covariance / (var_x.sqrt() * var_y.sqrt()))
}

/// Spearman rank correlation; ties share their average rank.
pub fn spearman(left: &[f64], right: &[f64]) -> Option<f64> {
    let (xs, ys): (Vec<f64>, Vec<f64>) = left
        .iter()
        .zip(right)
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|(x, y)| (*x, *y))
        .unzip();
    pearson(&average_ranks(&xs), &average_ranks(&ys))
}

fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order = (0..values.len()).collect::<Vec<_>>();
    order.sort_by(|a, b| values[*a].partial_cmp(&values[*b]).unwrap_or(Ordering::Equal));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        let rank = (start + end + 1) as f64 / 2.0;
        for index in &order[start..end] {
            ranks[*index] = rank;
        }
        start = end;
    }
    ranks
}

/// Undoes the warehouse's `log2(x + 1)`.
pub fn exp2_minus_one(values: &[f64]) -> Vec<f64> {
    values.iter().map(|value| value.exp2() - 1.0).collect()
}

/// Short name of a matrix file: its data-type suffix when it has one.
pub fn matrix_label(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    MATRIX_SUFFIXES
        .iter()
        .find(|suffix| name.ends_with(**suffix))
        .map(|suffix| suffix.to_string())
        .unwrap_or(name)
}

fn is_counts(path: &Path) -> bool {
    path.to_string_lossy().ends_with(COUNTS_SUFFIX)
}

fn column_series(matrix: &Matrix, sample: &str) -> Vec<(String, f64)> {
    let Some(column) = matrix.column_index(sample) else {
        return Vec::new();
    };
    (0..matrix.len())
        .map(|row| {
            (
                matrix.row_label(row).unwrap_or_default().to_string(),
                matrix.numeric(row, column).unwrap_or(f64::NAN),
            )
        })
        .collect()
}

fn first_row_series(matrix: &Matrix) -> Vec<(String, f64)> {
    matrix
        .column_ids()
        .iter()
        .enumerate()
        .map(|(index, id)| (id.clone(), matrix.numeric(0, index + 1).unwrap_or(f64::NAN)))
        .collect()
}

/// Pairs up two labelled series on their labels, in the left series' order.
fn align(left: &[(String, f64)], right: &[(String, f64)]) -> (Vec<f64>, Vec<f64>) {
    let lookup = right
        .iter()
        .map(|(label, value)| (label.as_str(), *value))
        .collect::<HashMap<_, _>>();
    left.iter()
        .filter_map(|(label, value)| lookup.get(label.as_str()).map(|other| (*value, *other)))
        .unzip()
}

/// Correlates every pair of two to four expression matrices on the first
/// sample of the first matrix.
pub fn correlate(paths: &[PathBuf]) -> Result<CorrelationReport, ValidatorError> {
    if !(2..=4).contains(&paths.len()) {
        return Err(ValidatorError::Usage(
            "correlate takes two to four matrix files".to_string(),
        ));
    }
    let matrices = paths
        .iter()
        .map(|path| Matrix::load(path))
        .collect::<Result<Vec<_>, _>>()?;
    let counts = paths.iter().position(|path| is_counts(path));
    let sample = matrices[0].column_ids().first().cloned();

    let mut pairs = Vec::new();
    for left in 0..matrices.len() {
        for right in left + 1..matrices.len() {
            let by_row = counts == Some(left) || counts == Some(right);
            let (pearson_value, spearman_value) = if by_row {
                let (xs, ys) = align(
                    &first_row_series(&matrices[left]),
                    &first_row_series(&matrices[right]),
                );
                (pearson(&exp2_minus_one(&xs), &exp2_minus_one(&ys)), None)
            } else {
                let Some(sample) = sample.as_deref() else {
                    return Err(ValidatorError::Matrix(
                        "first matrix has no sample columns".to_string(),
                    ));
                };
                let (xs, ys) = align(
                    &column_series(&matrices[left], sample),
                    &column_series(&matrices[right], sample),
                );
                (
                    pearson(&exp2_minus_one(&xs), &exp2_minus_one(&ys)),
                    spearman(&xs, &ys),
                )
            };
            tracing::debug!(left, right, by_row, "pair correlated");
            pairs.push(PairCorrelation {
                left: matrix_label(&paths[left]),
                right: matrix_label(&paths[right]),
                pearson: pearson_value,
                spearman: spearman_value,
                by_row,
            });
        }
    }

    Ok(CorrelationReport {
        generated_at: Utc::now(),
        sample,
        pairs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_linear_relation() {
        let r = pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]).unwrap();
        assert!((r - 1.0).abs() < 1e-12);
    }

    #[test]
    fn ties_get_average_rank() {
        assert_eq!(average_ranks(&[10.0, 20.0, 10.0, 30.0]), vec![1.5, 3.0, 1.5, 4.0]);
    }

    #[test]
    fn spearman_ignores_monotone_transform() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        let ys = [1.0, 8.0, 27.0, 64.0];
        assert!((spearman(&xs, &ys).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn label_uses_data_type_suffix() {
        assert_eq!(matrix_label(Path::new("/x/P.star_fpkm-uq.tsv")), "fpkm-uq.tsv");
        assert_eq!(matrix_label(Path::new("P.star_counts.tsv")), "counts.tsv");
        assert_eq!(matrix_label(Path::new("other.txt")), "other.txt");
    }
}
