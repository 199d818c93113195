use std::fs::File;
use std::path::Path;

use csv::ReaderBuilder;

use crate::compare::cells_equal;
use crate::config::ResolvedConfig;
use crate::download::{BundleTransfer, locate_file};
use crate::error::ValidatorError;
use crate::gdc::GdcClient;
use crate::lookup::{download_sample_files, find_file_names, resolve_sample_files};
use crate::matrix::Matrix;
use crate::report::{ComparisonReport, Mismatch, ValidationKind};

pub const SEGMENT_FILE_MARKER: &str = "copy_number_variation.seg.txt";
pub const SAMPLE_COLUMN: &str = "sample";

/// Matrix columns compared, in the order they follow the aliquot column of
/// a segment file.
pub const SEGMENT_COLUMNS: [&str; 4] = ["Chrom", "Start", "End", "value"];

pub type Segment = [String; 4];

/// Reads a segment file: header skipped, the aliquot column dropped, the
/// next four columns kept.
pub fn read_segments(path: &Path) -> Result<Vec<Segment>, ValidatorError> {
    let data_error = |message: String| ValidatorError::DataFile {
        path: path.to_path_buf(),
        message,
    };
    let file = File::open(path).map_err(|err| data_error(err.to_string()))?;
    let mut rdr = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .quoting(false)
        .flexible(true)
        .from_reader(file);

    let mut segments = Vec::new();
    for (line, record) in rdr.records().enumerate() {
        let record = record.map_err(|err| data_error(err.to_string()))?;
        if record.len() < 5 {
            return Err(data_error(format!(
                "row {} has {} columns, expected at least 5",
                line + 2,
                record.len()
            )));
        }
        segments.push(std::array::from_fn(|index| {
            record.get(index + 1).unwrap_or_default().trim().to_string()
        }));
    }
    Ok(segments)
}

/// Compares consecutive matrix rows, starting at the sample's first row,
/// against the file's segments. Each column stops at its first mismatch.
/// A null cell on both sides counts as a match.
pub fn compare_segments(
    matrix: &Matrix,
    sample: &str,
    segments: &[Segment],
    report: &mut ComparisonReport,
) -> Result<bool, ValidatorError> {
    let sample_column = matrix.require_column(SAMPLE_COLUMN)?;
    let Some(start) = matrix.find_row(sample_column, sample) else {
        report.diagnostic(format!("sample {sample} has no rows in matrix"));
        return Ok(false);
    };

    let mut passed = true;
    for (position, name) in SEGMENT_COLUMNS.iter().enumerate() {
        let column = matrix.require_column(name)?;
        let mut matched = 0usize;
        let mut compared = 0usize;
        for (offset, segment) in segments.iter().enumerate() {
            compared += 1;
            let cell = matrix.cell(start + offset, column);
            if cell.is_some_and(|cell| cells_equal(&segment[position], cell)) {
                matched += 1;
                continue;
            }
            report.push_mismatch(Mismatch {
                id: sample.to_string(),
                column: name.to_string(),
                remote: segment[position].clone(),
                matrix: cell.unwrap_or("<no row>").to_string(),
            });
            break;
        }
        report.record_cells(matched, compared);
        if matched != segments.len() {
            passed = false;
        }
    }
    Ok(passed)
}

pub struct CopyNumberValidator<'a, C: GdcClient> {
    client: &'a C,
    config: &'a ResolvedConfig,
    transfer: &'a dyn BundleTransfer,
}

impl<'a, C: GdcClient> CopyNumberValidator<'a, C> {
    pub fn new(client: &'a C, config: &'a ResolvedConfig, transfer: &'a dyn BundleTransfer) -> Self {
        Self {
            client,
            config,
            transfer,
        }
    }

    pub fn validate(&self, matrix: &Matrix) -> Result<ComparisonReport, ValidatorError> {
        let sample_column = matrix.require_column(SAMPLE_COLUMN)?;
        let samples = matrix.distinct_values(sample_column);
        let mut report = ComparisonReport::new(ValidationKind::CopyNumber);
        report.expected = samples.len();

        let names = find_file_names(self.client, self.config, &samples, SEGMENT_FILE_MARKER)?;
        let files = resolve_sample_files(self.client, self.config, &names, &samples)?;
        tracing::info!(samples = samples.len(), files = files.len(), "segment files resolved");
        if files.is_empty() {
            report.diagnostic("no copy number segment files found for the matrix samples");
            report.not_compared = samples;
            return Ok(report);
        }
        download_sample_files(self.transfer, self.config, &files)?;

        for sample in &samples {
            let Some(file) = files.iter().find(|file| &file.sample == sample) else {
                report.not_compared.push(sample.clone());
                continue;
            };
            let path = locate_file(self.config.download_dir.as_std_path(), &file.file_id)?;
            let segments = read_segments(&path)?;
            if compare_segments(matrix, sample, &segments, &mut report)? {
                report.record_success();
            } else {
                report.record_failure(sample.clone());
            }
        }
        Ok(report)
    }
}
