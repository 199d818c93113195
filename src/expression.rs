use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use csv::ReaderBuilder;

use crate::compare::{floats_match, log2_plus_one, matrix_value};
use crate::config::ResolvedConfig;
use crate::domain::ExpressionDataType;
use crate::download::{BundleTransfer, locate_file};
use crate::error::ValidatorError;
use crate::gdc::GdcClient;
use crate::lookup::{download_sample_files, find_file_names, resolve_sample_files};
use crate::matrix::Matrix;
use crate::report::{ComparisonReport, Mismatch, ValidationKind};

pub const STAR_COUNTS_MARKER: &str = "rna_seq.augmented_star_gene_counts.tsv";

/// Alignment summary rows at the top of a STAR counts file.
pub const STAR_SUMMARY_ROWS: [&str; 4] = ["N_unmapped", "N_multimapping", "N_noFeature", "N_ambiguous"];

const GENE_ID_COLUMN: &str = "gene_id";

#[derive(Debug, Clone, PartialEq)]
pub struct GeneValue {
    pub gene_id: String,
    pub value: f64,
}

/// Reads one STAR augmented gene counts file and returns the selected
/// column as `log2(x + 1)`, summary rows dropped.
pub fn read_star_counts(
    path: &Path,
    data_type: ExpressionDataType,
) -> Result<Vec<GeneValue>, ValidatorError> {
    let data_error = |message: String| ValidatorError::DataFile {
        path: path.to_path_buf(),
        message,
    };
    let file = File::open(path).map_err(|err| data_error(err.to_string()))?;
    let mut reader = BufReader::new(file);
    // gene-model comment line
    if reader
        .fill_buf()
        .map_err(|err| data_error(err.to_string()))?
        .starts_with(b"#")
    {
        let mut comment = String::new();
        reader
            .read_line(&mut comment)
            .map_err(|err| data_error(err.to_string()))?;
    }

    let mut rdr = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .quoting(false)
        .from_reader(reader);
    let headers = rdr
        .headers()
        .map_err(|err| data_error(err.to_string()))?
        .clone();
    let gene_index = headers
        .iter()
        .position(|header| header == GENE_ID_COLUMN)
        .ok_or_else(|| data_error(format!("missing column {GENE_ID_COLUMN}")))?;
    let value_index = headers
        .iter()
        .position(|header| header == data_type.column())
        .ok_or_else(|| data_error(format!("missing column {}", data_type.column())))?;

    let mut values = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(|err| data_error(err.to_string()))?;
        let gene_id = record.get(gene_index).unwrap_or_default();
        if STAR_SUMMARY_ROWS.contains(&gene_id) {
            continue;
        }
        let raw = record.get(value_index).unwrap_or_default().trim();
        let value = if raw.is_empty() {
            f64::NAN
        } else {
            raw.parse::<f64>()
                .map_err(|_| data_error(format!("non-numeric value {raw:?} for {gene_id}")))?
        };
        values.push(GeneValue {
            gene_id: gene_id.to_string(),
            value: log2_plus_one(value),
        });
    }
    Ok(values)
}

/// Compares the sample's matrix column against the file values row by row,
/// stopping at the first mismatch.
pub fn compare_sample(
    matrix: &Matrix,
    sample: &str,
    genes: &[GeneValue],
    report: &mut ComparisonReport,
) -> Result<bool, ValidatorError> {
    let column = matrix.require_column(sample)?;
    let mut matched = 0usize;
    let mut compared = 0usize;
    let mut passed = true;

    for (row, gene) in genes.iter().enumerate() {
        compared += 1;
        let Some(cell) = matrix.cell(row, column) else {
            report.push_mismatch(Mismatch {
                id: sample.to_string(),
                column: gene.gene_id.clone(),
                remote: gene.value.to_string(),
                matrix: "<no row>".to_string(),
            });
            passed = false;
            break;
        };
        if floats_match(gene.value, matrix_value(cell)) {
            matched += 1;
            continue;
        }
        let label = matrix.row_label(row).unwrap_or_default();
        tracing::debug!(sample, row, gene = %gene.gene_id, matrix_gene = label, "expression mismatch");
        report.push_mismatch(Mismatch {
            id: sample.to_string(),
            column: gene.gene_id.clone(),
            remote: gene.value.to_string(),
            matrix: cell.to_string(),
        });
        passed = false;
        break;
    }

    if passed && matrix.len() != genes.len() {
        report.diagnostic(format!(
            "sample {sample}: matrix has {} rows, GDC file has {}",
            matrix.len(),
            genes.len()
        ));
        passed = false;
    }
    report.record_cells(matched, compared);
    Ok(passed)
}

pub struct ExpressionValidator<'a, C: GdcClient> {
    client: &'a C,
    config: &'a ResolvedConfig,
    transfer: &'a dyn BundleTransfer,
}

impl<'a, C: GdcClient> ExpressionValidator<'a, C> {
    pub fn new(client: &'a C, config: &'a ResolvedConfig, transfer: &'a dyn BundleTransfer) -> Self {
        Self {
            client,
            config,
            transfer,
        }
    }

    pub fn validate(
        &self,
        matrix: &Matrix,
        data_type: ExpressionDataType,
    ) -> Result<ComparisonReport, ValidatorError> {
        let samples = matrix.column_ids().to_vec();
        let mut report = ComparisonReport::new(ValidationKind::Expression);
        report.expected = samples.len();

        let names = find_file_names(self.client, self.config, &samples, STAR_COUNTS_MARKER)?;
        let files = resolve_sample_files(self.client, self.config, &names, &samples)?;
        tracing::info!(samples = samples.len(), files = files.len(), %data_type, "expression files resolved");
        if files.is_empty() {
            report.diagnostic("no STAR gene counts files found for the matrix samples");
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
            let genes = read_star_counts(&path, data_type)?;
            if compare_sample(matrix, sample, &genes, &mut report)? {
                report.record_success();
            } else {
                report.record_failure(sample.clone());
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn star_counts_skip_comment_and_summary_rows() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "# gene-model: GENCODE v36\n\
             gene_id\tgene_name\tgene_type\tunstranded\tstranded_first\tstranded_second\ttpm_unstranded\tfpkm_unstranded\tfpkm_uq_unstranded\n\
             N_unmapped\t\t\t10\t10\t10\t\t\t\n\
             N_multimapping\t\t\t10\t10\t10\t\t\t\n\
             N_noFeature\t\t\t10\t10\t10\t\t\t\n\
             N_ambiguous\t\t\t10\t10\t10\t\t\t\n\
             ENSG01\tA\tprotein_coding\t3\t1\t2\t1.0\t0.5\t7.0\n"
        )
        .unwrap();
        let genes = read_star_counts(file.path(), ExpressionDataType::StarCounts).unwrap();
        assert_eq!(genes.len(), 1);
        assert_eq!(genes[0].gene_id, "ENSG01");
        assert_eq!(genes[0].value, 2.0);

        let genes = read_star_counts(file.path(), ExpressionDataType::FpkmUq).unwrap();
        assert_eq!(genes[0].value, 3.0);
    }
}
