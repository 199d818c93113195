use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::clinical::ClinicalValidator;
use crate::config::{ResolvedConfig, TransferKind};
use crate::copy_number::CopyNumberValidator;
use crate::correlation;
use crate::domain::{ExpressionDataType, ProjectId, SurvivalSource};
use crate::download::{BundleTransfer, CurlTransfer, HttpTransfer};
use crate::error::ValidatorError;
use crate::expression::ExpressionValidator;
use crate::gdc::GdcClient;
use crate::matrix::Matrix;
use crate::report::{ComparisonReport, CorrelationReport};
use crate::survival::SurvivalValidator;

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

fn phase(sink: &dyn ProgressSink, message: String) {
    sink.event(ProgressEvent {
        message,
        elapsed: None,
    });
}

fn finished(sink: &dyn ProgressSink, start: Instant, report: &ComparisonReport) {
    sink.event(ProgressEvent {
        message: format!(
            "phase=Report; {} {}/{} passed",
            report.validation, report.successes, report.total
        ),
        elapsed: Some(start.elapsed()),
    });
}

/// Runs one validation per call: load the matrix, query the GDC, download
/// when needed, compare, and hand back the report.
pub struct App<C: GdcClient> {
    client: C,
    config: ResolvedConfig,
}

impl<C: GdcClient> App<C> {
    pub fn new(client: C, config: ResolvedConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn clinical(
        &self,
        matrix_path: &Path,
        sink: &dyn ProgressSink,
    ) -> Result<ComparisonReport, ValidatorError> {
        let start = Instant::now();
        let matrix = load_matrix(matrix_path, sink)?;
        phase(sink, "phase=Query; fetching clinical records from /cases".to_string());
        let report = ClinicalValidator::new(&self.client, &self.config).validate(&matrix)?;
        finished(sink, start, &report);
        Ok(report)
    }

    pub fn survival(
        &self,
        matrix_path: &Path,
        project: &ProjectId,
        source: SurvivalSource,
        sink: &dyn ProgressSink,
    ) -> Result<ComparisonReport, ValidatorError> {
        let start = Instant::now();
        let matrix = load_matrix(matrix_path, sink)?;
        let validator = SurvivalValidator::new(&self.client, &self.config);
        let report = match source {
            SurvivalSource::Cases => {
                phase(sink, format!("phase=Query; survival fields of {project} from /cases"));
                validator.validate_cases(&matrix, project)?
            }
            SurvivalSource::AnalysisEndpoint => {
                phase(sink, format!("phase=Query; {project} from /analysis/survival"));
                validator.validate_endpoint(&matrix, project)?
            }
        };
        finished(sink, start, &report);
        Ok(report)
    }

    pub fn expression(
        &self,
        matrix_path: &Path,
        data_type: ExpressionDataType,
        sink: &dyn ProgressSink,
    ) -> Result<ComparisonReport, ValidatorError> {
        let start = Instant::now();
        let matrix = load_matrix(matrix_path, sink)?;
        phase(sink, format!("phase=Download; STAR gene counts ({data_type})"));
        let report = self.with_transfer(|transfer| {
            ExpressionValidator::new(&self.client, &self.config, transfer).validate(&matrix, data_type)
        })?;
        finished(sink, start, &report);
        Ok(report)
    }

    pub fn copy_number(
        &self,
        matrix_path: &Path,
        sink: &dyn ProgressSink,
    ) -> Result<ComparisonReport, ValidatorError> {
        let start = Instant::now();
        let matrix = load_matrix(matrix_path, sink)?;
        phase(sink, "phase=Download; copy number segment files".to_string());
        let report = self.with_transfer(|transfer| {
            CopyNumberValidator::new(&self.client, &self.config, transfer).validate(&matrix)
        })?;
        finished(sink, start, &report);
        Ok(report)
    }

    pub fn correlate(
        &self,
        paths: &[PathBuf],
        sink: &dyn ProgressSink,
    ) -> Result<CorrelationReport, ValidatorError> {
        let start = Instant::now();
        phase(sink, format!("phase=Load; {} matrices", paths.len()));
        let report = correlation::correlate(paths)?;
        sink.event(ProgressEvent {
            message: format!("phase=Report; {} pairs correlated", report.pairs.len()),
            elapsed: Some(start.elapsed()),
        });
        Ok(report)
    }

    fn with_transfer<T>(
        &self,
        run: impl FnOnce(&dyn BundleTransfer) -> Result<T, ValidatorError>,
    ) -> Result<T, ValidatorError> {
        match self.config.transfer {
            TransferKind::Http => run(&HttpTransfer::new(&self.client)),
            TransferKind::Curl => run(&CurlTransfer::new(&self.config.api_base)),
        }
    }
}

fn load_matrix(path: &Path, sink: &dyn ProgressSink) -> Result<Matrix, ValidatorError> {
    phase(sink, format!("phase=Load; reading {}", path.display()));
    let matrix = Matrix::load(path)?;
    tracing::debug!(
        rows = matrix.len(),
        columns = matrix.headers().len(),
        "matrix loaded"
    );
    Ok(matrix)
}
