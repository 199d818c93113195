use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ValidatorError {
    #[error("invalid project id: {0}")]
    InvalidProjectId(String),

    #[error("invalid GDC file id: {0}")]
    InvalidFileId(String),

    #[error("invalid expression data type: {0}")]
    #[diagnostic(help("available data types are fpkm, fpkm_uq, tpm, star_counts"))]
    InvalidDataType(String),

    #[error("{0}")]
    Usage(String),

    #[error("failed to read matrix file at {0}")]
    MatrixRead(PathBuf),

    #[error("malformed matrix: {0}")]
    Matrix(String),

    #[error("matrix has no column named {0}")]
    MissingColumn(String),

    #[error("config file not found at {0}")]
    MissingConfig(PathBuf),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("GDC request failed: {0}")]
    GdcHttp(String),

    #[error("GDC returned status {status}: {message}")]
    GdcStatus { status: u16, message: String },

    #[error("unexpected GDC response shape: expected {expected}")]
    Envelope { expected: String },

    #[error("malformed data file {path}: {message}")]
    DataFile { path: PathBuf, message: String },

    #[error("download bundle error: {0}")]
    Bundle(String),

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("transfer tool failed: {0}")]
    Transfer(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
