use std::path::PathBuf;

use pricesync_recon::ReconError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("{}: unsupported file type (expected {expected})", .path.display())]
    UnsupportedFormat { path: PathBuf, expected: &'static str },

    /// The workbook could not be opened or a sheet could not be read.
    #[error("{}: {message}", .path.display())]
    Read { path: PathBuf, message: String },

    /// The OOXML package is missing a part or points at one that does not exist.
    #[error("{}: malformed workbook package: {message}", .path.display())]
    Package { path: PathBuf, message: String },

    #[error("output {} would overwrite the target file", .0.display())]
    OutputIsTarget(PathBuf),

    #[error("cannot write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Missing sheet or column, detected while reading.
    #[error(transparent)]
    Recon(#[from] ReconError),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IoError {
    pub fn read(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Read { path: path.into(), message: message.to_string() }
    }

    pub fn package(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Package { path: path.into(), message: message.into() }
    }
}
