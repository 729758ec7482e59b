// File I/O: price list and catalog loading, structure-preserving XLSX patching

pub mod csv;
pub mod error;
pub mod xlsx;
pub mod xlsx_patch;

use std::path::Path;

use pricesync_recon::{SourceTable, TargetSheet};

pub use error::IoError;
pub use xlsx_patch::{is_same_file, patch_workbook, CellPatch, PatchReport};

/// How a source file is read, decided by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Spreadsheet,
    Delimited,
}

impl SourceFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => Some(Self::Spreadsheet),
            "csv" | "tsv" | "txt" => Some(Self::Delimited),
            _ => None,
        }
    }
}

const SOURCE_EXTENSIONS: &str = "xlsx, xlsm, xls, xlsb, ods, csv, tsv or txt";
const TARGET_EXTENSIONS: &str = "xlsx or xlsm";

fn ensure_exists(path: &Path) -> Result<(), IoError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(IoError::NotFound(path.to_path_buf()))
    }
}

/// Load the price list. `sheet` only applies to spreadsheet sources.
pub fn load_source(path: &Path, sheet: Option<&str>) -> Result<SourceTable, IoError> {
    ensure_exists(path)?;
    match SourceFormat::from_path(path) {
        Some(SourceFormat::Spreadsheet) => xlsx::import_source(path, sheet),
        Some(SourceFormat::Delimited) => {
            if let Some(sheet) = sheet {
                tracing::warn!(sheet, path = %path.display(), "sheet ignored for delimited source");
            }
            csv::import(path)
        }
        None => Err(IoError::UnsupportedFormat { path: path.to_path_buf(), expected: SOURCE_EXTENSIONS }),
    }
}

/// Check that `path` is a catalog the patcher can write back to.
pub fn check_target(path: &Path) -> Result<(), IoError> {
    ensure_exists(path)?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("xlsx" | "xlsm") => Ok(()),
        _ => Err(IoError::UnsupportedFormat { path: path.to_path_buf(), expected: TARGET_EXTENSIONS }),
    }
}

/// Load the target catalog sheet in absolute coordinates.
pub fn load_target(path: &Path, sheet: &str) -> Result<TargetSheet, IoError> {
    check_target(path)?;
    xlsx::import_target(path, sheet)
}

/// Header row of every sheet in a file. Delimited files report a single
/// unnamed sheet.
pub fn file_headers(path: &Path) -> Result<Vec<(String, Vec<String>)>, IoError> {
    ensure_exists(path)?;
    match SourceFormat::from_path(path) {
        Some(SourceFormat::Spreadsheet) => xlsx::sheet_headers(path),
        Some(SourceFormat::Delimited) => Ok(vec![(String::new(), csv::headers(path)?)]),
        None => Err(IoError::UnsupportedFormat { path: path.to_path_buf(), expected: SOURCE_EXTENSIONS }),
    }
}
