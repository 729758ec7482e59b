//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: scripts rely on them.
//!
//! | Code | Description                                              |
//! |------|----------------------------------------------------------|
//! | 0    | Success (dry runs included)                              |
//! | 1    | General error (unspecified)                              |
//! | 2    | Usage error or invalid configuration                     |
//! | 3    | Input file not found                                     |
//! | 4    | Required sheet, header or column missing                 |
//! | 5    | Input could not be read or parsed                        |
//! | 6    | Output could not be written                              |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Map the error in `CliError`'s conversions

use pricesync_io::IoError;
use pricesync_recon::ReconError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, unparsable or invalid config.
pub const EXIT_USAGE: u8 = 2;

/// Source or target file does not exist.
pub const EXIT_INPUT_MISSING: u8 = 3;

/// Sheet, key column, price column or target price header not found.
pub const EXIT_MISSING_COLUMN: u8 = 4;

/// Workbook or CSV could not be opened, or the package is malformed.
pub const EXIT_READ: u8 = 5;

/// Output file could not be created or persisted.
pub const EXIT_WRITE: u8 = 6;

pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => EXIT_USAGE,
        ReconError::MissingColumn { .. }
        | ReconError::NoPriceColumn { .. }
        | ReconError::MissingSheet { .. } => EXIT_MISSING_COLUMN,
    }
}

pub fn io_exit_code(err: &IoError) -> u8 {
    match err {
        IoError::NotFound(_) => EXIT_INPUT_MISSING,
        IoError::UnsupportedFormat { .. } | IoError::OutputIsTarget(_) => EXIT_USAGE,
        IoError::Read { .. }
        | IoError::Package { .. }
        | IoError::Zip(_)
        | IoError::Xml(_)
        | IoError::Csv(_) => EXIT_READ,
        IoError::Write { .. } => EXIT_WRITE,
        IoError::Recon(e) => recon_exit_code(e),
        IoError::Io(_) => EXIT_ERROR,
    }
}
