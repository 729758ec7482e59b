//! `pricesync headers`: show what the header row of each sheet looks like.

use std::path::PathBuf;

use serde::Serialize;

use crate::exit_codes::EXIT_ERROR;
use crate::CliError;

#[derive(Serialize)]
struct SheetHeaders {
    file: String,
    /// Empty for delimited files.
    sheet: String,
    headers: Vec<String>,
}

#[derive(Serialize)]
struct FileFailure {
    file: String,
    error: String,
}

#[derive(Serialize)]
struct HeadersOutput {
    sheets: Vec<SheetHeaders>,
    errors: Vec<FileFailure>,
}

/// Unreadable files are reported and skipped; the command only fails when
/// no file could be read.
pub fn cmd_headers(files: Vec<PathBuf>, json: bool) -> Result<(), CliError> {
    let mut out = HeadersOutput { sheets: Vec::new(), errors: Vec::new() };
    let mut first_error = None;

    for path in &files {
        match pricesync_io::file_headers(path) {
            Ok(sheets) => {
                for (sheet, headers) in sheets {
                    out.sheets.push(SheetHeaders { file: path.display().to_string(), sheet, headers });
                }
            }
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "skipping unreadable file");
                out.errors.push(FileFailure { file: path.display().to_string(), error: e.to_string() });
                first_error.get_or_insert(e);
            }
        }
    }

    if json {
        let text = serde_json::to_string_pretty(&out)
            .map_err(|e| CliError::new(EXIT_ERROR, format!("JSON serialization error: {e}")))?;
        println!("{text}");
    } else {
        for entry in &out.sheets {
            if entry.sheet.is_empty() {
                println!("{}", entry.file);
            } else {
                println!("{} [{}]", entry.file, entry.sheet);
            }
            for (i, header) in entry.headers.iter().enumerate() {
                if !header.is_empty() {
                    println!("  {:>3}  {}", pricesync_recon::model::column_letters(i), header);
                }
            }
        }
    }

    if out.sheets.is_empty() {
        if let Some(e) = first_error {
            return Err(CliError::from(e));
        }
    }
    Ok(())
}
