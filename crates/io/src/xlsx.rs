// Spreadsheet import (xlsx, xlsm, xls, xlsb, ods) via calamine
//
// Values only: formulas are read as their cached results. Writing back is done
// by xlsx_patch, never by re-serializing what is read here.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader, Sheets};
use pricesync_recon::{CellValue, ReconError, SourceTable, TargetRow, TargetSheet};
use tracing::debug;

use crate::error::IoError;

type Workbook = Sheets<std::io::BufReader<std::fs::File>>;

fn open(path: &Path) -> Result<Workbook, IoError> {
    open_workbook_auto(path).map_err(|e| IoError::read(path, format!("failed to open workbook: {e}")))
}

fn read_range(workbook: &mut Workbook, path: &Path, sheet: &str) -> Result<Range<Data>, IoError> {
    let names = workbook.sheet_names();
    if !names.iter().any(|n| n == sheet) {
        return Err(ReconError::MissingSheet {
            file: path.display().to_string(),
            sheet: sheet.to_string(),
            available: names.join(", "),
        }
        .into());
    }
    workbook
        .worksheet_range(sheet)
        .map_err(|e| IoError::read(path, format!("failed to read sheet '{sheet}': {e}")))
}

/// Convert a calamine cell into the engine's typed cell.
pub fn cell_value(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) if s.is_empty() => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(n) => CellValue::Number(*n),
        Data::Int(n) => CellValue::Number(*n as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => CellValue::DateTime(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Error(e.to_string()),
    }
}

/// Load a price list from `sheet` (first sheet when `None`).
///
/// The first row of the used range is the header row.
pub fn import_source(path: &Path, sheet: Option<&str>) -> Result<SourceTable, IoError> {
    let mut workbook = open(path)?;
    let sheet_name = match sheet {
        Some(name) => name.to_string(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| IoError::read(path, "workbook contains no sheets"))?,
    };

    let range = read_range(&mut workbook, path, &sheet_name)?;
    let mut rows = range.rows();

    let headers: Vec<String> = match rows.next() {
        Some(row) => row.iter().map(|c| cell_value(c).as_code()).collect(),
        None => Vec::new(),
    };

    let rows: Vec<Vec<CellValue>> = rows
        .filter(|row| row.iter().any(|c| !cell_value(c).is_empty()))
        .map(|row| row.iter().map(cell_value).collect())
        .collect();

    debug!(path = %path.display(), sheet = %sheet_name, rows = rows.len(), "source sheet loaded");

    Ok(SourceTable {
        name: path.display().to_string(),
        headers,
        rows,
    })
}

/// Load the target sheet in absolute coordinates: row 1 is the header
/// regardless of where the used range starts.
pub fn import_target(path: &Path, sheet: &str) -> Result<TargetSheet, IoError> {
    let mut workbook = open(path)?;
    let range = read_range(&mut workbook, path, sheet)?;

    let mut target = TargetSheet {
        name: sheet.to_string(),
        ..TargetSheet::default()
    };

    let Some((start_row, start_col)) = range.start() else {
        return Ok(target);
    };

    for (offset, row) in range.rows().enumerate() {
        let number = start_row + offset as u32 + 1;
        let mut cells = vec![CellValue::Empty; start_col as usize];
        cells.extend(row.iter().map(cell_value));

        if number == 1 {
            target.header = cells;
        } else {
            target.rows.push(TargetRow { number, cells });
        }
    }

    debug!(path = %path.display(), sheet, rows = target.rows.len(), "target sheet loaded");
    Ok(target)
}

/// First used row of every sheet, for header inspection.
pub fn sheet_headers(path: &Path) -> Result<Vec<(String, Vec<String>)>, IoError> {
    let mut workbook = open(path)?;
    let mut out = Vec::new();
    for name in workbook.sheet_names() {
        let range = read_range(&mut workbook, path, &name)?;
        let headers = range
            .rows()
            .next()
            .map(|row| row.iter().map(|c| cell_value(c).as_code()).collect())
            .unwrap_or_default();
        out.push((name, headers));
    }
    Ok(out)
}
