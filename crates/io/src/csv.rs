// CSV/TSV price list import

use std::io::Read;
use std::path::Path;

use pricesync_recon::{CellValue, SourceTable};

use crate::error::IoError;

/// Load a delimited price list. The first record is the header row.
pub fn import(path: &Path) -> Result<SourceTable, IoError> {
    let content = read_file_as_utf8(path)?;
    let delimiter = sniff_delimiter(&content);
    import_from_string(&path.display().to_string(), &content, delimiter)
}

/// First record of the file, trimmed.
pub fn headers(path: &Path) -> Result<Vec<String>, IoError> {
    let content = read_file_as_utf8(path)?;
    let delimiter = sniff_delimiter(&content);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    match reader.records().next() {
        Some(record) => Ok(record?.iter().map(|f| f.trim().to_string()).collect()),
        None => Ok(Vec::new()),
    }
}

/// Detect the most likely field delimiter by checking consistency across the first few lines.
///
/// For each candidate (tab, semicolon, comma, pipe), count fields per line. The delimiter
/// that produces the most consistent field count (>1 field) wins.
fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample_lines: Vec<&str> = content.lines().take(10).collect();

    if sample_lines.is_empty() {
        return b',';
    }

    let mut best = b',';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        // Must produce >1 field on the first line to be viable
        if counts.first().copied().unwrap_or(0) <= 1 {
            continue;
        }

        // Score: (lines with the same field count as line 1) * field_count
        let target = counts[0];
        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;

        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

/// Read file and convert to UTF-8 if needed (handles Windows-1252, Latin-1, etc.)
pub fn read_file_as_utf8(path: &Path) -> Result<String, IoError> {
    let mut file = std::fs::File::open(path).map_err(|e| IoError::read(path, e))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(|e| IoError::read(path, e))?;

    // Strip UTF-8 BOM written by Excel's "CSV UTF-8" export
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        bytes.drain(..3);
    }

    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => {
            let bytes = e.into_bytes();
            // Fall back to Windows-1252 (common for Excel-exported CSVs)
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}

fn import_from_string(name: &str, content: &str, delimiter: u8) -> Result<SourceTable, IoError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut records = reader.records();
    let headers: Vec<String> = match records.next() {
        Some(record) => record?.iter().map(|f| f.trim().to_string()).collect(),
        None => Vec::new(),
    };

    let mut rows = Vec::new();
    for record in records {
        let record = record?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        rows.push(
            record
                .iter()
                .map(|f| if f.is_empty() { CellValue::Empty } else { CellValue::Text(f.to_string()) })
                .collect(),
        );
    }

    Ok(SourceTable { name: name.to_string(), headers, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_sniff_semicolon_delimiter() {
        let content = "Cod.Producto;Descripcion;Precio\nA1;Tornillo;10,5\nB2;Tuerca;3\n";
        assert_eq!(sniff_delimiter(content), b';');
    }

    #[test]
    fn test_sniff_comma_delimiter() {
        let content = "Cod.Producto,Descripcion,Precio\nA1,Tornillo,10.5\nB2,Tuerca,3\n";
        assert_eq!(sniff_delimiter(content), b',');
    }

    #[test]
    fn test_sniff_tab_delimiter() {
        let content = "Cod.Producto\tPrecio\nA1\t10.5\nB2\t3\n";
        assert_eq!(sniff_delimiter(content), b'\t');
    }

    #[test]
    fn test_sniff_semicolon_with_commas_in_values() {
        let content = "Cod;Descripcion;Precio\nA1;\"Tornillo, 3mm\";10\nB2;\"Tuerca\";3\n";
        assert_eq!(sniff_delimiter(content), b';');
    }

    #[test]
    fn test_import_semicolon_price_list() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lista.csv");
        fs::write(&path, "Cod.Producto;Descripcion;Precio\n A1 ;Tornillo;10.5\n;;\nB2;Tuerca;\n").unwrap();

        let table = import(&path).unwrap();
        assert_eq!(table.headers, vec!["Cod.Producto", "Descripcion", "Precio"]);
        // Blank line dropped
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][0].as_code(), "A1");
        assert_eq!(table.rows[0][2].as_number(), Some(10.5));
        assert_eq!(table.rows[1][2], CellValue::Empty);
    }

    #[test]
    fn test_decimal_comma_prices() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lista.csv");
        fs::write(&path, "Cod.Producto;Precio\nA1;10,5\nB2;1.234,50\nC3;$ 7\n").unwrap();

        let table = import(&path).unwrap();
        assert_eq!(table.rows[0][1].as_number(), Some(10.5));
        assert_eq!(table.rows[1][1].as_number(), Some(1234.5));
        assert_eq!(table.rows[2][1].as_number(), Some(7.0));
    }

    #[test]
    fn test_windows_1252_fallback_and_bom() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("latin.csv");
        // "Descripción" with 0xF3 for ó
        let mut bytes = b"Cod.Producto,Descripci".to_vec();
        bytes.push(0xF3);
        bytes.extend_from_slice(b"n,Precio\nA1,x,1\n");
        fs::write(&path, &bytes).unwrap();
        assert_eq!(headers(&path).unwrap()[1], "Descripción");

        let bom = dir.path().join("bom.csv");
        fs::write(&bom, b"\xEF\xBB\xBFCod.Producto,Precio\nA1,1\n").unwrap();
        assert_eq!(headers(&bom).unwrap()[0], "Cod.Producto");
    }
}
