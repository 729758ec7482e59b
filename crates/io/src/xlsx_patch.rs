// Structure-preserving XLSX patching
//
// The output package is the target package with every zip entry copied raw,
// except the worksheet part being patched. That part is streamed through
// quick-xml and only the <c> elements at patched coordinates are rewritten.
// Styles, shared strings, other sheets, defined names and everything else
// survive byte-for-byte.

use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{Read, Seek, Write};
use std::path::Path;

use pricesync_recon::model::{cell_address, format_number};
use pricesync_recon::ReconError;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use serde::Serialize;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::IoError;

const CONTENT_TYPES: &str = "[Content_Types].xml";
const WORKBOOK: &str = "xl/workbook.xml";
const WORKBOOK_RELS: &str = "xl/_rels/workbook.xml.rels";
const CALC_CHAIN: &str = "xl/calcChain.xml";

/// A numeric value to place at a cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellPatch {
    /// 1-based row.
    pub row: u32,
    /// 0-based column.
    pub col: usize,
    pub value: f64,
}

/// What the patcher did to the worksheet part.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct PatchReport {
    /// Existing <c> elements replaced.
    pub cells_rewritten: usize,
    /// <c> elements created because the cell was absent.
    pub cells_inserted: usize,
    /// <row> elements created because the row was absent.
    pub rows_inserted: usize,
    /// Formulas dropped from overwritten cells, plus shared formulas
    /// orphaned by an overwritten master.
    pub formulas_removed: usize,
    pub calc_chain_dropped: bool,
}

/// Copy the workbook at `source` to `dest`, applying `patches` to `sheet`.
///
/// The destination is written through a temporary file in the same
/// directory and only appears once the whole package is complete.
pub fn patch_workbook(
    source: &Path,
    dest: &Path,
    sheet: &str,
    patches: &[CellPatch],
) -> Result<PatchReport, IoError> {
    if is_same_file(source, dest) {
        return Err(IoError::OutputIsTarget(dest.to_path_buf()));
    }

    let file = File::open(source).map_err(|e| IoError::read(source, e))?;
    let mut archive = ZipArchive::new(file)
        .map_err(|e| IoError::package(source, format!("not a zip package: {e}")))?;

    let workbook_xml = read_entry(&mut archive, source, WORKBOOK)?;
    let rels_xml = read_entry(&mut archive, source, WORKBOOK_RELS)?;
    let sheet_part = resolve_sheet_part(&workbook_xml, &rels_xml, sheet)?.ok_or_else(|| {
        IoError::Recon(ReconError::MissingSheet {
            file: source.display().to_string(),
            sheet: sheet.to_string(),
            available: sheet_names_in(&workbook_xml).join(", "),
        })
    })?;
    debug!(sheet, part = %sheet_part, "resolved worksheet part");

    let sheet_xml = read_entry(&mut archive, source, &sheet_part)?;
    let (patched_xml, mut report) = patch_sheet_xml(&sheet_xml, patches)?;

    // Removing a formula invalidates calcChain; Excel rebuilds it when absent
    let drop_calc_chain = report.formulas_removed > 0 && archive.by_name(CALC_CHAIN).is_ok();
    let mut replaced: BTreeMap<String, Vec<u8>> = BTreeMap::new();
    replaced.insert(sheet_part.clone(), patched_xml);
    if drop_calc_chain {
        let content_types = read_entry(&mut archive, source, CONTENT_TYPES)?;
        replaced.insert(
            CONTENT_TYPES.to_string(),
            strip_elements(&content_types, |e| {
                e.local_name().as_ref() == b"Override"
                    && attr(e, b"PartName").is_some_and(|p| p.trim_start_matches('/') == CALC_CHAIN)
            })?,
        );
        replaced.insert(
            WORKBOOK_RELS.to_string(),
            strip_elements(&rels_xml, |e| {
                e.local_name().as_ref() == b"Relationship"
                    && attr(e, b"Target").is_some_and(|t| t.ends_with("calcChain.xml"))
            })?,
        );
        report.calc_chain_dropped = true;
    }

    let dir = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => std::path::PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|e| IoError::Write { path: dest.to_path_buf(), source: e })?;
    let mut tmp = tempfile::NamedTempFile::new_in(&dir)
        .map_err(|e| IoError::Write { path: dest.to_path_buf(), source: e })?;

    {
        let mut writer = ZipWriter::new(tmp.as_file_mut());
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for i in 0..archive.len() {
            let entry = archive.by_index_raw(i)?;
            let name = entry.name().to_string();

            if drop_calc_chain && name == CALC_CHAIN {
                continue;
            }
            match replaced.get(&name) {
                Some(bytes) => {
                    drop(entry);
                    writer.start_file(name.as_str(), options)?;
                    writer.write_all(bytes)?;
                }
                None => writer.raw_copy_file(entry)?,
            }
        }
        writer.finish()?;
    }

    tmp.as_file_mut()
        .flush()
        .map_err(|e| IoError::Write { path: dest.to_path_buf(), source: e })?;
    tmp.persist(dest)
        .map_err(|e| IoError::Write { path: dest.to_path_buf(), source: e.error })?;

    info!(
        dest = %dest.display(),
        rewritten = report.cells_rewritten,
        inserted = report.cells_inserted,
        formulas_removed = report.formulas_removed,
        "workbook written"
    );
    Ok(report)
}

/// True when both paths name the same file, following links and `..`.
pub fn is_same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn read_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    path: &Path,
    name: &str,
) -> Result<Vec<u8>, IoError> {
    let mut file = archive
        .by_name(name)
        .map_err(|_| IoError::package(path, format!("missing part '{name}'")))?;
    let mut content = Vec::new();
    file.read_to_end(&mut content)?;
    Ok(content)
}

/// Unescaped value of attribute `key`, if present.
fn attr(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| {
            let raw = String::from_utf8_lossy(&a.value).into_owned();
            match quick_xml::escape::unescape(&raw) {
                Ok(s) => s.into_owned(),
                Err(_) => raw,
            }
        })
}

/// Relationship id attribute on <sheet>, whatever prefix binds the namespace.
fn rel_id(e: &BytesStart) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == b"id" && a.key.prefix().is_some())
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

fn sheet_names_in(workbook_xml: &[u8]) -> Vec<String> {
    let mut names = Vec::new();
    let mut reader = Reader::from_reader(workbook_xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"sheet" => {
                if let Some(name) = attr(e, b"name") {
                    names.push(name);
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    names
}

/// Resolve a sheet name to its part path via workbook.xml + workbook.xml.rels.
fn resolve_sheet_part(
    workbook_xml: &[u8],
    rels_xml: &[u8],
    sheet: &str,
) -> Result<Option<String>, IoError> {
    let mut rid = None;
    let mut reader = Reader::from_reader(workbook_xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Empty(ref e) | Event::Start(ref e) if e.local_name().as_ref() == b"sheet" => {
                if attr(e, b"name").as_deref() == Some(sheet) {
                    rid = rel_id(e);
                    break;
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    let Some(rid) = rid else {
        return Ok(None);
    };

    let mut reader = Reader::from_reader(rels_xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Empty(ref e) | Event::Start(ref e) if e.local_name().as_ref() == b"Relationship" => {
                if attr(e, b"Id").as_deref() == Some(rid.as_str()) {
                    return Ok(attr(e, b"Target").map(|target| match target.strip_prefix('/') {
                        Some(absolute) => absolute.to_string(),
                        None => format!("xl/{target}"),
                    }));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(None)
}

/// Parse an XLSX cell reference like "C5" or "AA1" to (1-based row, 0-based col).
fn parse_cell_ref(cell_ref: &str) -> Option<(u32, usize)> {
    let split = cell_ref.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = cell_ref.split_at(split);
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    let mut col: usize = 0;
    for ch in letters.chars() {
        col = col * 26 + (ch.to_ascii_uppercase() as usize - 'A' as usize + 1);
    }
    let row: u32 = digits.parse().ok()?;
    (row > 0).then_some((row, col - 1))
}

/// Drop every element for which `matches` returns true (with its children).
fn strip_elements(xml: &[u8], matches: impl Fn(&BytesStart) -> bool) -> Result<Vec<u8>, IoError> {
    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    let mut buf = Vec::new();
    let mut skip_depth = 0usize;

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match event {
            Event::Eof => break,
            Event::Start(_) if skip_depth > 0 => skip_depth += 1,
            Event::End(_) if skip_depth > 0 => skip_depth -= 1,
            _ if skip_depth > 0 => {}
            Event::Start(ref e) if matches(e) => skip_depth = 1,
            Event::Empty(ref e) if matches(e) => {}
            other => writer.write_event(other)?,
        }
        buf.clear();
    }
    Ok(writer.into_inner())
}

// ---------------------------------------------------------------------------
// Worksheet rewriting
// ---------------------------------------------------------------------------

struct SheetPatcher {
    /// row → col → value, consumed as rows are written.
    pending: BTreeMap<u32, BTreeMap<usize, f64>>,
    /// Namespace prefix used by the worksheet's elements ("" or "x:").
    prefix: String,
    /// Shared formula groups whose master cell was overwritten.
    orphaned_shared: HashSet<String>,
    report: PatchReport,
    writer: Writer<Vec<u8>>,
}

impl SheetPatcher {
    fn qname(&self, local: &str) -> String {
        format!("{}{}", self.prefix, local)
    }

    /// `<c r=".."><v>value</v></c>`, keeping style and other attributes of `original`.
    fn write_numeric_cell(
        &mut self,
        original: Option<&BytesStart>,
        row: u32,
        col: usize,
        value: f64,
    ) -> Result<(), IoError> {
        let c_name = self.qname("c");
        let v_name = self.qname("v");
        let address = cell_address(row, col);

        let mut cell = BytesStart::new(c_name.as_str());
        cell.push_attribute(("r", address.as_str()));
        if let Some(original) = original {
            for a in original.attributes().flatten() {
                if matches!(a.key.as_ref(), b"r" | b"t" | b"vm") {
                    continue;
                }
                cell.push_attribute(a);
            }
        }

        let text = format_number(value);
        self.writer.write_event(Event::Start(cell))?;
        self.writer.write_event(Event::Start(BytesStart::new(v_name.as_str())))?;
        self.writer.write_event(Event::Text(BytesText::new(&text)))?;
        self.writer.write_event(Event::End(BytesEnd::new(v_name.as_str())))?;
        self.writer.write_event(Event::End(BytesEnd::new(c_name.as_str())))?;
        Ok(())
    }

    /// Insert new cells for every pending column of `row` left of `before`.
    fn insert_cells(
        &mut self,
        row: u32,
        cols: &mut BTreeMap<usize, f64>,
        before: Option<usize>,
    ) -> Result<(), IoError> {
        let due: Vec<(usize, f64)> = match before {
            Some(b) => cols.range(..b).map(|(c, v)| (*c, *v)).collect(),
            None => cols.iter().map(|(c, v)| (*c, *v)).collect(),
        };
        for (col, value) in due {
            cols.remove(&col);
            self.write_numeric_cell(None, row, col, value)?;
            self.report.cells_inserted += 1;
        }
        Ok(())
    }

    /// Emit whole new rows for pending rows strictly above `before` (all when `None`).
    fn insert_rows(&mut self, before: Option<u32>) -> Result<(), IoError> {
        let due: Vec<u32> = match before {
            Some(b) => self.pending.range(..b).map(|(r, _)| *r).collect(),
            None => self.pending.keys().copied().collect(),
        };
        for row in due {
            let Some(mut cols) = self.pending.remove(&row) else {
                continue;
            };
            let row_name = self.qname("row");
            let mut start = BytesStart::new(row_name.as_str());
            start.push_attribute(("r", row.to_string().as_str()));
            self.writer.write_event(Event::Start(start))?;
            self.insert_cells(row, &mut cols, None)?;
            self.writer.write_event(Event::End(BytesEnd::new(row_name.as_str())))?;
            self.report.rows_inserted += 1;
        }
        Ok(())
    }
}

/// Rewrite a worksheet part so each patched cell holds its numeric value.
pub fn patch_sheet_xml(xml: &[u8], patches: &[CellPatch]) -> Result<(Vec<u8>, PatchReport), IoError> {
    let mut pending: BTreeMap<u32, BTreeMap<usize, f64>> = BTreeMap::new();
    for p in patches {
        pending.entry(p.row).or_default().insert(p.col, p.value);
    }

    let mut patcher = SheetPatcher {
        pending,
        prefix: String::new(),
        orphaned_shared: HashSet::new(),
        report: PatchReport::default(),
        writer: Writer::new(Vec::with_capacity(xml.len() + patches.len() * 32)),
    };

    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();

    let mut in_sheet_data = false;
    let mut last_row: u32 = 0;
    // Columns still to place in the row being written
    let mut row_cols: BTreeMap<usize, f64> = BTreeMap::new();
    let mut last_col: Option<usize> = None;

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match event {
            Event::Eof => break,

            Event::Start(ref e) if e.local_name().as_ref() == b"sheetData" => {
                let qname = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                patcher.prefix = qname.strip_suffix("sheetData").unwrap_or_default().to_string();
                in_sheet_data = true;
                patcher.writer.write_event(Event::Start(e.clone()))?;
            }
            Event::Empty(ref e) if e.local_name().as_ref() == b"sheetData" => {
                let qname = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                patcher.prefix = qname.strip_suffix("sheetData").unwrap_or_default().to_string();
                if patcher.pending.is_empty() {
                    patcher.writer.write_event(Event::Empty(e.clone()))?;
                } else {
                    patcher.writer.write_event(Event::Start(e.clone()))?;
                    patcher.insert_rows(None)?;
                    patcher.writer.write_event(Event::End(e.to_end()))?;
                }
            }
            Event::End(ref e) if e.local_name().as_ref() == b"sheetData" => {
                patcher.insert_rows(None)?;
                in_sheet_data = false;
                patcher.writer.write_event(Event::End(e.clone()))?;
            }

            Event::Start(ref e) if in_sheet_data && e.local_name().as_ref() == b"row" => {
                let row = row_number(e, last_row);
                patcher.insert_rows(Some(row))?;
                last_row = row;
                last_col = None;
                row_cols = patcher.pending.remove(&row).unwrap_or_default();
                patcher.writer.write_event(Event::Start(e.clone()))?;
            }
            Event::Empty(ref e) if in_sheet_data && e.local_name().as_ref() == b"row" => {
                let row = row_number(e, last_row);
                patcher.insert_rows(Some(row))?;
                last_row = row;
                match patcher.pending.remove(&row) {
                    Some(mut cols) => {
                        patcher.writer.write_event(Event::Start(e.clone()))?;
                        patcher.insert_cells(row, &mut cols, None)?;
                        patcher.writer.write_event(Event::End(e.to_end()))?;
                    }
                    None => patcher.writer.write_event(Event::Empty(e.clone()))?,
                }
            }
            Event::End(ref e) if in_sheet_data && e.local_name().as_ref() == b"row" => {
                patcher.insert_cells(last_row, &mut row_cols, None)?;
                patcher.writer.write_event(Event::End(e.clone()))?;
            }

            Event::Start(ref e) | Event::Empty(ref e)
                if in_sheet_data && e.local_name().as_ref() == b"c" =>
            {
                let is_start = matches!(event, Event::Start(_));
                let col = attr(e, b"r")
                    .and_then(|r| parse_cell_ref(&r))
                    .map(|(_, c)| c)
                    .unwrap_or_else(|| last_col.map_or(0, |c| c + 1));
                last_col = Some(col);

                patcher.insert_cells(last_row, &mut row_cols, Some(col))?;

                match row_cols.remove(&col) {
                    Some(value) => {
                        let original = e.clone().into_owned();
                        if is_start {
                            skip_cell_body(&mut reader, &mut patcher)?;
                        }
                        patcher.write_numeric_cell(Some(&original), last_row, col, value)?;
                        patcher.report.cells_rewritten += 1;
                    }
                    None if is_start => patcher.writer.write_event(Event::Start(e.clone()))?,
                    None => patcher.writer.write_event(Event::Empty(e.clone()))?,
                }
            }

            // A dependent of a shared formula whose master was overwritten:
            // keep the cached <v>, drop the dangling <f>
            Event::Start(ref e) if in_sheet_data && is_orphaned_shared(e, &patcher.orphaned_shared) => {
                skip_to_end(&mut reader, e.local_name().as_ref())?;
                patcher.report.formulas_removed += 1;
            }
            Event::Empty(ref e) if in_sheet_data && is_orphaned_shared(e, &patcher.orphaned_shared) => {
                patcher.report.formulas_removed += 1;
            }

            other => patcher.writer.write_event(other)?,
        }
        buf.clear();
    }

    if !patcher.pending.is_empty() || !row_cols.is_empty() {
        return Err(IoError::package(
            "worksheet",
            "patched cells fall outside <sheetData>",
        ));
    }

    let report = patcher.report;
    Ok((patcher.writer.into_inner(), report))
}

fn row_number(e: &BytesStart, last_row: u32) -> u32 {
    attr(e, b"r")
        .and_then(|r| r.parse().ok())
        .unwrap_or(last_row + 1)
}

fn is_orphaned_shared(e: &BytesStart, orphaned: &HashSet<String>) -> bool {
    !orphaned.is_empty()
        && e.local_name().as_ref() == b"f"
        && attr(e, b"t").as_deref() == Some("shared")
        && attr(e, b"ref").is_none()
        && attr(e, b"si").is_some_and(|si| orphaned.contains(&si))
}

/// Consume the children of a <c> being replaced, up to and including </c>.
/// Records removed formulas and orphaned shared-formula groups.
fn skip_cell_body(reader: &mut Reader<&[u8]>, patcher: &mut SheetPatcher) -> Result<(), IoError> {
    let mut buf = Vec::new();
    let mut depth = 0usize;
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) if e.local_name().as_ref() == b"f" => {
                note_removed_formula(e, patcher);
                depth += 1;
            }
            Event::Empty(ref e) if e.local_name().as_ref() == b"f" => note_removed_formula(e, patcher),
            Event::Start(_) => depth += 1,
            Event::End(ref e) if depth == 0 && e.local_name().as_ref() == b"c" => return Ok(()),
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Eof => return Err(IoError::package("worksheet", "unterminated <c> element")),
            _ => {}
        }
        buf.clear();
    }
}

fn note_removed_formula(f: &BytesStart, patcher: &mut SheetPatcher) {
    patcher.report.formulas_removed += 1;
    if attr(f, b"t").as_deref() == Some("shared") && attr(f, b"ref").is_some() {
        if let Some(si) = attr(f, b"si") {
            patcher.orphaned_shared.insert(si);
        }
    }
}

fn skip_to_end(reader: &mut Reader<&[u8]>, local: &[u8]) -> Result<(), IoError> {
    let local = local.to_vec();
    let mut buf = Vec::new();
    let mut depth = 0usize;
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(_) => depth += 1,
            Event::End(ref e) if depth == 0 && e.local_name().as_ref() == local.as_slice() => return Ok(()),
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Eof => return Err(IoError::package("worksheet", "unterminated element")),
            _ => {}
        }
        buf.clear();
    }
}
