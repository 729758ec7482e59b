use std::fmt;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Cells
// ---------------------------------------------------------------------------

/// A typed spreadsheet cell, as read from any supported file format.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
    /// Date or time as a spreadsheet serial. Never a valid price.
    DateTime(f64),
    /// Error literal such as `#N/A` or `#DIV/0!`.
    Error(String),
}

static EMPTY_CELL: CellValue = CellValue::Empty;

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Normalized product code: trimmed text, integral numbers without a fraction.
    /// Empty cells yield an empty string, which never matches a price map entry.
    pub fn as_code(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(s) => s.trim().to_string(),
            Self::Number(n) | Self::DateTime(n) => format_number(*n),
            Self::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
            Self::Error(e) => e.trim().to_string(),
        }
    }

    /// Strict numeric reading: numbers, and text that is a finite price literal
    /// (see [`parse_price`]).
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) if n.is_finite() => Some(*n),
            Self::Text(s) => parse_price(s),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Number(n) | Self::DateTime(n) => f.write_str(&format_number(*n)),
            Self::Text(s) => f.write_str(s),
            Self::Bool(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
            Self::Error(e) => f.write_str(e),
        }
    }
}

/// Render a number the way a spreadsheet displays it in General format:
/// integers without decimals, everything else in shortest round-trip form.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Parse trimmed text as a finite number. `inf`/`NaN` spellings are rejected.
pub fn parse_number(s: &str) -> Option<f64> {
    let n: f64 = s.trim().parse().ok()?;
    n.is_finite().then_some(n)
}

/// Parse a price as typed in a spreadsheet or exported CSV.
///
/// A leading `$` is dropped. Text with a decimal comma (`10,5`, `1.234,50`)
/// reads `.` as the thousands separator; anything else goes through
/// [`parse_number`].
pub fn parse_price(s: &str) -> Option<f64> {
    let t = s.trim().trim_start_matches('$').trim_start();
    let Some((int, frac)) = t.split_once(',') else {
        return parse_number(t);
    };

    let digits = int.strip_prefix('-').unwrap_or(int);
    let valid = !frac.is_empty()
        && frac.bytes().all(|b| b.is_ascii_digit())
        && digits.bytes().any(|b| b.is_ascii_digit())
        && digits.bytes().all(|b| b.is_ascii_digit() || b == b'.');
    if !valid {
        return None;
    }
    parse_number(&format!("{}.{}", int.replace('.', ""), frac))
}

/// Excel-style address for a 1-based row and 0-based column, e.g. `(5, 2)` → `C5`.
pub fn cell_address(row: u32, col: usize) -> String {
    format!("{}{}", column_letters(col), row)
}

/// 0-based column index to letters (0 → A, 25 → Z, 26 → AA).
pub fn column_letters(col: usize) -> String {
    let mut n = col + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Input tables
// ---------------------------------------------------------------------------

/// Source price list: a header row followed by data rows.
///
/// Headers come from the first row of the sheet's used range and are trimmed.
/// Row cells are aligned with `headers` by position.
#[derive(Debug, Clone, Default)]
pub struct SourceTable {
    /// Display name for messages (usually the file path).
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl SourceTable {
    /// Position of the first header equal to `name`.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

/// Target catalog sheet, addressed in absolute sheet coordinates.
#[derive(Debug, Clone, Default)]
pub struct TargetSheet {
    pub name: String,
    /// Row 1, indexed by 0-based column.
    pub header: Vec<CellValue>,
    /// Rows 2 onwards, in sheet order.
    pub rows: Vec<TargetRow>,
}

#[derive(Debug, Clone, Default)]
pub struct TargetRow {
    /// 1-based sheet row number.
    pub number: u32,
    /// Indexed by 0-based column.
    pub cells: Vec<CellValue>,
}

impl TargetRow {
    pub fn cell(&self, col: usize) -> &CellValue {
        self.cells.get(col).unwrap_or(&EMPTY_CELL)
    }
}

// ---------------------------------------------------------------------------
// Price cells
// ---------------------------------------------------------------------------

/// Target price cell, classified before comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum PriceCell {
    /// No value at all. Compares as 0.
    Missing,
    Number(f64),
    /// Present but not a number (text such as "N/A", error literals, dates).
    Unparsable(String),
}

impl PriceCell {
    pub fn classify(cell: &CellValue) -> Self {
        match cell {
            CellValue::Bool(b) => Self::Number(if *b { 1.0 } else { 0.0 }),
            other if other.is_empty() => Self::Missing,
            other => match other.as_number() {
                Some(n) => Self::Number(n),
                None => Self::Unparsable(other.to_string()),
            },
        }
    }
}

/// Why a price cell is overwritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateReason {
    Differs,
    Missing,
    Unparsable,
}

impl fmt::Display for UpdateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Differs => write!(f, "differs"),
            Self::Missing => write!(f, "missing"),
            Self::Unparsable => write!(f, "unparsable"),
        }
    }
}

// ---------------------------------------------------------------------------
// Columns
// ---------------------------------------------------------------------------

/// How the source price column was chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PriceColumnChoice {
    /// Configured by name.
    Explicit,
    /// Exactly one header matched a price keyword.
    Single,
    /// Several matched; a preferred name won.
    Preferred { candidates: Vec<String> },
    /// Several matched, none preferred; the first was taken.
    FirstOfMany { candidates: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceColumn {
    pub index: usize,
    pub name: String,
    pub choice: PriceColumnChoice,
}

/// Key and price column positions in the target header row (0-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TargetColumns {
    pub key: usize,
    pub price: usize,
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceUpdate {
    /// 1-based sheet row.
    pub row: u32,
    /// 0-based column.
    pub column: usize,
    /// Address such as `C5`.
    pub cell: String,
    pub code: String,
    /// Display text of the cell before the update (empty when missing).
    pub previous: String,
    pub new_price: f64,
    pub reason: UpdateReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanCounts {
    pub rows_scanned: usize,
    pub updated: usize,
    /// Code matched and price already equal.
    pub unchanged: usize,
    /// Code empty or absent from the price map.
    pub not_found: usize,
}

impl PlanCounts {
    /// Rows left untouched for either reason.
    pub fn not_found_or_unchanged(&self) -> usize {
        self.not_found + self.unchanged
    }
}

// Hand-written so reports carry the combined total next to its parts.
impl Serialize for PlanCounts {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("PlanCounts", 5)?;
        s.serialize_field("rows_scanned", &self.rows_scanned)?;
        s.serialize_field("updated", &self.updated)?;
        s.serialize_field("unchanged", &self.unchanged)?;
        s.serialize_field("not_found", &self.not_found)?;
        s.serialize_field("not_found_or_unchanged", &self.not_found_or_unchanged())?;
        s.end()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdatePlan {
    pub updates: Vec<PriceUpdate>,
    pub counts: PlanCounts,
}

impl UpdatePlan {
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceStats {
    pub rows_read: usize,
    pub prices_loaded: usize,
    pub rows_without_code: usize,
    pub rows_without_price: usize,
    /// Codes that appeared more than once; the last row's price was kept.
    pub duplicate_codes: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconMeta {
    pub engine_version: String,
    pub run_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub table: String,
    pub price_column: PriceColumn,
    pub stats: SourceStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct TargetReport {
    pub sheet: String,
    pub key_column: String,
    pub price_column: String,
    pub columns: TargetColumns,
}

/// Full outcome of planning a run: everything except the written file.
#[derive(Debug, Clone, Serialize)]
pub struct Reconciliation {
    pub meta: ReconMeta,
    pub source: SourceReport,
    pub target: TargetReport,
    pub plan: UpdatePlan,
}

/// Reconciliation without the per-row update list.
#[derive(Debug, Clone, Serialize)]
pub struct ReconSummary<'a> {
    pub meta: &'a ReconMeta,
    pub source: &'a SourceReport,
    pub target: &'a TargetReport,
    pub counts: &'a PlanCounts,
}

impl Reconciliation {
    pub fn summary(&self) -> ReconSummary<'_> {
        ReconSummary {
            meta: &self.meta,
            source: &self.source,
            target: &self.target,
            counts: &self.plan.counts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_normalization() {
        assert_eq!(CellValue::Text("  A1 ".into()).as_code(), "A1");
        assert_eq!(CellValue::Number(1001.0).as_code(), "1001");
        assert_eq!(CellValue::Number(12.5).as_code(), "12.5");
        assert_eq!(CellValue::Empty.as_code(), "");
        assert_eq!(CellValue::Bool(true).as_code(), "TRUE");
    }

    #[test]
    fn strict_number_parsing() {
        assert_eq!(CellValue::Text(" 12.50 ".into()).as_number(), Some(12.5));
        assert_eq!(CellValue::Text("1e3".into()).as_number(), Some(1000.0));
        assert_eq!(CellValue::Text("N/A".into()).as_number(), None);
        assert_eq!(CellValue::Text("inf".into()).as_number(), None);
        assert_eq!(CellValue::Text("NaN".into()).as_number(), None);
        assert_eq!(CellValue::Text("".into()).as_number(), None);
        assert_eq!(CellValue::Error("#N/A".into()).as_number(), None);
        assert_eq!(CellValue::Number(f64::NAN).as_number(), None);
    }

    #[test]
    fn decimal_comma_prices() {
        assert_eq!(parse_price("10,5"), Some(10.5));
        assert_eq!(parse_price("1.234,50"), Some(1234.5));
        assert_eq!(parse_price("$ 1.234,50"), Some(1234.5));
        assert_eq!(parse_price("$12.75"), Some(12.75));
        assert_eq!(parse_price("-3,25"), Some(-3.25));
        assert_eq!(parse_price("1,2,3"), None);
        assert_eq!(parse_price("10,"), None);
        assert_eq!(parse_price(",5"), None);
        assert_eq!(parse_price("abc,5"), None);
        assert_eq!(CellValue::Text("10,5".into()).as_number(), Some(10.5));
    }

    #[test]
    fn price_cell_classification() {
        assert_eq!(PriceCell::classify(&CellValue::Empty), PriceCell::Missing);
        assert_eq!(PriceCell::classify(&CellValue::Text("   ".into())), PriceCell::Missing);
        assert_eq!(PriceCell::classify(&CellValue::Number(9.0)), PriceCell::Number(9.0));
        assert_eq!(PriceCell::classify(&CellValue::Text("9".into())), PriceCell::Number(9.0));
        assert_eq!(PriceCell::classify(&CellValue::Bool(true)), PriceCell::Number(1.0));
        assert_eq!(
            PriceCell::classify(&CellValue::Text("N/A".into())),
            PriceCell::Unparsable("N/A".into())
        );
        assert_eq!(
            PriceCell::classify(&CellValue::Error("#REF!".into())),
            PriceCell::Unparsable("#REF!".into())
        );
        assert_eq!(
            PriceCell::classify(&CellValue::DateTime(45000.0)),
            PriceCell::Unparsable("45000".into())
        );
    }

    #[test]
    fn addresses() {
        assert_eq!(column_letters(0), "A");
        assert_eq!(column_letters(25), "Z");
        assert_eq!(column_letters(26), "AA");
        assert_eq!(column_letters(701), "ZZ");
        assert_eq!(column_letters(702), "AAA");
        assert_eq!(cell_address(5, 2), "C5");
    }

    #[test]
    fn target_row_out_of_range_is_empty() {
        let row = TargetRow { number: 2, cells: vec![CellValue::Text("A1".into())] };
        assert_eq!(row.cell(0), &CellValue::Text("A1".into()));
        assert_eq!(row.cell(7), &CellValue::Empty);
    }

    #[test]
    fn price_column_choice_serializes_tagged() {
        let choice = PriceColumnChoice::FirstOfMany { candidates: vec!["Precio A".into(), "Price B".into()] };
        let json = serde_json::to_value(&choice).unwrap();
        assert_eq!(json["kind"], "first_of_many");
        assert_eq!(json["candidates"][1], "Price B");
    }
}
