use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),
    /// Config validation error (empty column name, output == target, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),
    /// A required header is absent from a table.
    #[error("{table}: missing column '{column}'")]
    MissingColumn { table: String, column: String },
    /// No header in the source looks like a price column.
    #[error("{table}: no price column detected (looked for {keywords}); headers: {headers}")]
    NoPriceColumn {
        table: String,
        keywords: String,
        headers: String,
    },
    /// Source or target sheet not present in the workbook.
    #[error("{file}: sheet '{sheet}' not found (available: {available})")]
    MissingSheet {
        file: String,
        sheet: String,
        available: String,
    },
}

impl ReconError {
    pub fn missing_column(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::MissingColumn {
            table: table.into(),
            column: column.into(),
        }
    }
}
