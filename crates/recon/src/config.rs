use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ReconError;

/// Default config file name looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "pricesync.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PriceSyncConfig {
    /// Header shared by source and target that identifies a product.
    pub key_column: String,
    pub source: SourceConfig,
    pub target: TargetConfig,
    pub output: OutputConfig,
}

impl Default for PriceSyncConfig {
    fn default() -> Self {
        Self {
            key_column: "Cod.Producto".into(),
            source: SourceConfig::default(),
            target: TargetConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    pub file: PathBuf,
    /// Sheet to read. First sheet when unset.
    pub sheet: Option<String>,
    /// Explicit price header. Skips auto-detection when set.
    pub price_column: Option<String>,
    /// Case-insensitive substrings that mark a header as a price candidate.
    pub price_keywords: Vec<String>,
    /// Exact header names that win when several candidates match, in order.
    pub preferred_price_columns: Vec<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("public").join("Lista001.xlsx"),
            sheet: None,
            price_column: None,
            price_keywords: vec!["precio".into(), "price".into()],
            preferred_price_columns: vec!["Precio Venta".into(), "Precio".into()],
        }
    }
}

// ---------------------------------------------------------------------------
// Target + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TargetConfig {
    pub file: PathBuf,
    pub sheet: String,
    /// Header in row 1 of the target sheet whose cells get overwritten.
    pub price_column: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("public").join("ListaDeProductos.xlsx"),
            sheet: "001".into(),
            price_column: "Precio Venta".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub file: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("public").join("ListaDeProductos_Updated.xlsx"),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl PriceSyncConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: PriceSyncConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        let required = [
            ("key_column", self.key_column.as_str()),
            ("target.sheet", self.target.sheet.as_str()),
            ("target.price_column", self.target.price_column.as_str()),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ReconError::ConfigValidation(format!("{field} must not be empty")));
            }
        }

        if let Some(ref col) = self.source.price_column {
            if col.trim().is_empty() {
                return Err(ReconError::ConfigValidation(
                    "source.price_column must not be empty when set".into(),
                ));
            }
        }

        if self.source.price_column.is_none()
            && !self.source.price_keywords.iter().any(|k| !k.trim().is_empty())
        {
            return Err(ReconError::ConfigValidation(
                "source.price_keywords needs at least one keyword when source.price_column is unset"
                    .into(),
            ));
        }

        for (field, path) in [
            ("source.file", &self.source.file),
            ("target.file", &self.target.file),
            ("output.file", &self.output.file),
        ] {
            if path.as_os_str().is_empty() {
                return Err(ReconError::ConfigValidation(format!("{field} must not be empty")));
            }
        }

        if self.target.file == self.output.file {
            return Err(ReconError::ConfigValidation(format!(
                "output.file must differ from target.file ({})",
                self.target.file.display()
            )));
        }
        if self.source.file == self.output.file {
            return Err(ReconError::ConfigValidation(format!(
                "output.file must differ from source.file ({})",
                self.source.file.display()
            )));
        }

        Ok(())
    }

    /// Resolve relative file paths against `base_dir` (the config file's directory).
    pub fn resolve_paths(mut self, base_dir: &Path) -> Self {
        for path in [
            &mut self.source.file,
            &mut self.target.file,
            &mut self.output.file,
        ] {
            if path.is_relative() {
                *path = base_dir.join(&*path);
            }
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
