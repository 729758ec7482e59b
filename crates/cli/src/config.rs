//! Config lookup, CLI overrides and `pricesync check`.

use std::path::{Path, PathBuf};

use pricesync_recon::config::DEFAULT_CONFIG_FILE;
use pricesync_recon::PriceSyncConfig;
use tracing::debug;

use crate::exit_codes::{EXIT_INPUT_MISSING, EXIT_USAGE};
use crate::{CliError, RunArgs};

/// Where the effective configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOrigin {
    File(PathBuf),
    Defaults,
}

impl std::fmt::Display for ConfigOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigOrigin::File(path) => write!(f, "{}", path.display()),
            ConfigOrigin::Defaults => f.write_str("built-in defaults"),
        }
    }
}

/// `--config` if given, else `./pricesync.toml` if present, else defaults.
///
/// Paths inside a config file are relative to that file's directory.
pub fn load_config(explicit: Option<&Path>) -> Result<(PriceSyncConfig, ConfigOrigin), CliError> {
    let path = match explicit {
        Some(path) if !path.is_file() => {
            return Err(CliError::new(
                EXIT_INPUT_MISSING,
                format!("config file not found: {}", path.display()),
            ));
        }
        Some(path) => Some(path.to_path_buf()),
        None => Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|p| p.is_file()),
    };

    let Some(path) = path else {
        debug!("no config file, using defaults");
        return Ok((PriceSyncConfig::default(), ConfigOrigin::Defaults));
    };

    let text = std::fs::read_to_string(&path)
        .map_err(|e| CliError::new(EXIT_USAGE, format!("cannot read config {}: {e}", path.display())))?;
    let config = PriceSyncConfig::from_toml(&text)
        .map_err(|e| CliError::from(e).with_hint(format!("in {}", path.display())))?;

    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    debug!(config = %path.display(), "config loaded");
    Ok((config.resolve_paths(base_dir), ConfigOrigin::File(path)))
}

/// Apply command-line overrides on top of the loaded config and re-validate.
pub fn apply_overrides(mut config: PriceSyncConfig, args: &RunArgs) -> Result<PriceSyncConfig, CliError> {
    if let Some(ref path) = args.source {
        config.source.file = path.clone();
    }
    if let Some(ref sheet) = args.source_sheet {
        config.source.sheet = Some(sheet.clone());
    }
    if let Some(ref path) = args.target {
        config.target.file = path.clone();
    }
    if let Some(ref sheet) = args.sheet {
        config.target.sheet = sheet.clone();
    }
    if let Some(ref path) = args.output {
        config.output.file = path.clone();
    }
    if let Some(ref column) = args.key_column {
        config.key_column = column.clone();
    }
    if let Some(ref column) = args.price_column {
        config.source.price_column = Some(column.clone());
    }

    config.validate()?;
    Ok(config)
}

pub fn cmd_check(config_path: Option<PathBuf>) -> Result<(), CliError> {
    let (config, origin) = load_config(config_path.as_deref())?;

    eprintln!("valid: {origin}");
    eprintln!("  key column:   {}", config.key_column);
    eprintln!(
        "  source:       {}{}",
        config.source.file.display(),
        config
            .source
            .sheet
            .as_deref()
            .map(|s| format!(" [{s}]"))
            .unwrap_or_default()
    );
    match config.source.price_column {
        Some(ref column) => eprintln!("  source price: {column}"),
        None => eprintln!(
            "  source price: auto ({}; preferred: {})",
            config.source.price_keywords.join(", "),
            config.source.preferred_price_columns.join(", ")
        ),
    }
    eprintln!(
        "  target:       {} [{}] column '{}'",
        config.target.file.display(),
        config.target.sheet,
        config.target.price_column
    );
    eprintln!("  output:       {}", config.output.file.display());

    for (label, path) in [("source", &config.source.file), ("target", &config.target.file)] {
        if !path.is_file() {
            eprintln!("  note: {label} file {} does not exist yet", path.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_paths_resolve_against_config_dir() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pricesync.toml");
        std::fs::write(
            &path,
            r#"
key_column = "Codigo"

[source]
file = "in/lista.csv"

[target]
file = "in/catalogo.xlsx"

[output]
file = "out/catalogo.xlsx"
"#,
        )
        .unwrap();

        let (config, origin) = load_config(Some(path.as_path())).unwrap();
        assert_eq!(origin, ConfigOrigin::File(path.clone()));
        assert_eq!(config.key_column, "Codigo");
        assert_eq!(config.source.file, dir.path().join("in/lista.csv"));
        assert_eq!(config.output.file, dir.path().join("out/catalogo.xlsx"));
        // Untouched sections keep their defaults
        assert_eq!(config.target.sheet, "001");
    }

    #[test]
    fn test_missing_explicit_config() {
        let dir = tempdir().unwrap();
        let err = load_config(Some(dir.path().join("nope.toml").as_path())).unwrap_err();
        assert_eq!(err.code, EXIT_INPUT_MISSING);
    }

    #[test]
    fn test_invalid_config_is_usage_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "key_column = \"\"\n").unwrap();
        let err = load_config(Some(path.as_path())).unwrap_err();
        assert_eq!(err.code, EXIT_USAGE);
        assert!(err.hint.unwrap().contains("bad.toml"));
    }

    #[test]
    fn test_overrides_win_and_are_validated() {
        let args = RunArgs {
            source: Some(PathBuf::from("otra.csv")),
            sheet: Some("002".into()),
            price_column: Some("Precio Lista".into()),
            ..RunArgs::default()
        };
        let config = apply_overrides(PriceSyncConfig::default(), &args).unwrap();
        assert_eq!(config.source.file, PathBuf::from("otra.csv"));
        assert_eq!(config.target.sheet, "002");
        assert_eq!(config.source.price_column.as_deref(), Some("Precio Lista"));

        let clash = RunArgs {
            output: Some(config.target.file.clone()),
            ..RunArgs::default()
        };
        let err = apply_overrides(PriceSyncConfig::default(), &clash).unwrap_err();
        assert_eq!(err.code, EXIT_USAGE);
    }
}
