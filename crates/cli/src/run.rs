//! `pricesync run`: load, plan, patch, report.

use std::path::Path;

use pricesync_io::{CellPatch, IoError, PatchReport};
use pricesync_recon::model::ReconSummary;
use pricesync_recon::Reconciliation;
use serde::Serialize;
use tracing::info;

use crate::config::{apply_overrides, load_config, ConfigOrigin};
use crate::exit_codes::{EXIT_ERROR, EXIT_USAGE, EXIT_WRITE};
use crate::{CliError, RunArgs};

/// Shape of `run --json`.
#[derive(Serialize)]
struct RunOutput<'a> {
    config: String,
    dry_run: bool,
    /// Written workbook, absent on dry runs.
    output: Option<&'a Path>,
    #[serde(flatten)]
    summary: ReconSummary<'a>,
    patch: Option<&'a PatchReport>,
}

pub fn cmd_run(args: RunArgs) -> Result<(), CliError> {
    let (config, origin) = load_config(args.config.as_deref())?;
    let config = apply_overrides(config, &args)?;
    info!(config = %origin, "configuration");

    if pricesync_io::is_same_file(&config.source.file, &config.output.file) {
        return Err(CliError::new(
            EXIT_USAGE,
            format!("output {} is the source price list", config.output.file.display()),
        )
        .with_hint("choose a different --output"));
    }

    let source = pricesync_io::load_source(&config.source.file, config.source.sheet.as_deref())?;
    // Source columns are checked before the target is opened
    let prices = pricesync_recon::load_prices(&config, &source)?;
    let target = pricesync_io::load_target(&config.target.file, &config.target.sheet)?;
    let recon = pricesync_recon::reconcile_prices(&config, prices, &target)?;

    for update in &recon.plan.updates {
        tracing::debug!(
            cell = %update.cell,
            code = %update.code,
            previous = %update.previous,
            new = update.new_price,
            reason = %update.reason,
            "price update"
        );
    }

    let patch = if args.dry_run {
        info!(updates = recon.plan.updates.len(), "dry run, nothing written");
        None
    } else {
        Some(write_output(&recon, &config.target.file, &config.output.file, &config.target.sheet)?)
    };

    if let Some(ref path) = args.report {
        write_json(path, &recon)?;
        eprintln!("wrote {}", path.display());
    }

    if args.json {
        let out = RunOutput {
            config: origin.to_string(),
            dry_run: args.dry_run,
            output: patch.as_ref().map(|_| config.output.file.as_path()),
            summary: recon.summary(),
            patch: patch.as_ref(),
        };
        let json = serde_json::to_string_pretty(&out)
            .map_err(|e| CliError::new(EXIT_ERROR, format!("JSON serialization error: {e}")))?;
        println!("{json}");
    }

    print_summary(&recon, patch.as_ref().map(|p| (config.output.file.as_path(), p)), &origin);
    Ok(())
}

fn write_output(
    recon: &Reconciliation,
    target: &Path,
    output: &Path,
    sheet: &str,
) -> Result<PatchReport, CliError> {
    let patches: Vec<CellPatch> = recon
        .plan
        .updates
        .iter()
        .map(|u| CellPatch { row: u.row, col: u.column, value: u.new_price })
        .collect();

    pricesync_io::patch_workbook(target, output, sheet, &patches).map_err(|e| match e {
        // Reading the target succeeded already, so archive and stream errors here are write failures
        err @ (IoError::Zip(_) | IoError::Io(_) | IoError::Xml(_)) => {
            CliError::new(EXIT_WRITE, format!("cannot write {}: {err}", output.display()))
        }
        other => CliError::from(other),
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::new(EXIT_ERROR, format!("JSON serialization error: {e}")))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| CliError::new(EXIT_WRITE, format!("cannot write {}: {e}", path.display())))?;
    }
    std::fs::write(path, json)
        .map_err(|e| CliError::new(EXIT_WRITE, format!("cannot write {}: {e}", path.display())))
}

/// Human summary to stderr
fn print_summary(recon: &Reconciliation, written: Option<(&Path, &PatchReport)>, origin: &ConfigOrigin) {
    let counts = &recon.plan.counts;
    let stats = &recon.source.stats;

    eprintln!("config: {origin}");
    eprintln!(
        "source: {} prices from {} rows (column '{}'; {} without code, {} without price, {} duplicate codes)",
        stats.prices_loaded,
        stats.rows_read,
        recon.source.price_column.name,
        stats.rows_without_code,
        stats.rows_without_price,
        stats.duplicate_codes,
    );
    eprintln!(
        "target '{}': {} rows, {} updated, {} not found or unchanged ({} unchanged, {} not found)",
        recon.target.sheet,
        counts.rows_scanned,
        counts.updated,
        counts.not_found_or_unchanged(),
        counts.unchanged,
        counts.not_found,
    );

    match written {
        Some((path, report)) => {
            eprintln!("wrote {}", path.display());
            if report.formulas_removed > 0 {
                eprintln!(
                    "note: {} formula(s) replaced by values{}",
                    report.formulas_removed,
                    if report.calc_chain_dropped { "; calculation chain reset" } else { "" }
                );
            }
        }
        None => eprintln!("dry run: no file written"),
    }
}
