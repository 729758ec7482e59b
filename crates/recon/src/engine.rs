use tracing::{debug, info};

use crate::columns::{detect_price_column, locate_target_columns};
use crate::config::PriceSyncConfig;
use crate::error::ReconError;
use crate::model::{
    cell_address, PlanCounts, PriceCell, PriceColumn, PriceUpdate, ReconMeta, Reconciliation, SourceReport,
    SourceTable, TargetColumns, TargetReport, TargetSheet, UpdatePlan, UpdateReason,
};
use crate::price_map::PriceMap;

/// Decide whether a price cell must be overwritten with `new_price`.
///
/// Missing cells compare as 0, so a missing cell against a price of 0 is left alone.
pub fn needs_update(current: &PriceCell, new_price: f64) -> Option<UpdateReason> {
    match current {
        PriceCell::Number(n) if *n == new_price => None,
        PriceCell::Number(_) => Some(UpdateReason::Differs),
        PriceCell::Missing if new_price == 0.0 => None,
        PriceCell::Missing => Some(UpdateReason::Missing),
        PriceCell::Unparsable(_) => Some(UpdateReason::Unparsable),
    }
}

/// Scan every data row of `sheet` and plan the price overwrites.
pub fn plan_updates(sheet: &TargetSheet, columns: TargetColumns, prices: &PriceMap) -> UpdatePlan {
    let mut updates = Vec::new();
    let mut counts = PlanCounts::default();

    for row in &sheet.rows {
        counts.rows_scanned += 1;

        let code = row.cell(columns.key).as_code();
        let Some(new_price) = (!code.is_empty()).then(|| prices.get(&code)).flatten() else {
            counts.not_found += 1;
            continue;
        };

        let raw = row.cell(columns.price);
        match needs_update(&PriceCell::classify(raw), new_price) {
            Some(reason) => {
                debug!(row = row.number, code = %code, previous = %raw, new_price, %reason, "price update");
                updates.push(PriceUpdate {
                    row: row.number,
                    column: columns.price,
                    cell: cell_address(row.number, columns.price),
                    code,
                    previous: raw.to_string(),
                    new_price,
                    reason,
                });
                counts.updated += 1;
            }
            None => counts.unchanged += 1,
        }
    }

    UpdatePlan { updates, counts }
}

/// Price map plus the source facts the report needs.
#[derive(Debug, Clone)]
pub struct SourcePrices {
    pub table: String,
    pub price_column: PriceColumn,
    pub prices: PriceMap,
}

/// Check the source columns and build the price map.
///
/// The key column is looked up before price detection, so a list missing
/// both reports the key column.
pub fn load_prices(config: &PriceSyncConfig, source: &SourceTable) -> Result<SourcePrices, ReconError> {
    info!(table = %source.name, columns = ?source.headers, "source headers");

    if source.column(&config.key_column).is_none() {
        return Err(ReconError::missing_column(source.name.clone(), config.key_column.as_str()));
    }

    let price_column = detect_price_column(&source.name, &source.headers, &config.source)?;
    info!(column = %price_column.name, "source price column");

    let prices = PriceMap::build(source, &config.key_column, &price_column)?;
    info!(count = prices.len(), "prices loaded from source");

    Ok(SourcePrices { table: source.name.clone(), price_column, prices })
}

/// Plan the target against an already built price map.
pub fn reconcile_prices(
    config: &PriceSyncConfig,
    source: SourcePrices,
    target: &TargetSheet,
) -> Result<Reconciliation, ReconError> {
    let columns = locate_target_columns(
        &target.name,
        &target.header,
        &config.key_column,
        &config.target.price_column,
    )?;
    info!(
        key = %cell_address(1, columns.key),
        price = %cell_address(1, columns.price),
        "target columns located"
    );

    let plan = plan_updates(target, columns, &source.prices);

    Ok(Reconciliation {
        meta: ReconMeta {
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        source: SourceReport {
            table: source.table,
            price_column: source.price_column,
            stats: source.prices.stats().clone(),
        },
        target: TargetReport {
            sheet: target.name.clone(),
            key_column: config.key_column.clone(),
            price_column: config.target.price_column.clone(),
            columns,
        },
        plan,
    })
}

/// Run the whole reconciliation over pre-loaded tables. No file I/O.
pub fn reconcile(
    config: &PriceSyncConfig,
    source: &SourceTable,
    target: &TargetSheet,
) -> Result<Reconciliation, ReconError> {
    reconcile_prices(config, load_prices(config, source)?, target)
}
