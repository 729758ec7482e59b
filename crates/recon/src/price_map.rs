use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::ReconError;
use crate::model::{CellValue, PriceColumn, SourceStats, SourceTable};

/// Code → price lookup built once from the source table.
#[derive(Debug, Clone, Default)]
pub struct PriceMap {
    prices: HashMap<String, f64>,
    stats: SourceStats,
}

impl PriceMap {
    /// Build from `table`, keyed on `key_column`, priced from `price`.
    ///
    /// Rows with an empty code or a non-numeric price are skipped and counted.
    /// A repeated code keeps the last row's price.
    pub fn build(
        table: &SourceTable,
        key_column: &str,
        price: &PriceColumn,
    ) -> Result<Self, ReconError> {
        let key_idx = table
            .column(key_column)
            .ok_or_else(|| ReconError::missing_column(table.name.clone(), key_column))?;

        let mut map = PriceMap::default();
        let empty = CellValue::Empty;

        for (i, row) in table.rows.iter().enumerate() {
            map.stats.rows_read += 1;
            let code = row.get(key_idx).unwrap_or(&empty).as_code();
            if code.is_empty() {
                map.stats.rows_without_code += 1;
                continue;
            }

            let raw = row.get(price.index).unwrap_or(&empty);
            let Some(value) = raw.as_number() else {
                map.stats.rows_without_price += 1;
                // +2: header row plus 1-based numbering
                debug!(row = i + 2, code = %code, value = %raw, "source price is not a number");
                continue;
            };

            if map.prices.insert(code, value).is_some() {
                map.stats.duplicate_codes += 1;
            }
        }

        map.stats.prices_loaded = map.prices.len();

        if map.stats.rows_without_price > 0 {
            warn!(
                table = %table.name,
                rows = map.stats.rows_without_price,
                column = %price.name,
                "source rows skipped: price is empty or not a number"
            );
        }
        if map.stats.duplicate_codes > 0 {
            warn!(
                table = %table.name,
                duplicates = map.stats.duplicate_codes,
                "repeated codes in source; the last price for each code is used"
            );
        }

        Ok(map)
    }

    pub fn get(&self, code: &str) -> Option<f64> {
        self.prices.get(code).copied()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn stats(&self) -> &SourceStats {
        &self.stats
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for PriceMap {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        let prices: HashMap<String, f64> = iter.into_iter().map(|(k, v)| (k.into(), v)).collect();
        let stats = SourceStats {
            prices_loaded: prices.len(),
            ..SourceStats::default()
        };
        PriceMap { prices, stats }
    }
}
