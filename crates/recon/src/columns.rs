use tracing::warn;

use crate::config::SourceConfig;
use crate::error::ReconError;
use crate::model::{CellValue, PriceColumn, PriceColumnChoice, TargetColumns};

/// Pick the source price column.
///
/// An explicit `price_column` must exist verbatim. Otherwise every header
/// containing one of `price_keywords` (case-insensitive) is a candidate:
/// one candidate wins outright, several are narrowed by
/// `preferred_price_columns` (exact, in order), else the first one is taken
/// with a warning.
pub fn detect_price_column(
    table: &str,
    headers: &[String],
    config: &SourceConfig,
) -> Result<PriceColumn, ReconError> {
    if let Some(ref name) = config.price_column {
        let index = headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| ReconError::missing_column(table, name.clone()))?;
        return Ok(PriceColumn {
            index,
            name: name.clone(),
            choice: PriceColumnChoice::Explicit,
        });
    }

    let keywords: Vec<String> = config
        .price_keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();

    let candidates: Vec<(usize, &String)> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| {
            let lower = h.to_lowercase();
            keywords.iter().any(|k| lower.contains(k.as_str()))
        })
        .collect();

    match candidates.as_slice() {
        [] => Err(ReconError::NoPriceColumn {
            table: table.into(),
            keywords: keywords.join(", "),
            headers: headers.join(", "),
        }),
        [(index, name)] => Ok(PriceColumn {
            index: *index,
            name: (*name).clone(),
            choice: PriceColumnChoice::Single,
        }),
        many => {
            let names: Vec<String> = many.iter().map(|(_, n)| (*n).clone()).collect();

            for preferred in &config.preferred_price_columns {
                if let Some((index, name)) = many.iter().find(|(_, n)| *n == preferred) {
                    return Ok(PriceColumn {
                        index: *index,
                        name: (*name).clone(),
                        choice: PriceColumnChoice::Preferred { candidates: names },
                    });
                }
            }

            let (index, name) = many[0];
            warn!(
                table,
                candidates = %names.join(", "),
                selected = %name,
                "multiple possible price columns; taking the first"
            );
            Ok(PriceColumn {
                index,
                name: name.clone(),
                choice: PriceColumnChoice::FirstOfMany { candidates: names },
            })
        }
    }
}

/// Locate the key and price columns in the target's header row.
///
/// Header text is trimmed. When a name repeats, the rightmost occurrence wins.
pub fn locate_target_columns(
    sheet: &str,
    header: &[CellValue],
    key_column: &str,
    price_column: &str,
) -> Result<TargetColumns, ReconError> {
    let find = |name: &str| -> Result<usize, ReconError> {
        header
            .iter()
            .rposition(|cell| !cell.is_empty() && cell.as_code() == name)
            .ok_or_else(|| ReconError::missing_column(format!("sheet '{sheet}' row 1"), name))
    };

    Ok(TargetColumns {
        key: find(key_column)?,
        price: find(price_column)?,
    })
}
