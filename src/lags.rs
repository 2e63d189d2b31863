//! Lagged copies of source columns.

use crate::features::FeatureError;
use crate::table::{ColumnRole, EngineeredTable};

pub fn lag_name(column: &str, lag: u32) -> String {
    format!("{column}_lag{lag}")
}

/// Value `lag` rows earlier; the first `lag` rows are undefined.
pub fn lag_series(series: &[Option<f64>], lag: usize) -> Vec<Option<f64>> {
    (0..series.len())
        .map(|idx| idx.checked_sub(lag).and_then(|src| series[src]))
        .collect()
}

/// Appends one column per (column, lag) pair, per column then per lag.
/// Returns the names added.
pub fn add_lag_features(
    table: &mut EngineeredTable,
    columns: &[String],
    lags: &[u32],
) -> Result<Vec<String>, FeatureError> {
    let mut added = Vec::with_capacity(columns.len() * lags.len());
    for column in columns {
        let series = table
            .numeric(column)
            .ok_or_else(|| FeatureError::MissingSourceColumn {
                column: column.clone(),
            })?
            .to_vec();
        for lag in lags {
            let name = lag_name(column, *lag);
            table.push_numeric(
                name.clone(),
                ColumnRole::Lag,
                lag_series(&series, *lag as usize),
            );
            added.push(name);
        }
    }
    Ok(added)
}
