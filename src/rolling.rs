//! Trailing rolling-window statistics.

use crate::features::FeatureError;
use crate::table::{ColumnRole, EngineeredTable};

pub fn rolling_mean_name(column: &str, window: u32) -> String {
    format!("{column}_roll_mean_{window}")
}

pub fn rolling_std_name(column: &str, window: u32) -> String {
    format!("{column}_roll_std_{window}")
}

/// Mean over rows `i-w+1..=i`. Undefined until `w` rows exist or when any
/// value in the window is undefined.
pub fn rolling_mean(series: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling_apply(series, window, |values| {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    })
}

/// Sample standard deviation (n - 1 denominator) over rows `i-w+1..=i`.
/// A single-row window has no sample deviation and stays undefined.
pub fn rolling_std(series: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling_apply(series, window, |values| {
        if values.len() < 2 {
            return None;
        }
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let variance = values
            .iter()
            .map(|v| {
                let d = *v - mean;
                d * d
            })
            .sum::<f64>()
            / (values.len() - 1) as f64;
        Some(variance.sqrt())
    })
}

fn rolling_apply(
    series: &[Option<f64>],
    window: usize,
    stat: impl Fn(&[f64]) -> Option<f64>,
) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(series.len());
    let mut buf = Vec::with_capacity(window);
    for end in 0..series.len() {
        if window == 0 || end + 1 < window {
            out.push(None);
            continue;
        }
        buf.clear();
        let complete = series[end + 1 - window..=end].iter().all(|v| match v {
            Some(v) => {
                buf.push(*v);
                true
            }
            None => false,
        });
        out.push(if complete { stat(&buf) } else { None });
    }
    out
}

/// Appends mean and std columns for every (column, window) pair, per column
/// then per window, mean before std. Returns the names added.
pub fn add_rolling_features(
    table: &mut EngineeredTable,
    columns: &[String],
    windows: &[u32],
) -> Result<Vec<String>, FeatureError> {
    let mut added = Vec::with_capacity(columns.len() * windows.len() * 2);
    for column in columns {
        let series = table
            .numeric(column)
            .ok_or_else(|| FeatureError::MissingSourceColumn {
                column: column.clone(),
            })?
            .to_vec();
        for window in windows {
            let mean_name = rolling_mean_name(column, *window);
            let std_name = rolling_std_name(column, *window);
            table.push_numeric(
                mean_name.clone(),
                ColumnRole::Rolling,
                rolling_mean(&series, *window as usize),
            );
            table.push_numeric(
                std_name.clone(),
                ColumnRole::Rolling,
                rolling_std(&series, *window as usize),
            );
            added.push(mean_name);
            added.push(std_name);
        }
    }
    Ok(added)
}
