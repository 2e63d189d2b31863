//! Reconciled history to engineered table: month encoding, rolling and lag
//! columns, and the undefined-value policy.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::config::{
    validate_config, CompositionOrder, ConfigError, PipelineConfig, UndefinedPolicy,
};
use crate::contract::{ContractError, FeatureContract};
use crate::history::{ReconcileAction, ReconciledHistory};
use crate::lags::add_lag_features;
use crate::rolling::add_rolling_features;
use crate::table::{ColumnData, ColumnRole, EngineeredTable};

#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("source column {column} is not present in the history")]
    MissingSourceColumn { column: String },
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),
    #[error(transparent)]
    Contract(#[from] ContractError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndefinedReport {
    pub policy: UndefinedPolicy,
    pub rows_dropped: usize,
    pub cells_filled: usize,
}

/// Year, month label, indicators in history order, then month index and its
/// sine/cosine encoding.
pub fn time_encoded_table(history: &ReconciledHistory, cfg: &PipelineConfig) -> EngineeredTable {
    let mut table = EngineeredTable::new(history.rows.iter().map(|row| row.key()).collect());

    table.push_numeric(
        cfg.year_column.as_str(),
        ColumnRole::Key,
        history.rows.iter().map(|row| Some(row.year as f64)).collect(),
    );
    table.push_text(
        cfg.month_column.as_str(),
        ColumnRole::Key,
        history.rows.iter().map(|row| row.label.clone()).collect(),
    );
    for column in &history.indicator_columns {
        table.push_numeric(
            column.as_str(),
            ColumnRole::Indicator,
            history.rows.iter().map(|row| row.value(column)).collect(),
        );
    }
    table.push_numeric(
        cfg.month_index_column.as_str(),
        ColumnRole::Time,
        history
            .rows
            .iter()
            .map(|row| Some(row.month.index as f64))
            .collect(),
    );
    table.push_numeric(
        cfg.month_sin_column.as_str(),
        ColumnRole::Time,
        history.rows.iter().map(|row| Some(row.month.sin)).collect(),
    );
    table.push_numeric(
        cfg.month_cos_column.as_str(),
        ColumnRole::Time,
        history.rows.iter().map(|row| Some(row.month.cos)).collect(),
    );

    table
}

/// Builds the full engineered table. Undefined cells are left in place; see
/// [`apply_undefined_policy`].
pub fn engineer_features(
    history: &ReconciledHistory,
    cfg: &PipelineConfig,
) -> Result<EngineeredTable, FeatureError> {
    validate_config(cfg)?;

    info!(
        component = "features",
        event = "features.engineer.start",
        row_count = history.len(),
        source_columns = ?cfg.source_columns,
        windows = ?cfg.windows,
        lags = ?cfg.lags,
        composition = ?cfg.composition
    );

    let mut table = time_encoded_table(history, cfg);
    let sources = &cfg.source_columns;

    match cfg.composition {
        CompositionOrder::SourcesOnly => {
            add_rolling_features(&mut table, sources, &cfg.windows)?;
            add_lag_features(&mut table, sources, &cfg.lags)?;
        }
        CompositionOrder::RollThenLag => {
            let rolled = add_rolling_features(&mut table, sources, &cfg.windows)?;
            let lag_inputs: Vec<String> = sources.iter().cloned().chain(rolled).collect();
            add_lag_features(&mut table, &lag_inputs, &cfg.lags)?;
        }
        CompositionOrder::LagThenRoll => {
            let lagged = add_lag_features(&mut table, sources, &cfg.lags)?;
            let roll_inputs: Vec<String> = sources.iter().cloned().chain(lagged).collect();
            add_rolling_features(&mut table, &roll_inputs, &cfg.windows)?;
        }
    }

    info!(
        component = "features",
        event = "features.engineer.finish",
        row_count = table.len(),
        column_count = table.columns().len(),
        undefined_cells = table.missing_cells()
    );

    Ok(table)
}

pub fn apply_undefined_policy(
    table: &mut EngineeredTable,
    policy: UndefinedPolicy,
) -> UndefinedReport {
    let (rows_dropped, cells_filled) = match policy {
        UndefinedPolicy::FillZero => (0, table.fill_missing(0.0)),
        UndefinedPolicy::DropIncomplete => (table.drop_incomplete_rows(), 0),
    };

    info!(
        component = "features",
        event = "features.undefined.resolved",
        policy = ?policy,
        rows_dropped,
        cells_filled,
        remaining_rows = table.len()
    );

    UndefinedReport {
        policy,
        rows_dropped,
        cells_filled,
    }
}

/// Contract a predictor trained on this configuration expects: every numeric
/// engineered column in table order, minus the excluded columns.
pub fn build_feature_contract(
    cfg: &PipelineConfig,
    indicator_columns: &[String],
) -> Result<FeatureContract, FeatureError> {
    let empty = ReconciledHistory {
        indicator_columns: indicator_columns.to_vec(),
        rows: Vec::new(),
        action: ReconcileAction::Inserted,
        observation_position: 0,
    };
    let table = engineer_features(&empty, cfg)?;
    let columns = table
        .columns()
        .iter()
        .filter(|c| matches!(c.data, ColumnData::Numeric(_)))
        .filter(|c| !cfg.is_excluded(&c.name))
        .map(|c| c.name.clone())
        .collect();
    Ok(FeatureContract::new(columns)?)
}
