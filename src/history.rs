//! Historical table model and (year, month) upsert reconciliation.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::month::{MonthEncoding, MonthError, MonthId};

/// One submitted month of raw indicator values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub year: i32,
    pub month: MonthId,
    pub indicators: BTreeMap<String, f64>,
}

impl Observation {
    pub fn new(year: i32, month: impl Into<MonthId>) -> Self {
        Self {
            year,
            month: month.into(),
            indicators: BTreeMap::new(),
        }
    }

    pub fn with_indicator(mut self, name: impl Into<String>, value: f64) -> Self {
        self.indicators.insert(name.into(), value);
        self
    }
}

/// A stored month. Indicators absent from the map, or mapped to `None`, are
/// undefined for that month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub year: i32,
    pub month: MonthId,
    pub indicators: BTreeMap<String, Option<f64>>,
}

impl HistoryRecord {
    pub fn value(&self, column: &str) -> Option<f64> {
        self.indicators.get(column).copied().flatten()
    }
}

/// Historical dataset as loaded from the store, in arbitrary order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoricalTable {
    /// Indicator column names in store order.
    pub indicator_columns: Vec<String>,
    pub records: Vec<HistoryRecord>,
}

impl HistoricalTable {
    pub fn new(indicator_columns: Vec<String>, records: Vec<HistoryRecord>) -> Self {
        Self {
            indicator_columns,
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum HistoryError {
    #[error("invalid month in history row {row} (year {year}): {source}")]
    InvalidHistoryMonth {
        row: usize,
        year: i32,
        #[source]
        source: MonthError,
    },
    #[error("invalid observation month: {0}")]
    InvalidObservationMonth(#[from] MonthError),
    #[error("duplicate history rows for year {year} month {month}")]
    DuplicateKey { year: i32, month: u32 },
    #[error("observation value for {column} is not finite: {value}")]
    NonFiniteValue { column: String, value: f64 },
    #[error("{column} is a year or month column and cannot be an indicator")]
    ReservedColumn { column: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconcileAction {
    Inserted,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledRow {
    pub year: i32,
    pub month: MonthEncoding,
    /// Canonical month label.
    pub label: String,
    pub indicators: BTreeMap<String, Option<f64>>,
}

impl ReconciledRow {
    pub fn key(&self) -> (i32, u32) {
        (self.year, self.month.index)
    }

    pub fn value(&self, column: &str) -> Option<f64> {
        self.indicators.get(column).copied().flatten()
    }
}

/// Chronologically sorted, month-encoded history with the observation merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledHistory {
    pub indicator_columns: Vec<String>,
    pub rows: Vec<ReconciledRow>,
    pub action: ReconcileAction,
    /// Position of the submitted observation after sorting.
    pub observation_position: usize,
}

impl ReconciledHistory {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn latest(&self) -> Option<&ReconciledRow> {
        self.rows.last()
    }

    /// Converts back into a store-shaped table, months written as labels.
    pub fn to_table(&self) -> HistoricalTable {
        let records = self
            .rows
            .iter()
            .map(|row| HistoryRecord {
                year: row.year,
                month: MonthId::Label(row.label.clone()),
                indicators: row.indicators.clone(),
            })
            .collect();
        HistoricalTable::new(self.indicator_columns.clone(), records)
    }
}

/// Upserts `observation` into `table` keyed on (year, month index), re-encodes
/// every month and sorts ascending by (year, month index).
pub fn reconcile(
    table: HistoricalTable,
    observation: &Observation,
) -> Result<ReconciledHistory, HistoryError> {
    for (column, value) in &observation.indicators {
        if !value.is_finite() {
            return Err(HistoryError::NonFiniteValue {
                column: column.clone(),
                value: *value,
            });
        }
    }

    let obs_month = observation.month.encode()?;
    let obs_key = (observation.year, obs_month.index);

    let HistoricalTable {
        mut indicator_columns,
        records,
    } = table;

    let mut seen = HashSet::with_capacity(records.len() + 1);
    let mut rows = Vec::with_capacity(records.len() + 1);
    for (idx, record) in records.into_iter().enumerate() {
        let month = record
            .month
            .encode()
            .map_err(|source| HistoryError::InvalidHistoryMonth {
                row: idx,
                year: record.year,
                source,
            })?;
        if !seen.insert((record.year, month.index)) {
            return Err(HistoryError::DuplicateKey {
                year: record.year,
                month: month.index,
            });
        }
        rows.push(ReconciledRow {
            year: record.year,
            month,
            label: record.month.label(),
            indicators: record.indicators,
        });
    }

    for column in observation.indicators.keys() {
        if !indicator_columns.iter().any(|existing| existing == column) {
            debug!(
                component = "history",
                event = "history.reconcile.new_column",
                column = %column
            );
            indicator_columns.push(column.clone());
        }
    }

    let action = match rows.iter_mut().find(|row| row.key() == obs_key) {
        Some(existing) => {
            for (column, value) in &observation.indicators {
                existing.indicators.insert(column.clone(), Some(*value));
            }
            ReconcileAction::Updated
        }
        None => {
            rows.push(ReconciledRow {
                year: observation.year,
                month: obs_month,
                label: observation.month.label(),
                indicators: observation
                    .indicators
                    .iter()
                    .map(|(column, value)| (column.clone(), Some(*value)))
                    .collect(),
            });
            ReconcileAction::Inserted
        }
    };

    // Every row carries every column; absent cells are undefined.
    for row in &mut rows {
        for column in &indicator_columns {
            row.indicators.entry(column.clone()).or_insert(None);
        }
    }

    rows.sort_by_key(|row| row.key());
    let observation_position = rows
        .iter()
        .position(|row| row.key() == obs_key)
        .unwrap_or(rows.len().saturating_sub(1));

    let event = match action {
        ReconcileAction::Inserted => "history.reconcile.inserted",
        ReconcileAction::Updated => "history.reconcile.updated",
    };
    info!(
        component = "history",
        event,
        year = observation.year,
        month = obs_month.index,
        row_count = rows.len(),
        observation_position
    );

    Ok(ReconciledHistory {
        indicator_columns,
        rows,
        action,
        observation_position,
    })
}
