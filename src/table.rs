//! Column-oriented engineered table and single-row views.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnRole {
    /// Year and month label.
    Key,
    Indicator,
    /// Month index and its cyclical encodings.
    Time,
    Rolling,
    Lag,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnData {
    Numeric(Vec<Option<f64>>),
    Text(Vec<String>),
}

impl ColumnData {
    fn len(&self) -> usize {
        match self {
            Self::Numeric(values) => values.len(),
            Self::Text(values) => values.len(),
        }
    }

    fn retain_by_mask(&mut self, keep: &[bool]) {
        match self {
            Self::Numeric(values) => retain_by_mask(values, keep),
            Self::Text(values) => retain_by_mask(values, keep),
        }
    }

    fn value(&self, row: usize) -> Value {
        match self {
            Self::Numeric(values) => match values[row] {
                Some(v) => Value::Number(v),
                None => Value::Missing,
            },
            Self::Text(values) => Value::Text(values[row].clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub role: ColumnRole,
    pub data: ColumnData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Text(String),
    Missing,
}

impl Value {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            _ => None,
        }
    }
}

/// Reconciled history with derived columns appended, one entry per month.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineeredTable {
    columns: Vec<Column>,
    keys: Vec<(i32, u32)>,
}

impl EngineeredTable {
    /// `keys` holds (year, month index) per row and fixes the row count.
    pub fn new(keys: Vec<(i32, u32)>) -> Self {
        Self {
            columns: Vec::new(),
            keys,
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[(i32, u32)] {
        &self.keys
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column_names_with_role(&self, role: ColumnRole) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.role == role)
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn numeric(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .and_then(|c| match &c.data {
                ColumnData::Numeric(values) => Some(values.as_slice()),
                ColumnData::Text(_) => None,
            })
    }

    pub fn push_numeric(
        &mut self,
        name: impl Into<String>,
        role: ColumnRole,
        values: Vec<Option<f64>>,
    ) {
        self.push(name.into(), role, ColumnData::Numeric(values));
    }

    pub fn push_text(&mut self, name: impl Into<String>, role: ColumnRole, values: Vec<String>) {
        self.push(name.into(), role, ColumnData::Text(values));
    }

    /// Replaces a same-named column in place so column order stays stable.
    fn push(&mut self, name: String, role: ColumnRole, data: ColumnData) {
        debug_assert_eq!(data.len(), self.len());
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(existing) => {
                existing.role = role;
                existing.data = data;
            }
            None => self.columns.push(Column { name, role, data }),
        }
    }

    /// True when no numeric cell of the row is undefined.
    pub fn row_is_complete(&self, row: usize) -> bool {
        self.columns.iter().all(|c| match &c.data {
            ColumnData::Numeric(values) => values[row].is_some(),
            ColumnData::Text(_) => true,
        })
    }

    pub fn missing_cells(&self) -> usize {
        self.columns
            .iter()
            .map(|c| match &c.data {
                ColumnData::Numeric(values) => values.iter().filter(|v| v.is_none()).count(),
                ColumnData::Text(_) => 0,
            })
            .sum()
    }

    /// Sets every undefined numeric cell to `fill`; returns the number filled.
    pub fn fill_missing(&mut self, fill: f64) -> usize {
        let mut filled = 0;
        for column in &mut self.columns {
            if let ColumnData::Numeric(values) = &mut column.data {
                for value in values.iter_mut().filter(|v| v.is_none()) {
                    *value = Some(fill);
                    filled += 1;
                }
            }
        }
        filled
    }

    /// Drops every row with an undefined numeric cell; returns the number dropped.
    pub fn drop_incomplete_rows(&mut self) -> usize {
        let keep: Vec<bool> = (0..self.len()).map(|row| self.row_is_complete(row)).collect();
        let dropped = keep.iter().filter(|k| !**k).count();
        if dropped == 0 {
            return 0;
        }
        for column in &mut self.columns {
            column.data.retain_by_mask(&keep);
        }
        retain_by_mask(&mut self.keys, &keep);
        dropped
    }

    pub fn row(&self, row: usize) -> Option<EngineeredRow> {
        let (year, month) = *self.keys.get(row)?;
        Some(EngineeredRow {
            year,
            month,
            cells: self
                .columns
                .iter()
                .map(|c| (c.name.clone(), c.data.value(row)))
                .collect(),
        })
    }

    pub fn last_row(&self) -> Option<EngineeredRow> {
        self.len().checked_sub(1).and_then(|row| self.row(row))
    }
}

/// One month of the engineered table, cells in table column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineeredRow {
    pub year: i32,
    pub month: u32,
    pub cells: Vec<(String, Value)>,
}

impl EngineeredRow {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.cells
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_number)
    }

    /// Copy of the row without the named columns.
    pub fn without_columns(&self, excluded: &[String]) -> Self {
        Self {
            year: self.year,
            month: self.month,
            cells: self
                .cells
                .iter()
                .filter(|(column, _)| !excluded.iter().any(|e| e == column))
                .cloned()
                .collect(),
        }
    }
}

fn retain_by_mask<T>(values: &mut Vec<T>, keep: &[bool]) {
    let mut idx = 0;
    values.retain(|_| {
        let kept = keep[idx];
        idx += 1;
        kept
    });
}
