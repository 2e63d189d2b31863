//! Reconciles one engineered row against a feature contract.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::AssemblyMode;
use crate::contract::FeatureContract;
use crate::table::{EngineeredRow, Value};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AssemblyError {
    #[error("required feature {column} is missing from the engineered row")]
    MissingRequiredFeature { column: String },
    #[error("feature contract lists excluded column {column}")]
    ExcludedColumnInContract { column: String },
    #[error("feature {column} is not numeric")]
    NonNumericFeature { column: String },
}

/// Numeric feature row in exactly the contract's column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssembledFeatures {
    pub contract_fingerprint: String,
    pub columns: Vec<String>,
    pub values: Vec<f64>,
    /// Contract columns synthesized as zero because the row lacked them.
    pub filled_columns: Vec<String>,
}

impl AssembledFeatures {
    pub fn get(&self, column: &str) -> Option<f64> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|idx| self.values[idx])
    }
}

pub fn assemble_features(
    row: &EngineeredRow,
    contract: &FeatureContract,
    mode: AssemblyMode,
    excluded_columns: &[String],
) -> Result<AssembledFeatures, AssemblyError> {
    if let Some(column) = contract
        .columns
        .iter()
        .find(|c| excluded_columns.contains(c))
    {
        warn!(
            component = "assemble",
            event = "assemble.contract.excluded_column",
            column = %column
        );
        return Err(AssemblyError::ExcludedColumnInContract {
            column: column.clone(),
        });
    }

    // Target and categorical columns go before the contract is consulted.
    let row = row.without_columns(excluded_columns);

    let mut values = Vec::with_capacity(contract.len());
    let mut filled_columns = Vec::new();
    for column in &contract.columns {
        match row.get(column) {
            Some(Value::Number(v)) => values.push(*v),
            Some(Value::Text(_)) => {
                return Err(AssemblyError::NonNumericFeature {
                    column: column.clone(),
                })
            }
            Some(Value::Missing) | None => match mode {
                AssemblyMode::Strict => {
                    warn!(
                        component = "assemble",
                        event = "assemble.strict.missing_feature",
                        column = %column
                    );
                    return Err(AssemblyError::MissingRequiredFeature {
                        column: column.clone(),
                    });
                }
                AssemblyMode::Lenient => {
                    values.push(0.0);
                    filled_columns.push(column.clone());
                }
            },
        }
    }

    if !filled_columns.is_empty() {
        warn!(
            component = "assemble",
            event = "assemble.lenient.filled",
            filled_count = filled_columns.len(),
            filled_columns = ?filled_columns
        );
    }

    let dropped = row
        .cells
        .iter()
        .filter(|(column, _)| !contract.contains(column))
        .count();
    debug!(
        component = "assemble",
        event = "assemble.finish",
        year = row.year,
        month = row.month,
        feature_count = values.len(),
        dropped_columns = dropped
    );

    Ok(AssembledFeatures {
        contract_fingerprint: contract.fingerprint.clone(),
        columns: contract.columns.clone(),
        values,
        filled_columns,
    })
}
