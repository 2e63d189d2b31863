//! Feature contract: the ordered column list a trained predictor expects.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const CONTRACT_VERSION: u32 = 1;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContractError {
    #[error("feature contract has no columns")]
    Empty,
    #[error("feature contract lists {column} more than once")]
    DuplicateColumn { column: String },
    #[error("failed to read feature contract {path}: {message}")]
    Read { path: String, message: String },
    #[error("contract version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: u32, actual: u32 },
    #[error("contract fingerprint mismatch: expected {expected}, got {actual}")]
    FingerprintMismatch { expected: String, actual: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureContract {
    pub version: u32,
    pub fingerprint: String,
    pub columns: Vec<String>,
}

impl FeatureContract {
    pub fn new(columns: Vec<String>) -> Result<Self, ContractError> {
        if columns.is_empty() {
            return Err(ContractError::Empty);
        }
        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(ContractError::DuplicateColumn {
                    column: column.clone(),
                });
            }
        }

        Ok(Self {
            version: CONTRACT_VERSION,
            fingerprint: contract_fingerprint(CONTRACT_VERSION, &columns),
            columns,
        })
    }

    /// One column name per line; surrounding whitespace and blank lines are ignored.
    pub fn from_lines(raw: &str) -> Result<Self, ContractError> {
        let columns = raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        Self::new(columns)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
}

pub fn load_feature_contract(path: &Path) -> Result<FeatureContract, ContractError> {
    let raw = fs::read_to_string(path).map_err(|err| ContractError::Read {
        path: path.display().to_string(),
        message: err.to_string(),
    })?;
    FeatureContract::from_lines(&raw)
}

pub fn assert_contract_compatible(
    expected_version: u32,
    expected_fingerprint: &str,
    actual: &FeatureContract,
) -> Result<(), ContractError> {
    if expected_version != actual.version {
        return Err(ContractError::VersionMismatch {
            expected: expected_version,
            actual: actual.version,
        });
    }

    if expected_fingerprint != actual.fingerprint {
        return Err(ContractError::FingerprintMismatch {
            expected: expected_fingerprint.to_string(),
            actual: actual.fingerprint.clone(),
        });
    }

    Ok(())
}

fn contract_fingerprint(version: u32, columns: &[String]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("version:{version};"));
    hasher.update("columns:");
    for column in columns {
        hasher.update(column.as_bytes());
        hasher.update(":f64;");
    }
    hex::encode(hasher.finalize())
}
