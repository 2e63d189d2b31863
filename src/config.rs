//! Pipeline configuration shared by engineering, assembly and inference.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How rolling and lag generation compose. Must match the order the deployed
/// predictor was trained with; the resulting feature sets differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CompositionOrder {
    /// Rolling then lags, both over the source columns only.
    #[default]
    SourcesOnly,
    /// Rolling over sources, then lags over sources and every rolling column.
    RollThenLag,
    /// Lags over sources, then rolling over sources and every lag column.
    LagThenRoll,
}

/// Resolution of cells left undefined by short windows, lags or missing
/// history values. One policy per run, applied to every numeric column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UndefinedPolicy {
    FillZero,
    #[default]
    DropIncomplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AssemblyMode {
    /// Contract columns absent from the row are synthesized as zero.
    #[default]
    Lenient,
    /// Contract columns absent from the row are an error.
    Strict,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub year_column: String,
    pub month_column: String,
    pub month_index_column: String,
    pub month_sin_column: String,
    pub month_cos_column: String,
    pub source_columns: Vec<String>,
    pub windows: Vec<u32>,
    pub lags: Vec<u32>,
    pub composition: CompositionOrder,
    pub undefined_policy: UndefinedPolicy,
    pub assembly_mode: AssemblyMode,
    /// Target and categorical columns never handed to the predictor.
    pub excluded_columns: Vec<String>,
    /// Fail with `InsufficientHistory` before engineering when the table is
    /// shorter than the largest window/lag combination needs.
    pub require_full_history: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            year_column: "Tahun".to_string(),
            month_column: "Bulan".to_string(),
            month_index_column: "Bulan_Num".to_string(),
            month_sin_column: "bulan_sin".to_string(),
            month_cos_column: "bulan_cos".to_string(),
            source_columns: [
                "BI_Rate",
                "BBM",
                "Kurs_USD_IDR",
                "Harga_Beras",
                "Inflasi_Inti",
                "Inflasi_Total",
            ]
            .iter()
            .map(|c| c.to_string())
            .collect(),
            windows: vec![3, 6, 12],
            lags: vec![1, 3, 6, 12],
            composition: CompositionOrder::default(),
            undefined_policy: UndefinedPolicy::default(),
            assembly_mode: AssemblyMode::default(),
            excluded_columns: ["Inflasi_Total", "Bulan", "Bulan_Num"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            require_full_history: true,
        }
    }
}

impl PipelineConfig {
    /// Rows needed before the newest row has every rolling and lag cell defined.
    pub fn required_history(&self) -> usize {
        let window = self.windows.iter().copied().max().unwrap_or(0) as usize;
        let lag = self.lags.iter().copied().max().unwrap_or(0) as usize;

        let required = match self.composition {
            CompositionOrder::SourcesOnly => window.max(lag + 1),
            CompositionOrder::RollThenLag | CompositionOrder::LagThenRoll => {
                if window == 0 {
                    lag + 1
                } else {
                    window + lag
                }
            }
        };
        required.max(1)
    }

    /// Year, month and derived month columns; no indicator may use these names.
    pub fn reserved_columns(&self) -> [&str; 5] {
        [
            self.year_column.as_str(),
            self.month_column.as_str(),
            self.month_index_column.as_str(),
            self.month_sin_column.as_str(),
            self.month_cos_column.as_str(),
        ]
    }

    pub fn is_excluded(&self, column: &str) -> bool {
        self.excluded_columns.iter().any(|c| c == column)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid pipeline config: {0}")]
    Invalid(String),
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

pub fn validate_config(cfg: &PipelineConfig) -> Result<(), ConfigError> {
    if cfg.source_columns.is_empty() {
        return Err(ConfigError::Invalid(
            "source_columns must not be empty".to_string(),
        ));
    }
    let mut seen = HashSet::new();
    for column in &cfg.source_columns {
        if column.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "source_columns entries must be non-empty".to_string(),
            ));
        }
        if !seen.insert(column.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "source_columns entries must be unique (duplicate {column})"
            )));
        }
    }

    // A one-row window has no sample deviation.
    validate_distances("windows", &cfg.windows, 2)?;
    validate_distances("lags", &cfg.lags, 1)?;

    let mut names = HashSet::new();
    for name in cfg.reserved_columns() {
        if !names.insert(name) {
            return Err(ConfigError::Invalid(format!(
                "time column names must be distinct (duplicate {name})"
            )));
        }
    }
    if let Some(column) = cfg
        .source_columns
        .iter()
        .find(|c| names.contains(c.as_str()))
    {
        return Err(ConfigError::Invalid(format!(
            "source column {column} collides with a time column"
        )));
    }

    Ok(())
}

fn validate_distances(field: &str, values: &[u32], min: u32) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for value in values {
        if *value < min {
            return Err(ConfigError::Invalid(format!(
                "{field} entries must be >= {min}"
            )));
        }
        if !seen.insert(*value) {
            return Err(ConfigError::Invalid(format!(
                "{field} entries must be unique"
            )));
        }
    }
    Ok(())
}

pub fn parse_pipeline_config(raw: &str) -> Result<PipelineConfig, ConfigError> {
    let cfg: PipelineConfig = serde_json::from_str(raw)?;
    validate_config(&cfg)?;
    Ok(cfg)
}

pub fn load_pipeline_config(path: &Path) -> Result<PipelineConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse_pipeline_config(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid_and_match_training_setup() {
        let cfg = PipelineConfig::default();
        validate_config(&cfg).expect("defaults validate");
        assert_eq!(cfg.windows, vec![3, 6, 12]);
        assert_eq!(cfg.lags, vec![1, 3, 6, 12]);
        assert_eq!(cfg.composition, CompositionOrder::SourcesOnly);
        assert_eq!(cfg.undefined_policy, UndefinedPolicy::DropIncomplete);
        assert_eq!(cfg.required_history(), 13);
    }

    #[test]
    fn required_history_depends_on_composition() {
        let mut cfg = PipelineConfig::default();
        cfg.composition = CompositionOrder::RollThenLag;
        assert_eq!(cfg.required_history(), 24);

        cfg.windows.clear();
        assert_eq!(cfg.required_history(), 13);

        cfg.lags.clear();
        assert_eq!(cfg.required_history(), 1);
    }

    #[test]
    fn rejects_invalid_distances() {
        let mut cfg = PipelineConfig::default();
        cfg.windows = vec![3, 0];
        assert!(matches!(
            validate_config(&cfg).unwrap_err(),
            ConfigError::Invalid(_)
        ));

        let mut cfg = PipelineConfig::default();
        cfg.windows = vec![1, 3];
        match validate_config(&cfg).unwrap_err() {
            ConfigError::Invalid(message) => assert!(message.contains("windows")),
            other => panic!("unexpected error: {other}"),
        }

        let mut cfg = PipelineConfig::default();
        cfg.lags = vec![1, 1];
        assert!(validate_config(&cfg).is_err());

        let mut cfg = PipelineConfig::default();
        cfg.source_columns.clear();
        assert!(validate_config(&cfg).is_err());

        let mut cfg = PipelineConfig::default();
        cfg.source_columns.push("Bulan_Num".to_string());
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let cfg = parse_pipeline_config(
            r#"{"composition":"LagThenRoll","undefined_policy":"FillZero","lags":[1,2]}"#,
        )
        .expect("config parses");
        assert_eq!(cfg.composition, CompositionOrder::LagThenRoll);
        assert_eq!(cfg.undefined_policy, UndefinedPolicy::FillZero);
        assert_eq!(cfg.lags, vec![1, 2]);
        assert_eq!(cfg.windows, vec![3, 6, 12]);
        assert_eq!(cfg.year_column, "Tahun");
    }

    #[test]
    fn invalid_json_config_is_rejected() {
        assert!(matches!(
            parse_pipeline_config(r#"{"windows":[0]}"#).unwrap_err(),
            ConfigError::Invalid(_)
        ));
        assert!(matches!(
            parse_pipeline_config("not json").unwrap_err(),
            ConfigError::Parse(_)
        ));
    }
}
