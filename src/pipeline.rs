//! Observation-to-prediction chain: reconcile, engineer, assemble, predict.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::assemble::{assemble_features, AssembledFeatures, AssemblyError};
use crate::config::{validate_config, ConfigError, PipelineConfig, UndefinedPolicy};
use crate::contract::FeatureContract;
use crate::features::{apply_undefined_policy, engineer_features, FeatureError, UndefinedReport};
use crate::history::{reconcile, HistoricalTable, HistoryError, Observation, ReconciledHistory};
use crate::inference::{predict_single, InferenceError, Predictor};
use crate::table::{EngineeredRow, EngineeredTable};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error(transparent)]
    Features(#[from] FeatureError),
    #[error("insufficient history: {required} rows required, {actual} available")]
    InsufficientHistory { required: usize, actual: usize },
    #[error("latest month {year}-{month:02} has undefined features and was dropped")]
    LatestRowIncomplete { year: i32, month: u32 },
    #[error(transparent)]
    Assembly(#[from] AssemblyError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
}

/// Everything derived from one observation short of the prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreparedFeatures {
    /// Reconciled history, suitable for writing back to the store.
    pub history: ReconciledHistory,
    pub engineered: EngineeredTable,
    pub undefined: UndefinedReport,
    /// Most recent engineered row, kept for audit and display.
    pub latest: EngineeredRow,
    pub features: AssembledFeatures,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutcome {
    pub prepared: PreparedFeatures,
    pub prediction: f64,
}

pub fn prepare_features(
    history: HistoricalTable,
    observation: &Observation,
    contract: &FeatureContract,
    cfg: &PipelineConfig,
) -> Result<PreparedFeatures, PipelineError> {
    validate_config(cfg)?;
    reject_reserved_indicators(&history, observation, cfg)?;

    let reconciled = reconcile(history, observation)?;

    let required = cfg.required_history();
    if cfg.require_full_history && reconciled.len() < required {
        warn!(
            component = "pipeline",
            event = "pipeline.history.insufficient",
            required,
            actual = reconciled.len()
        );
        return Err(PipelineError::InsufficientHistory {
            required,
            actual: reconciled.len(),
        });
    }

    let mut engineered = engineer_features(&reconciled, cfg)?;
    let undefined = apply_undefined_policy(&mut engineered, cfg.undefined_policy);

    let latest_key = reconciled.latest().map(|row| row.key());
    let latest = match (engineered.last_row(), latest_key) {
        (Some(row), Some(key)) if (row.year, row.month) == key => row,
        (_, Some((year, month))) => {
            debug_assert_eq!(cfg.undefined_policy, UndefinedPolicy::DropIncomplete);
            return Err(PipelineError::LatestRowIncomplete { year, month });
        }
        (_, None) => {
            return Err(PipelineError::InsufficientHistory {
                required,
                actual: 0,
            })
        }
    };

    let features = assemble_features(
        &latest,
        contract,
        cfg.assembly_mode,
        &cfg.excluded_columns,
    )?;

    info!(
        component = "pipeline",
        event = "pipeline.prepared",
        year = latest.year,
        month = latest.month,
        history_rows = reconciled.len(),
        engineered_rows = engineered.len(),
        feature_count = features.values.len(),
        filled_count = features.filled_columns.len()
    );

    Ok(PreparedFeatures {
        history: reconciled,
        engineered,
        undefined,
        latest,
        features,
    })
}

fn reject_reserved_indicators(
    history: &HistoricalTable,
    observation: &Observation,
    cfg: &PipelineConfig,
) -> Result<(), HistoryError> {
    let reserved = cfg.reserved_columns();
    let clash = history
        .indicator_columns
        .iter()
        .chain(observation.indicators.keys())
        .find(|column| reserved.contains(&column.as_str()));
    match clash {
        Some(column) => {
            warn!(
                component = "pipeline",
                event = "pipeline.indicator.reserved",
                column = %column
            );
            Err(HistoryError::ReservedColumn {
                column: column.clone(),
            })
        }
        None => Ok(()),
    }
}

pub fn run_pipeline(
    history: HistoricalTable,
    observation: &Observation,
    contract: &FeatureContract,
    cfg: &PipelineConfig,
    predictor: &dyn Predictor,
) -> Result<PipelineOutcome, PipelineError> {
    let prepared = prepare_features(history, observation, contract, cfg)?;
    let prediction = predict_single(&prepared.features, &cfg.excluded_columns, predictor)?;

    Ok(PipelineOutcome {
        prepared,
        prediction,
    })
}
