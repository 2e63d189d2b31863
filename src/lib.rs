//! Monthly inflation feature pipeline.
//!
//! Turns one submitted month of macroeconomic indicators plus the stored
//! history into the feature row a trained inflation model expects:
//! - upsert by (year, month) and chronological re-sort
//! - cyclical month encoding
//! - trailing rolling mean/std and lag columns
//! - contract-ordered assembly and hand-off to an external predictor

mod assemble;
mod config;
mod contract;
mod features;
mod history;
mod inference;
mod lags;
mod month;
mod observability;
mod pipeline;
mod rolling;
mod store;
mod table;

pub use assemble::{assemble_features, AssembledFeatures, AssemblyError};
pub use config::{
    load_pipeline_config, parse_pipeline_config, validate_config, AssemblyMode, CompositionOrder,
    ConfigError, PipelineConfig, UndefinedPolicy,
};
pub use contract::{
    assert_contract_compatible, load_feature_contract, ContractError, FeatureContract,
    CONTRACT_VERSION,
};
pub use features::{
    apply_undefined_policy, build_feature_contract, engineer_features, time_encoded_table,
    FeatureError, UndefinedReport,
};
pub use history::{
    reconcile, HistoricalTable, HistoryError, HistoryRecord, Observation, ReconcileAction,
    ReconciledHistory, ReconciledRow,
};
pub use inference::{
    predict_single, FeatureMatrix, InferenceError, LinearModel, ModelLoadError, Predictor,
    PredictorError,
};
pub use lags::{add_lag_features, lag_name, lag_series};
pub use month::{encode_month, parse_month, MonthEncoding, MonthError, MonthId, MONTH_NAMES};
pub use observability::{
    env_flag, init_logging, log_app_start, log_history_persisted, log_inputs_loaded,
    logging_config_from_env, logging_config_from_lookup, LogFormat, LoggingConfig,
    LoggingInitError,
};
pub use pipeline::{
    prepare_features, run_pipeline, PipelineError, PipelineOutcome, PreparedFeatures,
};
pub use rolling::{
    add_rolling_features, rolling_mean, rolling_mean_name, rolling_std, rolling_std_name,
};
pub use store::{
    load_history_csv, read_history_csv, save_history_csv, write_history_csv, StoreError,
};
pub use table::{Column, ColumnData, ColumnRole, EngineeredRow, EngineeredTable, Value};
