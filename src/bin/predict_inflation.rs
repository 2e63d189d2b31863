use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{Datelike, Utc};
use inflation_pipeline::{
    env_flag, init_logging, load_feature_contract, load_history_csv, load_pipeline_config,
    log_app_start, log_history_persisted, log_inputs_loaded, logging_config_from_env,
    run_pipeline, save_history_csv, LinearModel, MonthId, Observation, PipelineConfig,
};
use serde::Deserialize;

/// Observation as submitted on the command line; year defaults to the current UTC year.
#[derive(Debug, Deserialize)]
struct ObservationInput {
    year: Option<i32>,
    month: MonthId,
    indicators: BTreeMap<String, f64>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_cfg = logging_config_from_env();
    init_logging(&logging_cfg)?;
    log_app_start(&logging_cfg);

    let cfg = match std::env::var("INFLATION_CONFIG_PATH") {
        Ok(path) => load_pipeline_config(&PathBuf::from(path))?,
        Err(_) => PipelineConfig::default(),
    };
    let history_path = env_path("INFLATION_HISTORY_CSV", "data/data_inflasi.csv");
    let contract_path = env_path("INFLATION_CONTRACT_PATH", "data/features_training.txt");
    let model_path = env_path("INFLATION_MODEL_PATH", "model/model_inflasi.json");

    let observation_raw = match std::env::args().nth(1) {
        Some(arg) => arg,
        None => std::fs::read_to_string(env_path(
            "INFLATION_OBSERVATION_JSON",
            "data/observation.json",
        ))?,
    };
    let input: ObservationInput = serde_json::from_str(&observation_raw)?;
    let observation = Observation {
        year: input.year.unwrap_or_else(|| Utc::now().year()),
        month: input.month,
        indicators: input.indicators,
    };

    let history = load_history_csv(&history_path, &cfg)?;
    let contract = load_feature_contract(&contract_path)?;
    log_inputs_loaded(&history_path, history.len(), &contract);
    let model = LinearModel::load(&model_path)?;

    let outcome = run_pipeline(history, &observation, &contract, &cfg, &model)?;

    if env_flag("INFLATION_PERSIST_HISTORY") {
        save_history_csv(&history_path, &outcome.prepared.history.to_table(), &cfg)?;
        log_history_persisted(Some(&history_path), None);
    } else {
        log_history_persisted(None, Some("INFLATION_PERSIST_HISTORY"));
    }

    let features: BTreeMap<&str, f64> = outcome
        .prepared
        .features
        .columns
        .iter()
        .map(String::as_str)
        .zip(outcome.prepared.features.values.iter().copied())
        .collect();
    let report = serde_json::json!({
        "year": outcome.prepared.latest.year,
        "month": MonthId::Index(outcome.prepared.latest.month).label(),
        "prediction": outcome.prediction,
        "band": inflation_band(outcome.prediction),
        "filled_columns": outcome.prepared.features.filled_columns,
        "features": features,
        "engineered_row": outcome.prepared.latest,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

fn env_path(key: &str, default: &str) -> PathBuf {
    std::env::var(key)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}

fn inflation_band(prediction: f64) -> &'static str {
    if prediction > 5.0 {
        "high"
    } else if prediction > 3.0 {
        "elevated"
    } else {
        "low"
    }
}
