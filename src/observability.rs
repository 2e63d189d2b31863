//! Logging setup and the binary's lifecycle events.
//!
//! Logs go to stderr so the prediction report on stdout stays parseable.

use std::env;
use std::io;
use std::path::Path;

use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::contract::FeatureContract;

const LEVEL_VAR: &str = "INFLATION_LOG_LEVEL";
const FORMAT_VAR: &str = "INFLATION_LOG_FORMAT";
const TARGET_VAR: &str = "INFLATION_LOG_TARGET";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            include_target: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoggingInitError {
    #[error("logging already initialized: {0}")]
    AlreadyInitialized(#[from] tracing::subscriber::SetGlobalDefaultError),
}

pub fn logging_config_from_env() -> LoggingConfig {
    logging_config_from_lookup(|key| env::var(key).ok())
}

/// Builds a config from any key lookup. Unset or unparsable entries keep
/// their defaults.
pub fn logging_config_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> LoggingConfig {
    let defaults = LoggingConfig::default();
    LoggingConfig {
        level: lookup(LEVEL_VAR)
            .map(|raw| raw.trim().to_string())
            .filter(|level| !level.is_empty())
            .unwrap_or(defaults.level),
        format: lookup(FORMAT_VAR)
            .and_then(|raw| parse_log_format(&raw))
            .unwrap_or(defaults.format),
        include_target: lookup(TARGET_VAR)
            .and_then(|raw| parse_bool(&raw))
            .unwrap_or(defaults.include_target),
    }
}

/// Boolean environment switch; unset or unrecognized values are `false`.
pub fn env_flag(key: &str) -> bool {
    env::var(key)
        .ok()
        .and_then(|raw| parse_bool(&raw))
        .unwrap_or(false)
}

pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingInitError> {
    let env_filter =
        EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(config.include_target);

    match config.format {
        LogFormat::Json => {
            tracing::subscriber::set_global_default(builder.json().with_ansi(false).finish())?
        }
        LogFormat::Pretty => tracing::subscriber::set_global_default(builder.compact().finish())?,
    }

    Ok(())
}

pub fn log_app_start(config: &LoggingConfig) {
    info!(
        component = "predict_inflation",
        event = "app.start",
        log_level = %config.level,
        log_format = ?config.format,
        include_target = config.include_target
    );
}

pub fn log_inputs_loaded(history_path: &Path, history_rows: usize, contract: &FeatureContract) {
    info!(
        component = "predict_inflation",
        event = "inputs.loaded",
        history_path = %history_path.display(),
        history_rows,
        contract_columns = contract.len(),
        contract_version = contract.version,
        contract_fingerprint = %contract.fingerprint
    );
}

pub fn log_history_persisted(path: Option<&Path>, reason: Option<&str>) {
    match (path, reason) {
        (Some(path), _) => info!(
            component = "predict_inflation",
            event = "history.persisted",
            path = %path.display()
        ),
        (None, Some(reason)) => info!(
            component = "predict_inflation",
            event = "history.persist_skipped",
            reason
        ),
        (None, None) => info!(
            component = "predict_inflation",
            event = "history.persist_skipped"
        ),
    }
}

fn parse_log_format(raw: &str) -> Option<LogFormat> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "json" => Some(LogFormat::Json),
        "pretty" | "text" => Some(LogFormat::Pretty),
        _ => None,
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "ya" => Some(true),
        "0" | "false" | "no" | "off" | "tidak" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn empty_lookup_yields_defaults() {
        assert_eq!(
            logging_config_from_lookup(lookup_from(&[])),
            LoggingConfig::default()
        );
    }

    #[test]
    fn reads_level_format_and_target() {
        let cfg = logging_config_from_lookup(lookup_from(&[
            (LEVEL_VAR, " inflation_pipeline=debug "),
            (FORMAT_VAR, "JSON"),
            (TARGET_VAR, "ya"),
        ]));

        assert_eq!(cfg.level, "inflation_pipeline=debug");
        assert_eq!(cfg.format, LogFormat::Json);
        assert!(cfg.include_target);
    }

    #[test]
    fn unparsable_values_keep_defaults() {
        let cfg = logging_config_from_lookup(lookup_from(&[
            (LEVEL_VAR, "   "),
            (FORMAT_VAR, "yaml"),
            (TARGET_VAR, "maybe"),
        ]));

        assert_eq!(cfg, LoggingConfig::default());
    }

    #[test]
    fn bool_switches_accept_indonesian_words() {
        assert_eq!(parse_bool("Tidak"), Some(false));
        assert_eq!(parse_bool("ON"), Some(true));
        assert_eq!(parse_bool("2"), None);
    }
}
