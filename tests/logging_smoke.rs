use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use inflation_pipeline::{
    build_feature_contract, log_app_start, log_history_persisted, log_inputs_loaded,
    prepare_features, HistoricalTable, HistoryRecord, LoggingConfig, MonthId, Observation,
    PipelineConfig,
};
use tracing::dispatcher::with_default;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriter;

#[derive(Clone, Default)]
struct SharedWriter {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedWriter {
    fn output_string(&self) -> String {
        let bytes = self
            .inner
            .lock()
            .expect("writer lock should not be poisoned");
        String::from_utf8_lossy(&bytes).to_string()
    }
}

struct SharedWriterGuard {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl<'a> MakeWriter<'a> for SharedWriter {
    type Writer = SharedWriterGuard;

    fn make_writer(&'a self) -> Self::Writer {
        SharedWriterGuard {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Write for SharedWriterGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut out = self
            .inner
            .lock()
            .expect("writer lock should not be poisoned");
        out.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn capture_logs(max_level: Level, f: impl FnOnce()) -> String {
    let writer = SharedWriter::default();
    let subscriber = tracing_subscriber::fmt()
        .json()
        .with_ansi(false)
        .with_max_level(max_level)
        .with_writer(writer.clone())
        .finish();
    let dispatch = tracing::Dispatch::new(subscriber);

    with_default(&dispatch, f);
    writer.output_string()
}

fn bi_rate_history(months: u32) -> HistoricalTable {
    let records = (0..months)
        .map(|t| HistoryRecord {
            year: 2023 + (t / 12) as i32,
            month: MonthId::Index(t % 12 + 1),
            indicators: [("BI_Rate".to_string(), Some(5.0 + f64::from(t) * 0.1))]
                .into_iter()
                .collect(),
        })
        .collect();
    HistoricalTable::new(vec!["BI_Rate".to_string()], records)
}

fn bi_rate_config() -> PipelineConfig {
    PipelineConfig {
        source_columns: vec!["BI_Rate".to_string()],
        windows: vec![3],
        lags: vec![1],
        ..PipelineConfig::default()
    }
}

#[test]
fn pipeline_emits_stage_events() {
    let cfg = bi_rate_config();
    let contract =
        build_feature_contract(&cfg, &["BI_Rate".to_string()]).expect("contract builds");
    let obs = Observation::new(2023, "Juli").with_indicator("BI_Rate", 6.0);

    let logs = capture_logs(Level::INFO, || {
        prepare_features(bi_rate_history(6), &obs, &contract, &cfg).expect("pipeline succeeds");
    });

    assert!(logs.contains("\"event\":\"history.reconcile.inserted\""));
    assert!(logs.contains("\"event\":\"features.engineer.start\""));
    assert!(logs.contains("\"event\":\"features.engineer.finish\""));
    assert!(logs.contains("\"event\":\"features.undefined.resolved\""));
    assert!(logs.contains("\"event\":\"pipeline.prepared\""));
}

#[test]
fn lenient_assembly_logs_filled_columns() {
    let cfg = bi_rate_config();
    let mut columns = build_feature_contract(&cfg, &["BI_Rate".to_string()])
        .expect("contract builds")
        .columns;
    columns.push("Kurs_USD_IDR_lag1".to_string());
    let contract = inflation_pipeline::FeatureContract::new(columns).expect("contract");
    let obs = Observation::new(2023, "Juli").with_indicator("BI_Rate", 6.0);

    let logs = capture_logs(Level::INFO, || {
        let prepared =
            prepare_features(bi_rate_history(6), &obs, &contract, &cfg).expect("lenient fill");
        assert_eq!(prepared.features.filled_columns, vec!["Kurs_USD_IDR_lag1"]);
    });

    assert!(logs.contains("\"event\":\"assemble.lenient.filled\""));
    assert!(logs.contains("Kurs_USD_IDR_lag1"));
}

#[test]
fn short_history_logs_insufficient_history() {
    let cfg = bi_rate_config();
    let contract =
        build_feature_contract(&cfg, &["BI_Rate".to_string()]).expect("contract builds");
    let obs = Observation::new(2023, "Februari").with_indicator("BI_Rate", 6.0);

    let logs = capture_logs(Level::INFO, || {
        prepare_features(bi_rate_history(1), &obs, &contract, &cfg)
            .expect_err("two months cannot fill a three-month window");
    });

    assert!(logs.contains("\"event\":\"pipeline.history.insufficient\""));
}

#[test]
fn app_lifecycle_helpers_emit_baseline_events() {
    let cfg = bi_rate_config();
    let contract =
        build_feature_contract(&cfg, &["BI_Rate".to_string()]).expect("contract builds");

    let logs = capture_logs(Level::INFO, || {
        log_app_start(&LoggingConfig::default());
        log_inputs_loaded(Path::new("data/data_inflasi.csv"), 24, &contract);
        log_history_persisted(Some(Path::new("data/data_inflasi.csv")), None);
        log_history_persisted(None, Some("INFLATION_PERSIST_HISTORY unset"));
    });

    assert!(logs.contains("\"event\":\"app.start\""));
    assert!(logs.contains("\"event\":\"inputs.loaded\""));
    assert!(logs.contains("\"event\":\"history.persisted\""));
    assert!(logs.contains("\"event\":\"history.persist_skipped\""));
}
