use std::collections::BTreeMap;

use inflation_pipeline::{
    build_feature_contract, engineer_features, reconcile, ColumnRole, CompositionOrder,
    EngineeredTable, HistoricalTable, HistoryRecord, MonthId, Observation, PipelineConfig,
};
use regex::Regex;

const SOURCES: [&str; 2] = ["BI_Rate", "Inflasi_Inti"];

fn cfg(composition: CompositionOrder) -> PipelineConfig {
    PipelineConfig {
        source_columns: SOURCES.map(String::from).to_vec(),
        windows: vec![3, 6],
        lags: vec![1, 3],
        composition,
        ..PipelineConfig::default()
    }
}

/// Monthly series from January 2022 with the given values for both sources.
fn engineered(values: &[f64], cfg: &PipelineConfig) -> EngineeredTable {
    let (last, head) = values.split_last().expect("at least one month");
    let records = head
        .iter()
        .enumerate()
        .map(|(t, v)| {
            let mut indicators = BTreeMap::new();
            indicators.insert("BI_Rate".to_string(), Some(*v));
            indicators.insert("Inflasi_Inti".to_string(), Some(v * 0.5));
            HistoryRecord {
                year: 2022 + (t / 12) as i32,
                month: MonthId::Index((t % 12) as u32 + 1),
                indicators,
            }
        })
        .collect();
    let table = HistoricalTable::new(SOURCES.map(String::from).to_vec(), records);
    let t = head.len();
    let obs = Observation::new(2022 + (t / 12) as i32, (t % 12) as u32 + 1)
        .with_indicator("BI_Rate", *last)
        .with_indicator("Inflasi_Inti", last * 0.5);

    let history = reconcile(table, &obs).expect("reconcile succeeds");
    engineer_features(&history, cfg).expect("engineering succeeds")
}

fn series(len: usize) -> Vec<f64> {
    (0..len).map(|t| 4.0 + (t as f64 * 0.7).sin()).collect()
}

#[test]
fn later_rows_never_change_earlier_features() {
    for composition in [
        CompositionOrder::SourcesOnly,
        CompositionOrder::RollThenLag,
        CompositionOrder::LagThenRoll,
    ] {
        let cfg = cfg(composition);
        let base = series(18);
        let mut perturbed = base.clone();
        for v in perturbed.iter_mut().skip(10) {
            *v += 100.0;
        }

        let a = engineered(&base, &cfg);
        let b = engineered(&perturbed, &cfg);
        assert_eq!(a.column_names(), b.column_names());

        for row in 0..10 {
            assert_eq!(
                a.row(row),
                b.row(row),
                "row {row} changed under {composition:?}"
            );
        }
        assert_ne!(a.row(10), b.row(10));
    }
}

#[test]
fn derived_column_names_follow_naming_scheme() {
    let table = engineered(&series(12), &cfg(CompositionOrder::SourcesOnly));
    let roll = Regex::new(r"^(BI_Rate|Inflasi_Inti)_roll_(mean|std)_(3|6)$").expect("regex");
    let lag = Regex::new(r"^(BI_Rate|Inflasi_Inti)_lag(1|3)$").expect("regex");

    let rolling = table.column_names_with_role(ColumnRole::Rolling);
    let lags = table.column_names_with_role(ColumnRole::Lag);
    assert_eq!(rolling.len(), 8);
    assert_eq!(lags.len(), 4);
    assert!(rolling.iter().all(|name| roll.is_match(name)), "{rolling:?}");
    assert!(lags.iter().all(|name| lag.is_match(name)), "{lags:?}");

    assert_eq!(
        rolling[..4],
        [
            "BI_Rate_roll_mean_3",
            "BI_Rate_roll_std_3",
            "BI_Rate_roll_mean_6",
            "BI_Rate_roll_std_6"
        ]
    );
}

#[test]
fn warmup_rows_are_undefined_until_windows_fill() {
    let table = engineered(&series(8), &cfg(CompositionOrder::SourcesOnly));
    let mean6 = table.numeric("BI_Rate_roll_mean_6").expect("column");
    let lag3 = table.numeric("BI_Rate_lag3").expect("column");

    assert!(mean6[..5].iter().all(Option::is_none));
    assert!(mean6[5..].iter().all(Option::is_some));
    assert!(lag3[..3].iter().all(Option::is_none));
    assert_eq!(lag3[3], table.numeric("BI_Rate").expect("column")[0]);
}

#[test]
fn contract_tracks_composition_order() {
    let indicators = SOURCES.map(String::from);
    let sources = build_feature_contract(&cfg(CompositionOrder::SourcesOnly), &indicators)
        .expect("contract");
    let composed = build_feature_contract(&cfg(CompositionOrder::RollThenLag), &indicators)
        .expect("contract");

    assert!(composed.len() > sources.len());
    assert!(composed.contains("BI_Rate_roll_mean_3_lag1"));
    assert!(!sources.contains("BI_Rate_roll_mean_3_lag1"));
    assert_ne!(sources.fingerprint, composed.fingerprint);
    assert!(!sources.contains("Bulan_Num"));
    assert!(!sources.contains("Bulan"));
}
