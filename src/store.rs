//! CSV persistence for the historical table.

use std::collections::BTreeMap;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use csv::StringRecord;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::history::{HistoricalTable, HistoryRecord};
use crate::month::MonthId;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("history CSV has no {column} column")]
    MissingColumn { column: String },
    #[error("failed to parse {column} value '{value}' on data row {row}")]
    ParseField {
        row: usize,
        column: String,
        value: String,
    },
    #[error("invalid output path: {0}")]
    InvalidPath(String),
}

/// Reads a history CSV with a header row. Year and month columns are located
/// by name; every other column except derived month columns is an indicator.
/// Empty cells and `NaN` are undefined values; infinities are rejected.
pub fn read_history_csv<R: Read>(
    reader: R,
    cfg: &PipelineConfig,
) -> Result<HistoricalTable, StoreError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = reader.headers()?.clone();

    let year_idx = header_index(&headers, &cfg.year_column)?;
    let month_idx = header_index(&headers, &cfg.month_column)?;
    let derived = [
        cfg.month_index_column.as_str(),
        cfg.month_sin_column.as_str(),
        cfg.month_cos_column.as_str(),
    ];
    let indicators: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(idx, name)| *idx != year_idx && *idx != month_idx && !derived.contains(name))
        .map(|(idx, name)| (idx, name.to_string()))
        .collect();

    let mut records = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let year = parse_year(&record, year_idx, row, &cfg.year_column)?;
        let month = parse_month_cell(record.get(month_idx).unwrap_or_default());
        let mut values = BTreeMap::new();
        for (idx, name) in &indicators {
            let value = parse_optional_f64(&record, *idx, row, name)?;
            values.insert(name.clone(), value);
        }
        records.push(HistoryRecord {
            year,
            month,
            indicators: values,
        });
    }

    debug!(
        component = "store",
        event = "store.history.parsed",
        row_count = records.len(),
        indicator_count = indicators.len()
    );

    Ok(HistoricalTable::new(
        indicators.into_iter().map(|(_, name)| name).collect(),
        records,
    ))
}

pub fn load_history_csv(path: &Path, cfg: &PipelineConfig) -> Result<HistoricalTable, StoreError> {
    let file = fs::File::open(path)?;
    let table = read_history_csv(file, cfg)?;
    info!(
        component = "store",
        event = "store.history.loaded",
        path = %path.display(),
        row_count = table.len()
    );
    Ok(table)
}

/// Writes year, month label and indicator columns in table order.
pub fn write_history_csv<W: Write>(
    writer: W,
    table: &HistoricalTable,
    cfg: &PipelineConfig,
) -> Result<(), StoreError> {
    let mut writer = csv::Writer::from_writer(writer);

    let mut header = vec![cfg.year_column.clone(), cfg.month_column.clone()];
    header.extend(table.indicator_columns.iter().cloned());
    writer.write_record(&header)?;

    for record in &table.records {
        let mut fields = vec![record.year.to_string(), record.month.label()];
        for column in &table.indicator_columns {
            fields.push(match record.value(column) {
                Some(value) => value.to_string(),
                None => String::new(),
            });
        }
        writer.write_record(&fields)?;
    }

    writer.flush()?;
    Ok(())
}

/// Writes through a sibling temp file and renames over `path`.
pub fn save_history_csv(
    path: &Path,
    table: &HistoricalTable,
    cfg: &PipelineConfig,
) -> Result<(), StoreError> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .ok_or_else(|| StoreError::InvalidPath(path.display().to_string()))?;
    let tmp_path = path.with_file_name(format!("{file_name}.tmp"));

    {
        let file = fs::File::create(&tmp_path)?;
        write_history_csv(&file, table, cfg)?;
        file.sync_all()?;
    }

    fs::rename(&tmp_path, path)?;
    info!(
        component = "store",
        event = "store.history.saved",
        path = %path.display(),
        row_count = table.len()
    );
    Ok(())
}

fn header_index(headers: &StringRecord, column: &str) -> Result<usize, StoreError> {
    headers
        .iter()
        .position(|name| name == column)
        .ok_or_else(|| StoreError::MissingColumn {
            column: column.to_string(),
        })
}

fn parse_year(
    record: &StringRecord,
    idx: usize,
    row: usize,
    column: &str,
) -> Result<i32, StoreError> {
    let raw = record.get(idx).unwrap_or_default();
    if let Ok(year) = raw.parse::<i32>() {
        return Ok(year);
    }
    // Exported frames sometimes carry the year as a float ("2024.0").
    match raw.parse::<f64>() {
        Ok(v) if v.fract() == 0.0 && v.abs() <= i32::MAX as f64 => Ok(v as i32),
        _ => Err(StoreError::ParseField {
            row,
            column: column.to_string(),
            value: raw.to_string(),
        }),
    }
}

fn parse_month_cell(raw: &str) -> MonthId {
    match raw.parse::<u32>() {
        Ok(index) => MonthId::Index(index),
        Err(_) => MonthId::Label(raw.to_string()),
    }
}

fn parse_optional_f64(
    record: &StringRecord,
    idx: usize,
    row: usize,
    column: &str,
) -> Result<Option<f64>, StoreError> {
    let raw = record.get(idx).unwrap_or_default();
    if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(Some(value)),
        _ => Err(StoreError::ParseField {
            row,
            column: column.to_string(),
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Tahun,Bulan,BI_Rate,BBM,Bulan_Num
2024,Februari,6.0,10000,2
2024,1, 5.75 ,,1
2023.0,Desember,NaN,9800,12
";

    #[test]
    fn reads_labels_indices_and_undefined_cells() {
        let table = read_history_csv(SAMPLE.as_bytes(), &PipelineConfig::default()).unwrap();
        assert_eq!(table.indicator_columns, vec!["BI_Rate", "BBM"]);
        assert_eq!(table.len(), 3);
        assert_eq!(table.records[0].month, MonthId::Label("Februari".to_string()));
        assert_eq!(table.records[1].month, MonthId::Index(1));
        assert_eq!(table.records[1].value("BI_Rate"), Some(5.75));
        assert_eq!(table.records[1].value("BBM"), None);
        assert_eq!(table.records[2].year, 2023);
        assert_eq!(table.records[2].value("BI_Rate"), None);
    }

    #[test]
    fn missing_key_column_is_reported() {
        let err =
            read_history_csv("Year,Bulan\n2024,Juli\n".as_bytes(), &PipelineConfig::default())
                .unwrap_err();
        assert!(matches!(err, StoreError::MissingColumn { column } if column == "Tahun"));
    }

    #[test]
    fn unparsable_values_name_row_and_column() {
        let err = read_history_csv(
            "Tahun,Bulan,BI_Rate\n2024,Juli,abc\n".as_bytes(),
            &PipelineConfig::default(),
        )
        .unwrap_err();
        match err {
            StoreError::ParseField { row, column, value } => {
                assert_eq!(row, 0);
                assert_eq!(column, "BI_Rate");
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn infinite_values_are_rejected() {
        for raw in ["inf", "-inf", "Infinity"] {
            let csv = format!("Tahun,Bulan,BI_Rate\n2024,Januari,6.0\n2024,Februari,{raw}\n");
            match read_history_csv(csv.as_bytes(), &PipelineConfig::default()).unwrap_err() {
                StoreError::ParseField { row, column, value } => {
                    assert_eq!(row, 1);
                    assert_eq!(column, "BI_Rate");
                    assert_eq!(value, raw);
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn written_csv_reads_back_with_canonical_labels() {
        let cfg = PipelineConfig::default();
        let table = read_history_csv(SAMPLE.as_bytes(), &cfg).unwrap();

        let mut buf = Vec::new();
        write_history_csv(&mut buf, &table, &cfg).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("Tahun,Bulan,BI_Rate,BBM\n"));
        assert!(text.contains("2024,Januari,5.75,\n"));

        let again = read_history_csv(text.as_bytes(), &cfg).unwrap();
        assert_eq!(again.indicator_columns, table.indicator_columns);
        assert_eq!(again.records[1].month, MonthId::Label("Januari".to_string()));
        assert_eq!(again.records[2].value("BBM"), Some(9800.0));
    }
}
