//! Calendar month resolution and cyclical month encoding.

use std::f64::consts::PI;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Month labels in calendar order; position + 1 is the month index.
pub const MONTH_NAMES: [&str; 12] = [
    "Januari",
    "Februari",
    "Maret",
    "April",
    "Mei",
    "Juni",
    "Juli",
    "Agustus",
    "September",
    "Oktober",
    "November",
    "Desember",
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MonthError {
    #[error("unknown month: {value}")]
    UnknownMonth { value: String },
}

/// A month as submitted: either a label from [`MONTH_NAMES`] or an index 1-12.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MonthId {
    Index(u32),
    Label(String),
}

impl MonthId {
    pub fn index(&self) -> Result<u32, MonthError> {
        match self {
            Self::Index(index) => month_from_index(*index),
            Self::Label(label) => parse_month(label),
        }
    }

    pub fn encode(&self) -> Result<MonthEncoding, MonthError> {
        self.index().map(encode_month_index)
    }

    /// Canonical label for display and persistence. Falls back to the raw
    /// value when it does not resolve.
    pub fn label(&self) -> String {
        match self.index() {
            Ok(index) => MONTH_NAMES[(index - 1) as usize].to_string(),
            Err(_) => self.to_string(),
        }
    }
}

impl fmt::Display for MonthId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "{index}"),
            Self::Label(label) => f.write_str(label),
        }
    }
}

impl From<u32> for MonthId {
    fn from(index: u32) -> Self {
        Self::Index(index)
    }
}

impl From<&str> for MonthId {
    fn from(label: &str) -> Self {
        Self::Label(label.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonthEncoding {
    pub index: u32,
    pub sin: f64,
    pub cos: f64,
}

/// Resolves a month label (case-insensitive) or an integer string 1-12.
pub fn parse_month(input: &str) -> Result<u32, MonthError> {
    let trimmed = input.trim();
    if let Some(pos) = MONTH_NAMES
        .iter()
        .position(|name| name.eq_ignore_ascii_case(trimmed))
    {
        return Ok(pos as u32 + 1);
    }

    match trimmed.parse::<u32>() {
        Ok(index) => month_from_index(index).map_err(|_| MonthError::UnknownMonth {
            value: input.to_string(),
        }),
        Err(_) => Err(MonthError::UnknownMonth {
            value: input.to_string(),
        }),
    }
}

pub fn encode_month(month: &MonthId) -> Result<MonthEncoding, MonthError> {
    month.encode()
}

fn month_from_index(index: u32) -> Result<u32, MonthError> {
    if (1..=12).contains(&index) {
        Ok(index)
    } else {
        Err(MonthError::UnknownMonth {
            value: index.to_string(),
        })
    }
}

fn encode_month_index(index: u32) -> MonthEncoding {
    let angle = 2.0 * PI * (index as f64 / 12.0);
    MonthEncoding {
        index,
        sin: angle.sin(),
        cos: angle.cos(),
    }
}
