//! Hands an assembled feature row to an external predictor.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::assemble::AssembledFeatures;

/// Named-column numeric matrix, one inner vector per row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PredictorError {
    #[error("feature count mismatch: expected {expected}, got {actual}")]
    FeatureCountMismatch { expected: usize, actual: usize },
    #[error("feature name mismatch at position {position}: expected {expected}, got {actual}")]
    FeatureNameMismatch {
        position: usize,
        expected: String,
        actual: String,
    },
    #[error("prediction failed: {0}")]
    Failed(String),
}

/// Trained model boundary: one scalar per input row.
pub trait Predictor {
    fn predict(&self, matrix: &FeatureMatrix) -> Result<Vec<f64>, PredictorError>;
}

impl<F> Predictor for F
where
    F: Fn(&FeatureMatrix) -> Result<Vec<f64>, PredictorError>,
{
    fn predict(&self, matrix: &FeatureMatrix) -> Result<Vec<f64>, PredictorError> {
        self(matrix)
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum InferenceError {
    #[error("predictor rejected the feature schema: {0}")]
    IncompatibleSchema(PredictorError),
    #[error("predictor returned no output")]
    EmptyPrediction,
    #[error("predictor failed: {0}")]
    PredictorFailed(String),
    #[error("non-finite feature {column}: {value}")]
    NonFiniteFeature { column: String, value: f64 },
}

/// Predicts from a single assembled row. Excluded columns are stripped again
/// before submission.
pub fn predict_single(
    features: &AssembledFeatures,
    excluded_columns: &[String],
    predictor: &dyn Predictor,
) -> Result<f64, InferenceError> {
    let mut columns = Vec::with_capacity(features.columns.len());
    let mut row = Vec::with_capacity(features.values.len());
    for (column, value) in features.columns.iter().zip(&features.values) {
        if excluded_columns.contains(column) {
            warn!(
                component = "inference",
                event = "inference.strip.excluded",
                column = %column
            );
            continue;
        }
        if !value.is_finite() {
            return Err(InferenceError::NonFiniteFeature {
                column: column.clone(),
                value: *value,
            });
        }
        columns.push(column.clone());
        row.push(*value);
    }

    let matrix = FeatureMatrix {
        columns,
        rows: vec![row],
    };

    let outputs = predictor.predict(&matrix).map_err(|err| match err {
        PredictorError::Failed(message) => InferenceError::PredictorFailed(message),
        schema => {
            warn!(
                component = "inference",
                event = "inference.schema.rejected",
                error = %schema
            );
            InferenceError::IncompatibleSchema(schema)
        }
    })?;

    let prediction = outputs
        .first()
        .copied()
        .ok_or(InferenceError::EmptyPrediction)?;

    info!(
        component = "inference",
        event = "inference.predicted",
        feature_count = matrix.columns.len(),
        prediction
    );

    Ok(prediction)
}

/// Linear model over named features, stored as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub feature_names: Vec<String>,
    pub weights: Vec<f64>,
    pub intercept: f64,
}

#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("failed to read model {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse model: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("model has {names} feature names but {weights} weights")]
    ShapeMismatch { names: usize, weights: usize },
}

impl LinearModel {
    pub fn from_json(raw: &str) -> Result<Self, ModelLoadError> {
        let model: Self = serde_json::from_str(raw)?;
        if model.feature_names.len() != model.weights.len() {
            return Err(ModelLoadError::ShapeMismatch {
                names: model.feature_names.len(),
                weights: model.weights.len(),
            });
        }
        Ok(model)
    }

    pub fn load(path: &Path) -> Result<Self, ModelLoadError> {
        let raw = fs::read_to_string(path).map_err(|source| ModelLoadError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }
}

impl Predictor for LinearModel {
    fn predict(&self, matrix: &FeatureMatrix) -> Result<Vec<f64>, PredictorError> {
        if matrix.columns.len() != self.feature_names.len() {
            return Err(PredictorError::FeatureCountMismatch {
                expected: self.feature_names.len(),
                actual: matrix.columns.len(),
            });
        }
        if let Some((position, (expected, actual))) = self
            .feature_names
            .iter()
            .zip(&matrix.columns)
            .enumerate()
            .find(|(_, (expected, actual))| expected != actual)
        {
            return Err(PredictorError::FeatureNameMismatch {
                position,
                expected: expected.clone(),
                actual: actual.clone(),
            });
        }

        matrix
            .rows
            .iter()
            .map(|row| {
                if row.len() != self.weights.len() {
                    return Err(PredictorError::FeatureCountMismatch {
                        expected: self.weights.len(),
                        actual: row.len(),
                    });
                }
                Ok(self.intercept
                    + row
                        .iter()
                        .zip(&self.weights)
                        .map(|(x, w)| x * w)
                        .sum::<f64>())
            })
            .collect()
    }
}
