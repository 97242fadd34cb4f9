use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ValidationError;

pub const TEMPERATURE: &str = "Temperature (K)";
pub const LUMINOSITY: &str = "Luminosity(L/Lo)";
pub const RADIUS: &str = "Radius(R/Ro)";
pub const ABSOLUTE_MAGNITUDE: &str = "Absolute magnitude(Mv)";

/// Columns every uploaded table must carry, in model feature order.
pub const REQUIRED_COLUMNS: [&str; 4] = [TEMPERATURE, LUMINOSITY, RADIUS, ABSOLUTE_MAGNITUDE];

pub const STATUS_MESSAGE: &str = "The Star Type Classifier API is running!";

/// One star observation as submitted through the single-record endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StarRecord {
    /// Kelvin.
    pub temperature: f64,
    /// L/Lo.
    pub luminosity: f64,
    /// R/Ro.
    pub radius: f64,
    /// Mv, either sign.
    pub absolute_magnitude: f64,
}

impl StarRecord {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let fields = [
            ("temperature", self.temperature),
            ("luminosity", self.luminosity),
            ("radius", self.radius),
            ("absolute_magnitude", self.absolute_magnitude),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(ValidationError::new(format!("{name} must be a finite number")));
            }
        }
        for (name, value) in &fields[..3] {
            if *value < 0.0 {
                return Err(ValidationError::new(format!(
                    "{name} must be non-negative, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Values in `REQUIRED_COLUMNS` order.
    pub fn features(&self) -> [f64; 4] {
        [
            self.temperature,
            self.luminosity,
            self.radius,
            self.absolute_magnitude,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub predicted_type: String,
    pub probabilities: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedPrediction {
    pub index: usize,
    #[serde(flatten)]
    pub result: ClassificationResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub predictions: Vec<IndexedPrediction>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub class_labels: Vec<String>,
    pub required_columns: Vec<&'static str>,
}
