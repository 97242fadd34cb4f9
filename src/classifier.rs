//! Model provider: the classifier seam and its ONNX implementation.

use std::fs;
use std::path::Path;

use tract_onnx::prelude::*;
use tracing::{debug, info};

use crate::error::{InferenceError, ModelUnavailableError};
use crate::models::REQUIRED_COLUMNS;
use crate::table::StarTable;

type OnnxPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Output of one batched classifier call. Row `i` of both vectors belongs to
/// input row `i`; probability columns follow [`Classifier::class_labels`].
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub labels: Vec<String>,
    pub probabilities: Vec<Vec<f64>>,
}

impl Classification {
    /// Picks the most probable class per row; the first class wins a tie.
    pub fn from_probabilities(class_labels: &[String], probabilities: Vec<Vec<f64>>) -> Self {
        let labels = probabilities
            .iter()
            .map(|row| {
                let best = row
                    .iter()
                    .enumerate()
                    .fold(0, |best, (i, p)| if *p > row[best] { i } else { best });
                class_labels[best].clone()
            })
            .collect();
        Self {
            labels,
            probabilities,
        }
    }
}

/// A loaded classifier. Implementations are shared read-only across request
/// threads, so they must tolerate concurrent `classify` calls.
pub trait Classifier: Send + Sync {
    fn class_labels(&self) -> &[String];

    fn classify(&self, table: &StarTable) -> Result<Classification, InferenceError>;
}

/// Reads the four required columns of every row in model feature order.
/// Extra columns are ignored.
pub fn feature_rows(table: &StarTable) -> Result<Vec<[f64; 4]>, InferenceError> {
    let mut positions = [0usize; 4];
    for (slot, column) in positions.iter_mut().zip(REQUIRED_COLUMNS) {
        *slot = table
            .column_index(column)
            .ok_or_else(|| InferenceError::new(format!("missing feature column '{column}'")))?;
    }

    table
        .rows()
        .iter()
        .map(|row| {
            let mut features = [0.0; 4];
            let slots = features.iter_mut().zip(&positions).zip(REQUIRED_COLUMNS);
            for ((value, &pos), column) in slots {
                *value = row
                    .cells
                    .get(pos)
                    .and_then(|cell| cell.as_number())
                    .ok_or_else(|| {
                        InferenceError::new(format!(
                            "row {}: column '{column}' is not numeric",
                            row.index
                        ))
                    })?;
            }
            Ok(features)
        })
        .collect()
}

/// Loads the ordered class-label list stored next to the model.
pub fn load_class_labels(path: &Path) -> Result<Vec<String>, ModelUnavailableError> {
    let raw = fs::read_to_string(path).map_err(|e| ModelUnavailableError::new(path, e))?;
    let labels: Vec<String> =
        serde_json::from_str(&raw).map_err(|e| ModelUnavailableError::new(path, e))?;
    if labels.is_empty() {
        return Err(ModelUnavailableError::new(path, "class label list is empty"));
    }
    Ok(labels)
}

pub struct OnnxClassifier {
    plan: OnnxPlan,
    labels: Vec<String>,
}

impl OnnxClassifier {
    pub fn load(model_path: &Path, labels_path: &Path) -> Result<Self, ModelUnavailableError> {
        let labels = load_class_labels(labels_path)?;

        let plan = tract_onnx::onnx()
            .model_for_path(model_path)
            .map_err(|e| ModelUnavailableError::new(model_path, e))?
            .into_optimized()
            .map_err(|e| ModelUnavailableError::new(model_path, e))?
            .into_runnable()
            .map_err(|e| ModelUnavailableError::new(model_path, e))?;

        info!(
            model = %model_path.display(),
            classes = labels.len(),
            "Loaded ONNX classifier"
        );
        Ok(Self { plan, labels })
    }

    fn probability_matrix(
        &self,
        outputs: &TVec<TValue>,
        rows: usize,
    ) -> Result<Vec<Vec<f64>>, InferenceError> {
        let classes = self.labels.len();
        let tensor = outputs
            .iter()
            .find(|t| {
                t.datum_type() == f32::datum_type() && t.rank() == 2 && t.shape()[1] == classes
            })
            .ok_or_else(|| {
                InferenceError::new(format!("model produced no [rows, {classes}] probability output"))
            })?;
        if tensor.shape()[0] != rows {
            return Err(InferenceError::new(format!(
                "model returned {} probability rows for {rows} inputs",
                tensor.shape()[0]
            )));
        }

        let view = tensor
            .to_array_view::<f32>()
            .map_err(|e| InferenceError::new(e.to_string()))?;
        let flat: Vec<f64> = view.iter().map(|&p| p as f64).collect();
        Ok(flat.chunks(classes).map(<[f64]>::to_vec).collect())
    }
}

impl Classifier for OnnxClassifier {
    fn class_labels(&self) -> &[String] {
        &self.labels
    }

    fn classify(&self, table: &StarTable) -> Result<Classification, InferenceError> {
        let rows = feature_rows(table)?;
        let flat: Vec<f32> = rows.iter().flatten().map(|&v| v as f32).collect();
        let input = tract_ndarray::Array2::from_shape_vec((rows.len(), 4), flat)
            .map_err(|e| InferenceError::new(e.to_string()))?
            .into_tensor();

        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .map_err(|e| InferenceError::new(e.to_string()))?;
        debug!(outputs = outputs.len(), rows = rows.len(), "model run finished");

        let probabilities = self.probability_matrix(&outputs, rows.len())?;
        Ok(Classification::from_probabilities(&self.labels, probabilities))
    }
}
