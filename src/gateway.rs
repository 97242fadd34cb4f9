//! Inference gateway: validation, one batched classifier call, response assembly.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{error, info, info_span, warn};
use uuid::Uuid;

use crate::classifier::{Classification, Classifier};
use crate::error::GatewayError;
use crate::models::{ClassificationResult, IndexedPrediction, PredictionResponse, StarRecord};
use crate::table::{StarTable, TableRow};

/// An uploaded table together with its predictions.
#[derive(Debug, Clone)]
pub struct ScoredUpload {
    pub table: StarTable,
    pub response: PredictionResponse,
}

#[derive(Clone)]
pub struct Gateway {
    classifier: Arc<dyn Classifier>,
}

impl Gateway {
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self { classifier }
    }

    pub fn class_labels(&self) -> &[String] {
        self.classifier.class_labels()
    }

    pub fn classify_record(&self, record: &StarRecord) -> Result<ClassificationResult, GatewayError> {
        let span = info_span!("classify_record", request_id = %Uuid::new_v4());
        let _enter = span.enter();

        let outcome = record
            .validate()
            .map_err(GatewayError::from)
            .and_then(|()| self.score(&StarTable::from_record(record)))
            .and_then(|response| {
                response
                    .predictions
                    .into_iter()
                    .next()
                    .map(|p| p.result)
                    .ok_or_else(|| GatewayError::Internal("classifier returned no rows".into()))
            });
        log_outcome(&outcome, 1);
        outcome
    }

    /// Parses an uploaded CSV and scores every row with a single classifier call.
    /// A schema failure scores nothing.
    pub fn classify_upload(&self, bytes: &[u8]) -> Result<PredictionResponse, GatewayError> {
        self.score_upload(bytes).map(|scored| scored.response)
    }

    /// Like [`Gateway::classify_upload`], but also hands back the parsed table.
    pub fn score_upload(&self, bytes: &[u8]) -> Result<ScoredUpload, GatewayError> {
        let span = info_span!("classify_upload", request_id = %Uuid::new_v4(), bytes = bytes.len());
        let _enter = span.enter();

        let table = match StarTable::from_csv(bytes) {
            Ok(table) => table,
            Err(e) => {
                let outcome = Err(GatewayError::from(e));
                log_outcome(&outcome, 0);
                return outcome;
            }
        };
        let outcome = table
            .validate_schema()
            .map_err(GatewayError::from)
            .and_then(|table| self.score(table));
        log_outcome(&outcome, table.len());
        outcome.map(|response| ScoredUpload { table, response })
    }

    fn score(&self, table: &StarTable) -> Result<PredictionResponse, GatewayError> {
        if table.is_empty() {
            return Ok(PredictionResponse {
                predictions: Vec::new(),
            });
        }
        let classification = self.classifier.classify(table)?;
        Ok(assemble(self.classifier.class_labels(), classification, table.rows()))
    }
}

fn log_outcome<T>(outcome: &Result<T, GatewayError>, rows: usize) {
    match outcome {
        Ok(_) => info!(rows, "classified"),
        Err(e) if e.is_user_error() => warn!(rows, error = %e, "rejected request"),
        Err(e) => error!(rows, error = %e, "classification failed"),
    }
}

/// Zips predicted labels and probability rows with the input rows.
///
/// Panics if the classifier's output does not match the input shape; a
/// conforming [`Classifier`] never does that.
pub fn assemble(
    class_labels: &[String],
    classification: Classification,
    rows: &[TableRow],
) -> PredictionResponse {
    let Classification {
        labels,
        probabilities,
    } = classification;
    assert_eq!(labels.len(), rows.len(), "one predicted label per input row");
    assert_eq!(probabilities.len(), rows.len(), "one probability row per input row");

    let predictions = rows
        .iter()
        .zip(labels)
        .zip(probabilities)
        .map(|((row, predicted_type), probs)| {
            assert_eq!(probs.len(), class_labels.len(), "one probability per class");
            let probabilities: BTreeMap<String, f64> =
                class_labels.iter().cloned().zip(probs).collect();
            IndexedPrediction {
                index: row.index,
                result: ClassificationResult {
                    predicted_type,
                    probabilities,
                },
            }
        })
        .collect();

    PredictionResponse { predictions }
}
