#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use star_type_classifier::classifier::feature_rows;
use star_type_classifier::error::InferenceError;
use star_type_classifier::table::StarTable;
use star_type_classifier::{Classification, Classifier, Gateway};

pub const HEADER: &str = "Temperature (K),Luminosity(L/Lo),Radius(R/Ro),Absolute magnitude(Mv)";

pub const CLASSES: [&str; 6] = [
    "Brown Dwarf",
    "Red Dwarf",
    "White Dwarf",
    "Main Sequence",
    "Supergiant",
    "Hypergiant",
];

/// Deterministic stand-in for a trained model that counts its calls.
pub struct FakeClassifier {
    labels: Vec<String>,
    calls: AtomicUsize,
}

impl FakeClassifier {
    pub fn new() -> Self {
        Self {
            labels: CLASSES.iter().map(|c| c.to_string()).collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Classifier for FakeClassifier {
    fn class_labels(&self) -> &[String] {
        &self.labels
    }

    fn classify(&self, table: &StarTable) -> Result<Classification, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let probabilities = feature_rows(table)?
            .iter()
            .map(|[temperature, luminosity, _radius, magnitude]| {
                // Softmax over a score that peaks at a class picked from the features.
                let centre = (temperature.max(1.0).log10() + luminosity.max(1e-6).log10().abs()
                    - magnitude / 10.0)
                    .rem_euclid(self.labels.len() as f64);
                let scores: Vec<f64> = (0..self.labels.len())
                    .map(|j| (-(j as f64 - centre).abs()).exp())
                    .collect();
                let total: f64 = scores.iter().sum();
                scores.into_iter().map(|s| s / total).collect()
            })
            .collect();
        Ok(Classification::from_probabilities(&self.labels, probabilities))
    }
}

pub fn fake_gateway() -> (Gateway, Arc<FakeClassifier>) {
    let fake = Arc::new(FakeClassifier::new());
    (Gateway::new(fake.clone()), fake)
}

pub fn csv(rows: &[&str]) -> String {
    let mut out = format!("{HEADER}\n");
    for row in rows {
        out.push_str(row);
        out.push('\n');
    }
    out
}

pub const BOUNDARY: &str = "star-type-test-boundary";

/// A multipart/form-data body with the CSV in the `file` field.
pub fn multipart(csv: &str) -> (String, Vec<u8>) {
    multipart_with_note("", csv)
}

/// Like [`multipart`], preceded by a plain `note` text field when `note` is
/// not empty.
pub fn multipart_with_note(note: &str, csv: &str) -> (String, Vec<u8>) {
    let mut body = String::new();
    if !note.is_empty() {
        body.push_str(&format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"note\"\r\n\r\n\
             {note}\r\n"
        ));
    }
    body.push_str(&format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"stars.csv\"\r\n\
         Content-Type: text/csv\r\n\r\n\
         {csv}\r\n\
         --{BOUNDARY}--\r\n"
    ));
    (
        format!("multipart/form-data; boundary={BOUNDARY}"),
        body.into_bytes(),
    )
}
