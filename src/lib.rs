//! Star type classification service: a trained classifier behind a JSON/CSV
//! HTTP API and a small form UI.

pub mod classifier;
pub mod config;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod logging;
pub mod models;
pub mod table;
pub mod ui;

pub use classifier::{Classification, Classifier, OnnxClassifier};
pub use gateway::Gateway;
