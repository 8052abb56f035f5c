// ===============================
// src/lib.rs
// ===============================
pub mod aggregator;
pub mod analytics;
pub mod classifier;
pub mod config;
pub mod domain;
pub mod error;
pub mod ledger_client;
pub mod metrics;
pub mod pipeline;
pub mod workbook;

pub use error::{ErrorKind, ReportError};
pub use pipeline::{generate_report, ReportArtifact};
