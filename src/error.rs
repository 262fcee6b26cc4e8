use std::path::PathBuf;
use thiserror::Error;

use crate::validation::ValidationReport;
use crate::verify::VerificationReport;

/// The main error type for cococonv operations.
#[derive(Debug, Error)]
pub enum CococonvError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse COCO JSON from {path}: {source}")]
    SourceJsonParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Structural problem in a source annotation collection.
    #[error("Malformed source {path}: {message}")]
    MalformedSource { path: PathBuf, message: String },

    /// A class name or index that is not part of the known class list.
    #[error("Unknown class {class}: {message}")]
    UnknownClass { class: String, message: String },

    /// A single emitted record that cannot be read back.
    #[error("Malformed record {path}{}: {message}", line_suffix(.line))]
    MalformedRecord {
        path: PathBuf,
        line: Option<usize>,
        message: String,
    },

    #[error("Failed to write YOLO data.yaml to {path}: {source}")]
    DataYamlWrite {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to write JSON report: {0}")]
    ReportJson(#[source] serde_json::Error),

    #[error("Source check found {error_count} error(s) and {warning_count} warning(s)")]
    CheckFailed {
        error_count: usize,
        warning_count: usize,
        report: ValidationReport,
    },

    #[error("Verification found {discrepancy_count} discrepancy(ies) across {image_count} image(s)")]
    VerificationFailed {
        discrepancy_count: usize,
        image_count: usize,
        report: VerificationReport,
    },
}

fn line_suffix(line: &Option<usize>) -> String {
    line.map(|line| format!(":{line}")).unwrap_or_default()
}
