use thiserror::Error;

/// Errors produced while rendering a report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
