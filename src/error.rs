//! Error type shared by every stage of report generation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    /// The upload could not be read as a table, or a required column is missing.
    #[error("Invalid input format: {0}")]
    InvalidInputFormat(String),

    /// A row carries a date or amount that cannot be parsed.
    #[error("Invalid record at row {row}: {reason}")]
    InvalidRecord { row: usize, reason: String },

    /// Filters left nothing to aggregate.
    #[error("No sales records match the selected filters")]
    EmptyResult,

    #[error("Chart rendering failed: {0}")]
    Chart(String),

    #[error("Export failed: {0}")]
    Export(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl ReportError {
    pub fn invalid_record(row: usize, reason: impl Into<String>) -> Self {
        ReportError::InvalidRecord {
            row,
            reason: reason.into(),
        }
    }

    /// Stable snake_case name of the error kind, used in API responses.
    pub fn kind(&self) -> &'static str {
        match self {
            ReportError::InvalidInputFormat(_) => "invalid_input_format",
            ReportError::InvalidRecord { .. } => "invalid_record",
            ReportError::EmptyResult => "empty_result",
            ReportError::Chart(_) => "chart",
            ReportError::Export(_) => "export",
            ReportError::Io(_) => "io",
            ReportError::Config(_) => "config",
        }
    }

    /// True for problems with the uploaded data rather than with the service.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            ReportError::InvalidInputFormat(_) | ReportError::InvalidRecord { .. }
        )
    }
}

impl From<csv::Error> for ReportError {
    fn from(err: csv::Error) -> Self {
        match err.position() {
            Some(pos) => ReportError::invalid_record(pos.line() as usize, err.to_string()),
            None => ReportError::InvalidInputFormat(err.to_string()),
        }
    }
}

impl From<calamine::Error> for ReportError {
    fn from(err: calamine::Error) -> Self {
        ReportError::InvalidInputFormat(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ReportError>;
