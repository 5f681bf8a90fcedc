//! Error model shared by the timesheet, invoice and export operations.

use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, InvoiceError>;

/// Failures raised while loading configuration, aggregating rows or
/// producing invoice documents. Row-level oddities never show up here:
/// malformed cells degrade to empty values instead.
#[derive(Debug, Error)]
pub enum InvoiceError {
    #[error("invalid column {label:?}: {reason}")]
    InvalidColumn { label: String, reason: &'static str },
    #[error("invalid due day {0}, expected 1..=31")]
    InvalidDueDay(u32),
    #[error("missing configuration field: {0}")]
    MissingConfig(&'static str),
    #[error("continuation row without a preceding entry")]
    OrphanedContinuation,
    #[error("no summary available for issue {0:?}")]
    MissingSummary(String),
    #[error("render error: {0}")]
    Render(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl InvoiceError {
    pub(crate) fn invalid_column(label: impl Into<String>, reason: &'static str) -> Self {
        InvoiceError::InvalidColumn {
            label: label.into(),
            reason,
        }
    }
}

impl From<lopdf::Error> for InvoiceError {
    /// Keeps the PDF backend's message, nothing else is recoverable from it.
    fn from(err: lopdf::Error) -> Self {
        InvoiceError::Render(err.to_string())
    }
}
