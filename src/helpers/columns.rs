//! Resolution of single-letter column labels into zero-based offsets.

use serde::{Deserialize, Serialize};

use crate::error::{InvoiceError, Result};

/// Column labels as written in the configuration file.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Columns {
    pub time_start: String,
    pub time_end: String,
    pub invoice: String,
    pub description: String,
    pub issue: String,
}

/// Resolved zero-based offsets for the five timesheet fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnMap {
    pub start: usize,
    pub end: usize,
    pub invoice: usize,
    pub description: usize,
    pub issue: usize,
}

impl Columns {
    /// Resolves every label, failing on the first invalid one.
    pub fn resolve(&self) -> Result<ColumnMap> {
        Ok(ColumnMap {
            start: resolve_column(&self.time_start)?,
            end: resolve_column(&self.time_end)?,
            invoice: resolve_column(&self.invoice)?,
            description: resolve_column(&self.description)?,
            issue: resolve_column(&self.issue)?,
        })
    }
}

/// Maps `A`..`Z` (any case) to `0`..`25`. Only the first character counts.
pub fn resolve_column(label: &str) -> Result<usize> {
    let first = label
        .chars()
        .next()
        .ok_or_else(|| InvoiceError::invalid_column(label, "empty column value"))?
        .to_ascii_uppercase();

    if !first.is_ascii_uppercase() {
        return Err(InvoiceError::invalid_column(label, "character out of range"));
    }
    Ok((first as u8 - b'A') as usize)
}
