//! Sheet Invoicer Library
//!
//! This library turns timesheet rows exported from a spreadsheet into
//! per-invoice totals and renders each invoice as a PDF document.

pub mod error;
pub mod helpers;
pub mod models;
pub mod service;

pub use error::{InvoiceError, Result};
pub use service::InvoiceService;

// Re-export key types for convenience
pub use helpers::export::{InvoiceDocument, MissingSummaryPolicy};
pub use helpers::format::Format;
pub use helpers::pdf::{DocumentRenderer, PdfRenderer};
pub use helpers::sheet::{JsonRowSource, RowSource};
pub use helpers::tickets::{CachedLookup, StaticLookup, TicketError, TicketLookup};
pub use models::cell::{CellValue, Row};
pub use models::config::{Config, ConfigStore};
pub use models::invoice::{Invoice, InvoiceLineEntry, Invoices};
pub use models::timesheet::{TaskItem, TimeEntry, Timesheet};
