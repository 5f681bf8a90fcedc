//! Timesheet entries and the row-by-row aggregation that builds them.

use chrono::{NaiveDateTime, TimeDelta};
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use std::io::Write;
use tracing::{debug, info, warn};

use crate::error::{InvoiceError, Result};
use crate::helpers::columns::ColumnMap;
use crate::helpers::format::Format;
use crate::helpers::rows;
use crate::helpers::tickets::TicketLookup;
use crate::models::cell::CellValue;
use crate::models::invoice::Invoices;

/// Reserved for differential billing, always one for now.
const DEFAULT_MULTIPLIER: Decimal = Decimal::ONE;

/// Serialises a duration as whole seconds.
pub(crate) fn as_seconds<S: Serializer>(
    duration: &TimeDelta,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_i64(duration.num_seconds())
}

/// A single issue + description pair inside a time entry.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TaskItem {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub issue: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Share of the owning entry's duration. Derived, rewritten by
    /// [`TimeEntry::recalculate`].
    #[serde(serialize_with = "as_seconds")]
    pub duration: TimeDelta,
}

impl TaskItem {
    pub fn new(issue: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            issue: issue.into(),
            description: description.into(),
            duration: TimeDelta::zero(),
        }
    }
}

/// One logical timesheet record: a time span and the tasks worked on in it.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TimeEntry {
    pub invoice: String,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub items: Vec<TaskItem>,
    #[serde(serialize_with = "as_seconds")]
    pub duration: TimeDelta,
    pub rate: Decimal,
    pub multiplier: Decimal,
}

impl TimeEntry {
    pub fn new(
        invoice: impl Into<String>,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
        items: Vec<TaskItem>,
    ) -> Self {
        let mut entry = Self {
            invoice: invoice.into(),
            start,
            end,
            items,
            duration: TimeDelta::zero(),
            rate: Decimal::ZERO,
            multiplier: DEFAULT_MULTIPLIER,
        };
        entry.recalculate();
        entry
    }

    /// A continuation row has no start; it may still move the end.
    pub fn is_continuation(&self) -> bool {
        self.start.is_none()
    }

    /// Hourly rate with the multiplier applied.
    pub fn effective_rate(&self) -> Decimal {
        self.rate * self.multiplier
    }

    /// Recomputes the total duration and splits it evenly across the task
    /// items in whole seconds, dropping the remainder.
    pub fn recalculate(&mut self) -> &mut Self {
        if let (Some(start), Some(end)) = (self.start, self.end) {
            self.duration = end - start;
        }
        if self.items.is_empty() {
            return self;
        }

        let share = TimeDelta::seconds(self.duration.num_seconds() / self.items.len() as i64);
        for item in &mut self.items {
            item.duration = share;
        }
        self
    }

    /// Folds a continuation row into this entry.
    fn merge(&mut self, continuation: TimeEntry) {
        if continuation.end.is_some() {
            self.end = continuation.end;
        }
        if !continuation.invoice.is_empty() && continuation.invoice != self.invoice {
            warn!(
                "Different invoices within one entry: {:?} and {:?}, keeping {:?}",
                self.invoice, continuation.invoice, continuation.invoice
            );
            self.invoice = continuation.invoice;
        }
        self.items.extend(continuation.items);
        self.recalculate();
    }
}

/// Ordered timesheet built from spreadsheet rows.
#[derive(Serialize, Debug, Clone, Default)]
pub struct Timesheet {
    entries: Vec<TimeEntry>,
    #[serde(skip)]
    columns: ColumnMap,
    #[serde(skip)]
    rate: Decimal,
}

impl Timesheet {
    pub fn new(columns: ColumnMap, rate: Decimal) -> Self {
        Self {
            entries: Vec::new(),
            columns,
            rate,
        }
    }

    /// Builds a timesheet from raw rows. With `invoice_filter` set, only
    /// entries billed to that invoice are kept. Filtering happens after
    /// continuation rows are merged, since those usually leave the invoice
    /// cell blank.
    pub fn from_rows(
        columns: ColumnMap,
        rate: Decimal,
        sheet_rows: &[Vec<CellValue>],
        invoice_filter: Option<&str>,
    ) -> Result<Self> {
        let mut timesheet = Self::new(columns, rate);

        for row in sheet_rows {
            timesheet.add_row(row)?;
        }
        if let Some(wanted) = invoice_filter {
            timesheet.entries.retain(|entry| entry.invoice == wanted);
        }

        info!(
            "Parsed {} rows into {} timesheet entries",
            sheet_rows.len(),
            timesheet.entries.len()
        );
        Ok(timesheet)
    }

    pub fn entries(&self) -> &[TimeEntry] {
        &self.entries
    }

    /// Adds an entry. Entries with a start open a new record, anything
    /// else is merged into the most recent one.
    pub fn add(&mut self, mut entry: TimeEntry) -> Result<&mut Self> {
        entry.rate = self.rate;
        entry.multiplier = DEFAULT_MULTIPLIER;
        entry.recalculate();

        if !entry.is_continuation() {
            if entry.duration < TimeDelta::zero() {
                warn!(
                    "Entry for invoice {:?} ends before it starts: {:?} > {:?}",
                    entry.invoice, entry.start, entry.end
                );
            }
            self.entries.push(entry);
            return Ok(self);
        }

        let last = self
            .entries
            .last_mut()
            .ok_or(InvoiceError::OrphanedContinuation)?;
        last.merge(entry);
        Ok(self)
    }

    /// Parses a row and adds the result. Rows with every configured cell
    /// blank are ignored.
    pub fn add_row(&mut self, row: &[CellValue]) -> Result<&mut Self> {
        if rows::is_blank(row, &self.columns) {
            debug!("Skipping blank row");
            return Ok(self);
        }
        let entry = rows::parse_row(row, &self.columns);
        self.add(entry)
    }

    /// Groups every entry by invoice ID and computes the invoice totals.
    pub fn invoices(&self, lookup: Option<&dyn TicketLookup>) -> Invoices {
        let mut invoices = Invoices::default();
        for entry in &self.entries {
            invoices.insert(entry.clone());
        }
        invoices.recalculate(lookup);
        invoices
    }

    /// Writes the timesheet in `format`, durations in whole seconds.
    pub fn write_as<W: Write>(&self, format: Format, output: W) -> Result<()> {
        format.write(output, self)
    }

    pub fn write_json<W: Write>(&self, output: W) -> Result<()> {
        self.write_as(Format::Json, output)
    }

    pub fn write_yaml<W: Write>(&self, output: W) -> Result<()> {
        self.write_as(Format::Yaml, output)
    }
}
