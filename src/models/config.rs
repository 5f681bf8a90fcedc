//! Persisted invoicing configuration and the file-backed store for it.

use chrono::{Datelike, Local, NaiveDate, TimeDelta};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{InvoiceError, Result};
use crate::helpers::columns::{ColumnMap, Columns};
use crate::helpers::format::Format;

/// Postal and contact details printed in the address blocks.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Address {
    pub name: String,
    pub organisation: String,
    pub floor: String,
    pub street: String,
    pub suburb: String,
    pub town: String,
    pub postcode: String,
    pub country: String,
    pub phone: String,
    pub email: String,
}

impl Address {
    /// Non-empty lines of the address, in print order.
    pub fn lines(&self) -> Vec<String> {
        let town = [self.suburb.as_str(), self.town.as_str(), self.postcode.as_str()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", ");

        [
            self.name.clone(),
            self.organisation.clone(),
            self.floor.clone(),
            self.street.clone(),
            town,
            self.country.clone(),
            self.phone.clone(),
            self.email.clone(),
        ]
        .into_iter()
        .filter(|line| !line.is_empty())
        .collect()
    }
}

/// Header fields of the invoice document.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct InvoiceFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_start: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_end: Option<NaiveDate>,
    pub bank: String,
    pub account: String,
    pub address: Address,
    pub bill_to: Address,
    /// Logo path. Kept so existing config files load and save unchanged;
    /// [`PdfRenderer`](crate::helpers::pdf::PdfRenderer) lays out text only.
    pub image: String,
    /// Note printed at the end of the invoice.
    pub remarks: String,
}

/// Billing values: rates, dates and the issue summary cache.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct InvoiceValues {
    pub hourly_rate: Decimal,
    pub tax_rate: Decimal,
    #[serde(default)]
    pub shipping: Decimal,
    /// When set, the invoice dates are derived from the current date and
    /// whatever the file holds is overwritten.
    #[serde(default)]
    pub use_previous_month: bool,
    #[serde(default)]
    pub due_day: u32,
    #[serde(default)]
    pub invoice_fields: InvoiceFields,
    /// Issue ID → summary. Overrides the ticket system and caches answers.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub issue_summary: BTreeMap<String, String>,
}

fn month_start(date: NaiveDate) -> NaiveDate {
    date - TimeDelta::days(date.day0() as i64)
}

impl InvoiceValues {
    /// Sets the invoice date to `today`, the period to the previous calendar
    /// month and the due date to `due_day` of the current month (clamped to
    /// its last day). No-op unless `use_previous_month` is set.
    pub fn adjust_dates(&mut self, today: NaiveDate) -> Result<()> {
        if !self.use_previous_month {
            return Ok(());
        }
        if !(1..=31).contains(&self.due_day) {
            return Err(InvoiceError::InvalidDueDay(self.due_day));
        }

        let this_month = month_start(today);
        let period_end = this_month - TimeDelta::days(1);
        let period_start = month_start(period_end);
        let this_month_end = month_start(this_month + TimeDelta::days(31)) - TimeDelta::days(1);
        let due_day = self.due_day.min(this_month_end.day());

        let fields = &mut self.invoice_fields;
        fields.invoice_date = Some(today);
        fields.period_start = Some(period_start);
        fields.period_end = Some(period_end);
        fields.due_date = Some(this_month + TimeDelta::days(due_day as i64 - 1));
        Ok(())
    }
}

/// Source spreadsheet parameters.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Spreadsheet {
    pub id: String,
    pub range: String,
    pub columns: Columns,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    pub spreadsheet: Spreadsheet,
    pub invoice: InvoiceValues,
    #[serde(skip)]
    column_map: ColumnMap,
}

impl Config {
    pub fn new(spreadsheet: Spreadsheet, invoice: InvoiceValues) -> Self {
        Self {
            spreadsheet,
            invoice,
            column_map: ColumnMap::default(),
        }
    }

    /// Column offsets resolved by [`Config::prepare`].
    pub fn columns(&self) -> ColumnMap {
        self.column_map
    }

    /// Validates required fields, resolves the column labels once and
    /// derives invoice dates. Must run before any aggregation.
    pub fn prepare(&mut self, today: NaiveDate) -> Result<()> {
        if self.spreadsheet.id.is_empty() {
            return Err(InvoiceError::MissingConfig("spreadsheet.id"));
        }
        if self.spreadsheet.range.is_empty() {
            return Err(InvoiceError::MissingConfig("spreadsheet.range"));
        }
        self.column_map = self.spreadsheet.columns.resolve()?;
        self.invoice.adjust_dates(today)
    }
}

/// Loads and saves [`Config`] at a fixed path, as JSON for `.json` files and
/// YAML otherwise.
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads and prepares the config using the local date.
    pub fn load(&self) -> Result<Config> {
        self.load_at(Local::now().date_naive())
    }

    pub fn load_at(&self, today: NaiveDate) -> Result<Config> {
        info!("Loading config from {}", self.path.display());
        let content = fs::read_to_string(&self.path)?;
        let mut config: Config = Format::from_path(&self.path).parse(&content)?;
        config.prepare(today)?;
        Ok(config)
    }

    /// Persists config to disk, creating parent directories when needed.
    pub fn save(&self, config: &Config) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut content = Vec::new();
        Format::from_path(&self.path).write(&mut content, config)?;
        fs::write(&self.path, content)?;
        info!("Saved config to {}", self.path.display());
        Ok(())
    }
}
