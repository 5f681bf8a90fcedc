use anyhow::Context;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::helpers::export::{self, MissingSummaryPolicy};
use crate::helpers::format::Format;
use crate::helpers::pdf::DocumentRenderer;
use crate::helpers::sheet::RowSource;
use crate::helpers::tickets::{CachedLookup, TicketLookup};
use crate::models::config::ConfigStore;
use crate::models::timesheet::Timesheet;

/// Runs the whole pipeline: config, rows, timesheet, invoices, documents,
/// then persists the summary cache back into the config.
pub struct InvoiceService {
    pub store: ConfigStore,
    pub source: Box<dyn RowSource>,
    pub lookup: Option<Box<dyn TicketLookup>>,
    pub renderer: Box<dyn DocumentRenderer>,
    pub policy: MissingSummaryPolicy,
    pub output_dir: PathBuf,
    pub timesheet_export: Option<PathBuf>,
}

impl InvoiceService {
    /// Create a service that fails on unknown summaries and writes documents
    /// to the current directory.
    pub fn new(
        store: ConfigStore,
        source: Box<dyn RowSource>,
        renderer: Box<dyn DocumentRenderer>,
    ) -> Self {
        info!("Creating new InvoiceService for {}", store.path().display());
        Self {
            store,
            source,
            lookup: None,
            renderer,
            policy: MissingSummaryPolicy::FailFast,
            output_dir: PathBuf::from("."),
            timesheet_export: None,
        }
    }

    pub fn with_lookup(mut self, lookup: Box<dyn TicketLookup>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    pub fn with_policy(mut self, policy: MissingSummaryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Also write the parsed timesheet to `path`, as JSON for `.json` files
    /// and YAML otherwise.
    pub fn with_timesheet_export(mut self, path: impl Into<PathBuf>) -> Self {
        self.timesheet_export = Some(path.into());
        self
    }

    /// Document path for an invoice ID.
    pub fn document_path(&self, invoice_id: &str) -> PathBuf {
        let safe_id = invoice_id.replace(['/', '\\'], "_");
        self.output_dir.join(format!("invoice-{safe_id}.pdf"))
    }

    /// Process the timesheet: load config, aggregate rows, render one
    /// document per invoice (all of them, or only `invoice_filter`) and save
    /// the config. Returns the rendered paths in invoice ID order.
    pub fn process(&mut self, invoice_filter: Option<&str>) -> anyhow::Result<Vec<PathBuf>> {
        let mut config = self
            .store
            .load()
            .with_context(|| format!("loading config {}", self.store.path().display()))?;

        let rows = self
            .source
            .rows(&config.spreadsheet.range)
            .with_context(|| format!("reading rows for range {}", config.spreadsheet.range))?;

        let timesheet = Timesheet::from_rows(
            config.columns(),
            config.invoice.hourly_rate,
            &rows,
            invoice_filter,
        )
        .context("building timesheet")?;

        if let Some(path) = &self.timesheet_export {
            write_timesheet(&timesheet, path)?;
        }

        let cached = self
            .lookup
            .as_deref()
            .map(|lookup| CachedLookup::with_known(lookup, &config.invoice.issue_summary));
        let invoices = timesheet.invoices(cached.as_ref().map(|c| c as &dyn TicketLookup));
        if invoices.is_empty() {
            warn!("No invoices found in {} rows", rows.len());
        }

        let mut rendered = Vec::with_capacity(invoices.len());
        for invoice in invoices.iter() {
            let document = export::export(invoice, &mut config.invoice, &mut self.policy)
                .with_context(|| format!("exporting invoice {}", invoice.id))?;

            let path = self.document_path(&invoice.id);
            self.renderer.render(&document, &path).with_context(|| {
                format!("rendering invoice {} to {}", invoice.id, path.display())
            })?;
            rendered.push(path);
        }

        self.store.save(&config).context("saving config")?;
        info!("Processed {} invoice(s)", rendered.len());
        Ok(rendered)
    }
}

fn write_timesheet(timesheet: &Timesheet, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    let file = File::create(path)
        .with_context(|| format!("creating timesheet export {}", path.display()))?;
    timesheet
        .write_as(Format::from_path(path), BufWriter::new(file))
        .with_context(|| format!("writing timesheet export {}", path.display()))?;
    info!("Exported timesheet to {}", path.display());
    Ok(())
}
