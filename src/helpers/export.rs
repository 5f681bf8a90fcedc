//! Turns a computed invoice into the field set a document renderer needs.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use tracing::{debug, info};

use crate::error::{InvoiceError, Result};
use crate::models::config::{InvoiceFields, InvoiceValues};
use crate::models::invoice::{Invoice, InvoiceLineEntry};

/// Asks a person for an issue summary.
pub trait SummaryPrompt {
    fn ask(&mut self, issue: &str) -> io::Result<String>;
}

/// Prompts on stdout and reads one line from stdin.
pub struct StdinPrompt;

impl SummaryPrompt for StdinPrompt {
    fn ask(&mut self, issue: &str) -> io::Result<String> {
        let mut stdout = io::stdout();
        write!(stdout, "Enter summary for issue {issue:?}: ")?;
        stdout.flush()?;

        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        Ok(answer.trim_end_matches(['\r', '\n']).to_string())
    }
}

/// What to do when neither the summary cache nor the ticket system knows
/// an issue.
pub enum MissingSummaryPolicy {
    FailFast,
    Placeholder(String),
    Prompt(Box<dyn SummaryPrompt>),
}

/// One table row: description, quantity in hours, unit price, line total.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct EntryRow {
    pub description: String,
    pub quantity: String,
    pub unit_price: String,
    pub total: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct AmountRow {
    pub label: String,
    pub amount: String,
}

impl AmountRow {
    fn new(label: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            amount: amount.into(),
        }
    }
}

/// Exact figures behind the formatted total rows.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Totals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub shipping: Decimal,
    /// Subtotal plus tax. Shipping is shown but not added.
    pub balance_due: Decimal,
}

/// Everything a renderer lays out for one invoice.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct InvoiceDocument {
    pub invoice_id: String,
    pub entries: Vec<EntryRow>,
    pub subtotals: Vec<AmountRow>,
    pub total: AmountRow,
    pub account: Vec<(String, String)>,
    pub fields: InvoiceFields,
    pub totals: Totals,
}

/// Two decimal places, banker's rounding.
pub fn fixed2(value: Decimal) -> String {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven);
    rounded.rescale(2);
    rounded.to_string()
}

/// Builds the document for `invoice`. Summaries found on the lines or
/// supplied by `policy` are written back into `values.issue_summary`.
pub fn export(
    invoice: &Invoice,
    values: &mut InvoiceValues,
    policy: &mut MissingSummaryPolicy,
) -> Result<InvoiceDocument> {
    let mut entries = Vec::with_capacity(invoice.lines.len());
    // lines are keyed by issue ID, so this is ascending lexical order
    for line in invoice.lines.values() {
        let summary = summary_for(line, &mut values.issue_summary, policy)?;
        entries.push(EntryRow {
            description: format!("{}: {}", line.issue, summary),
            quantity: fixed2(line.hours()),
            unit_price: fixed2(line.rate),
            total: fixed2(line.total),
        });
    }

    let subtotal = invoice.total;
    let tax = subtotal * values.tax_rate;
    let totals = Totals {
        subtotal,
        tax,
        shipping: values.shipping,
        balance_due: subtotal + tax,
    };

    let tax_percent = (values.tax_rate * Decimal::ONE_HUNDRED).normalize();
    let subtotals = vec![
        AmountRow::new("SUBTOTAL", fixed2(totals.subtotal)),
        AmountRow::new(format!("TAX ({tax_percent}%)"), fixed2(totals.tax)),
        AmountRow::new("SHIPPING", fixed2(totals.shipping)),
    ];
    let total = AmountRow::new("BALANCE DUE", format!("$ {}", fixed2(totals.balance_due)));

    let fields = values.invoice_fields.clone();
    let account = vec![
        ("Bank".to_string(), fields.bank.clone()),
        ("Account No.".to_string(), fields.account.clone()),
    ];

    info!(
        "Exported invoice {} with {} entries, balance due {}",
        invoice.id,
        entries.len(),
        total.amount
    );
    Ok(InvoiceDocument {
        invoice_id: invoice.id.clone(),
        entries,
        subtotals,
        total,
        account,
        fields,
        totals,
    })
}

/// Cache first, then the looked-up summary, then the policy.
fn summary_for(
    line: &InvoiceLineEntry,
    cache: &mut BTreeMap<String, String>,
    policy: &mut MissingSummaryPolicy,
) -> Result<String> {
    if let Some(cached) = cache.get(&line.issue).filter(|s| !s.is_empty()) {
        return Ok(cached.clone());
    }

    let summary = match line.summary.as_deref().filter(|s| !s.is_empty()) {
        Some(found) => found.to_string(),
        None => match policy {
            MissingSummaryPolicy::FailFast => {
                return Err(InvoiceError::MissingSummary(line.issue.clone()));
            }
            MissingSummaryPolicy::Placeholder(text) => {
                debug!("Using placeholder summary for issue {}", line.issue);
                return Ok(text.clone());
            }
            MissingSummaryPolicy::Prompt(prompt) => prompt.ask(&line.issue)?,
        },
    };

    if !summary.is_empty() {
        cache.insert(line.issue.clone(), summary.clone());
    }
    Ok(summary)
}
