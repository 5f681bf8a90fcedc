//! Invoices folded from timesheet entries, one line per issue.

use chrono::TimeDelta;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::helpers::tickets::{TicketError, TicketLookup};
use crate::models::timesheet::{as_seconds, TimeEntry};

const SECONDS_PER_HOUR: i64 = 3600;

/// Exact `rate × duration` in hours.
pub fn amount_for(rate: Decimal, duration: TimeDelta) -> Decimal {
    rate * Decimal::from(duration.num_seconds()) / Decimal::from(SECONDS_PER_HOUR)
}

/// Hours as an exact decimal.
pub fn hours(duration: TimeDelta) -> Decimal {
    Decimal::from(duration.num_seconds()) / Decimal::from(SECONDS_PER_HOUR)
}

/// Work billed against one issue within an invoice.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct InvoiceLineEntry {
    pub issue: String,
    /// One description per contributing entry, in entry order.
    pub details: Vec<String>,
    pub summary: Option<String>,
    pub rate: Decimal,
    #[serde(serialize_with = "as_seconds")]
    pub duration: TimeDelta,
    pub total: Decimal,
}

impl InvoiceLineEntry {
    fn new(issue: &str) -> Self {
        Self {
            issue: issue.to_string(),
            details: Vec::new(),
            summary: None,
            rate: Decimal::ZERO,
            duration: TimeDelta::zero(),
            total: Decimal::ZERO,
        }
    }

    /// Adds the items of `entry` that belong to this issue.
    fn fold(&mut self, entry: &TimeEntry) {
        let mut text = Vec::new();
        let mut duration = TimeDelta::zero();
        for item in entry.items.iter().filter(|item| item.issue == self.issue) {
            duration += item.duration;
            text.push(item.description.as_str());
        }

        self.rate = entry.effective_rate();
        self.details.push(text.join("; "));
        self.duration += duration;
        self.total += amount_for(self.rate, duration);
    }

    pub fn hours(&self) -> Decimal {
        hours(self.duration)
    }
}

/// All work billed under one invoice ID.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Invoice {
    pub id: String,
    pub lines: BTreeMap<String, InvoiceLineEntry>,
    pub total: Decimal,
    #[serde(skip)]
    entries: Vec<TimeEntry>,
}

impl Invoice {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            lines: BTreeMap::new(),
            total: Decimal::ZERO,
            entries: Vec::new(),
        }
    }

    /// Adds an entry and recomputes the whole invoice.
    pub fn add(&mut self, entry: TimeEntry, lookup: Option<&dyn TicketLookup>) -> &mut Self {
        self.push(entry);
        self.recalculate(lookup)
    }

    fn push(&mut self, mut entry: TimeEntry) {
        entry.recalculate();
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[TimeEntry] {
        &self.entries
    }

    /// Rebuilds every line from the retained entries. The result depends
    /// only on the entries, never on the previous totals.
    pub fn recalculate(&mut self, lookup: Option<&dyn TicketLookup>) -> &mut Self {
        let mut lines: BTreeMap<String, InvoiceLineEntry> = BTreeMap::new();

        for entry in &self.entries {
            let mut seen: Vec<&str> = Vec::new();
            for item in &entry.items {
                if seen.contains(&item.issue.as_str()) {
                    continue;
                }
                seen.push(&item.issue);
                lines
                    .entry(item.issue.clone())
                    .or_insert_with(|| InvoiceLineEntry::new(&item.issue))
                    .fold(entry);
            }
        }

        if let Some(lookup) = lookup {
            for line in lines.values_mut() {
                line.summary = resolve_summary(lookup, &line.issue);
            }
        }

        self.total = lines.values().map(|line| line.total).sum();
        self.lines = lines;
        self
    }
}

fn resolve_summary(lookup: &dyn TicketLookup, issue: &str) -> Option<String> {
    if issue.is_empty() {
        return None;
    }
    match lookup.summary(issue) {
        Ok(summary) => Some(summary),
        Err(TicketError::NotFound(_)) => {
            debug!("No ticket found for issue {}", issue);
            None
        }
        // the lookup reports its own failures; lines are rebuilt often
        Err(TicketError::Lookup(reason)) => {
            debug!("Summary for issue {} unavailable: {}", issue, reason);
            None
        }
    }
}

/// Invoices keyed by ID, iterated in ascending ID order.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct Invoices {
    invoices: BTreeMap<String, Invoice>,
}

impl Invoices {
    /// Files an entry under its invoice without recomputing totals.
    pub(crate) fn insert(&mut self, entry: TimeEntry) {
        self.invoices
            .entry(entry.invoice.clone())
            .or_insert_with(|| Invoice::new(entry.invoice.clone()))
            .push(entry);
    }

    /// Files an entry under its invoice and recomputes that invoice.
    pub fn append(&mut self, entry: TimeEntry, lookup: Option<&dyn TicketLookup>) {
        self.invoices
            .entry(entry.invoice.clone())
            .or_insert_with(|| Invoice::new(entry.invoice.clone()))
            .add(entry, lookup);
    }

    pub fn recalculate(&mut self, lookup: Option<&dyn TicketLookup>) {
        for invoice in self.invoices.values_mut() {
            invoice.recalculate(lookup);
        }
    }

    pub fn get(&self, id: &str) -> Option<&Invoice> {
        self.invoices.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Invoice> {
        self.invoices.values()
    }

    pub fn len(&self) -> usize {
        self.invoices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invoices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::tickets::{CachedLookup, StaticLookup};
    use crate::models::timesheet::TaskItem;
    use chrono::{NaiveDate, NaiveDateTime};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rust_decimal_macros::dec;
    use std::cell::Cell;

    fn at(hour: u32, min: u32, sec: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(hour, min, sec)
            .unwrap()
    }

    fn entry(
        invoice: &str,
        from: NaiveDateTime,
        to: NaiveDateTime,
        items: &[(&str, &str)],
        rate: Decimal,
    ) -> TimeEntry {
        let mut e = TimeEntry::new(
            invoice,
            Some(from),
            Some(to),
            items.iter().map(|(i, d)| TaskItem::new(*i, *d)).collect(),
        );
        e.rate = rate;
        e
    }

    #[test]
    fn lines_group_by_issue_across_entries() {
        let mut invoice = Invoice::new("INV1");
        invoice.add(entry("INV1", at(9, 0, 0), at(10, 0, 0), &[("A-1", "one")], dec!(40)), None);
        invoice.add(entry("INV1", at(11, 0, 0), at(12, 30, 0), &[("A-1", "two")], dec!(40)), None);

        let line = &invoice.lines["A-1"];
        assert_eq!(line.details, vec!["one", "two"]);
        assert_eq!(line.duration, TimeDelta::minutes(150));
        assert_eq!(line.hours(), dec!(2.5));
        assert_eq!(line.total, dec!(100));
        assert_eq!(invoice.total, dec!(100));
    }

    #[test]
    fn an_entry_can_feed_several_issues() {
        let mut invoice = Invoice::new("INV1");
        invoice.add(
            entry(
                "INV1",
                at(9, 0, 0),
                at(11, 0, 0),
                &[("A-1", "design"), ("B-2", "review"), ("A-1", "build")],
                dec!(30),
            ),
            None,
        );

        let a = &invoice.lines["A-1"];
        let b = &invoice.lines["B-2"];
        assert_eq!(a.details, vec!["design; build"]);
        assert_eq!(a.duration, TimeDelta::minutes(80));
        assert_eq!(b.duration, TimeDelta::minutes(40));
        assert_eq!(a.total, dec!(40));
        assert_eq!(b.total, dec!(20));
        assert_eq!(invoice.total, dec!(60));
    }

    #[test]
    fn third_of_an_hour_is_exact() {
        let mut invoice = Invoice::new("INV1");
        invoice.add(entry("INV1", at(9, 0, 0), at(9, 20, 0), &[("A-1", "x")], dec!(33.33)), None);
        assert_eq!(invoice.total, dec!(11.11));
    }

    #[test]
    fn hundred_cent_lines_sum_to_one() {
        let mut invoice = Invoice::new("INV1");
        for i in 0..100 {
            let start = at(0, 0, 0) + TimeDelta::seconds(i * 36);
            let issue = format!("A-{i:03}");
            let end = start + TimeDelta::seconds(36);
            invoice.add(entry("INV1", start, end, &[(issue.as_str(), "tick")], dec!(1)), None);
        }
        assert_eq!(invoice.lines.len(), 100);
        assert!(invoice.lines.values().all(|l| l.total == dec!(0.01)));
        assert_eq!(invoice.total, dec!(1.00));
    }

    #[test]
    fn total_is_the_sum_of_lines_in_any_order() {
        let mut rng = StdRng::seed_from_u64(0x2545_f491_4f6c_dd1d);

        for _ in 0..500 {
            let mut entries = Vec::new();
            for i in 0..rng.gen_range(1..=15) {
                // multiples of 36s keep every amount a whole number of cents
                let secs = rng.gen_range(0..500_i64) * 36;
                let rate = Decimal::new(rng.gen_range(0..20_000_i64), 2);
                let issue = format!("I-{}", rng.gen_range(0..6));
                let start = at(0, 0, 0) + TimeDelta::minutes(i);
                let end = start + TimeDelta::seconds(secs);
                entries.push(entry("INV", start, end, &[(issue.as_str(), "w")], rate));
            }

            let mut forward = Invoice::new("INV");
            for e in entries.iter().cloned() {
                forward.add(e, None);
            }
            let mut backward = Invoice::new("INV");
            for e in entries.iter().rev().cloned() {
                backward.add(e, None);
            }

            let sum: Decimal = forward.lines.values().map(|l| l.total).sum();
            assert_eq!(forward.total, sum);
            assert_eq!(backward.total, forward.total);
        }
    }

    #[test]
    fn recalculation_is_idempotent() {
        let mut invoice = Invoice::new("INV1");
        invoice.add(entry("INV1", at(9, 0, 0), at(10, 0, 0), &[("A-1", "one")], dec!(40)), None);
        let before = invoice.clone();
        invoice.recalculate(None).recalculate(None);
        assert_eq!(invoice, before);
    }

    struct Flaky {
        calls: Cell<usize>,
    }

    impl TicketLookup for Flaky {
        fn summary(&self, issue: &str) -> Result<String, TicketError> {
            self.calls.set(self.calls.get() + 1);
            match issue {
                "A-1" => Ok("Login page".into()),
                _ => Err(TicketError::Lookup("timeout".into())),
            }
        }
    }

    #[test]
    fn lookup_failures_leave_the_summary_empty() {
        let lookup = Flaky { calls: Cell::new(0) };
        let mut invoice = Invoice::new("INV1");
        let items = [("A-1", "x"), ("B-2", "y"), ("", "z")];
        invoice.add(entry("INV1", at(9, 0, 0), at(10, 0, 0), &items, dec!(10)), Some(&lookup));

        assert_eq!(invoice.lines["A-1"].summary.as_deref(), Some("Login page"));
        assert_eq!(invoice.lines["B-2"].summary, None);
        assert_eq!(invoice.lines[""].summary, None);
        assert_eq!(lookup.calls.get(), 2);
    }

    #[test]
    fn cached_lookup_is_queried_once_per_issue() {
        let lookup = CachedLookup::new(Flaky { calls: Cell::new(0) });
        let mut invoices = Invoices::default();
        for inv in ["INV1", "INV2"] {
            let morning = entry(inv, at(9, 0, 0), at(10, 0, 0), &[("A-1", "x")], dec!(10));
            let noon = entry(inv, at(11, 0, 0), at(12, 0, 0), &[("A-1", "y")], dec!(10));
            invoices.append(morning, Some(&lookup));
            invoices.append(noon, Some(&lookup));
        }
        assert_eq!(invoices.len(), 2);
        assert_eq!(lookup.into_inner().calls.get(), 1);
    }

    #[test]
    fn failed_lookups_are_not_repeated_across_recalculations() {
        let lookup = CachedLookup::new(Flaky { calls: Cell::new(0) });
        let mut invoice = Invoice::new("INV1");
        let work = entry("INV1", at(9, 0, 0), at(10, 0, 0), &[("B-2", "y")], dec!(10));
        invoice.add(work, Some(&lookup));
        invoice.recalculate(Some(&lookup)).recalculate(Some(&lookup));

        assert_eq!(invoice.lines["B-2"].summary, None);
        assert_eq!(
            lookup.summary("B-2"),
            Err(TicketError::Lookup("timeout".into()))
        );
        assert_eq!(lookup.into_inner().calls.get(), 1);
    }

    #[test]
    fn invoices_iterate_in_id_order() {
        let lookup = StaticLookup::default();
        let mut invoices = Invoices::default();
        for inv in ["B", "C", "A"] {
            let work = entry(inv, at(9, 0, 0), at(10, 0, 0), &[("X-1", "x")], dec!(10));
            invoices.append(work, Some(&lookup));
        }
        let ids: Vec<&str> = invoices.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
        assert_eq!(invoices.get("B").unwrap().total, dec!(10));
        assert!(invoices.get("Z").is_none());
    }
}
