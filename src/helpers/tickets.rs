//! Issue summary lookup seam and its per-run memoisation.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};

use thiserror::Error;
use tracing::{debug, warn};

/// Failures of a ticket lookup. Both are recoverable for aggregation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TicketError {
    #[error("issue {0:?} does not exist or is not accessible")]
    NotFound(String),
    #[error("ticket lookup failed: {0}")]
    Lookup(String),
}

/// Resolves a human-readable summary for an issue ID.
pub trait TicketLookup {
    fn summary(&self, issue: &str) -> Result<String, TicketError>;
}

impl<T: TicketLookup + ?Sized> TicketLookup for &T {
    fn summary(&self, issue: &str) -> Result<String, TicketError> {
        (**self).summary(issue)
    }
}

impl<T: TicketLookup + ?Sized> TicketLookup for Box<T> {
    fn summary(&self, issue: &str) -> Result<String, TicketError> {
        (**self).summary(issue)
    }
}

/// What is known about one issue during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryState {
    Unresolved,
    Found(String),
    ConfirmedAbsent,
    /// The lookup failed for another reason. Not retried this run.
    Failed(String),
}

/// Queries the wrapped lookup at most once per issue ID. Failures other than
/// "not found" are logged once and replayed on later calls: there are no
/// retries within a run.
pub struct CachedLookup<L> {
    inner: L,
    states: Mutex<HashMap<String, SummaryState>>,
}

impl<L: TicketLookup> CachedLookup<L> {
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Seeds the cache with summaries that are already known, e.g. the
    /// persisted summary map. Empty summaries are ignored.
    pub fn with_known(inner: L, known: &BTreeMap<String, String>) -> Self {
        let states = known
            .iter()
            .filter(|(_, summary)| !summary.is_empty())
            .map(|(issue, summary)| (issue.clone(), SummaryState::Found(summary.clone())))
            .collect();
        Self {
            inner,
            states: Mutex::new(states),
        }
    }

    pub fn state(&self, issue: &str) -> SummaryState {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(issue)
            .cloned()
            .unwrap_or(SummaryState::Unresolved)
    }

    pub fn into_inner(self) -> L {
        self.inner
    }
}

impl<L: TicketLookup> TicketLookup for CachedLookup<L> {
    fn summary(&self, issue: &str) -> Result<String, TicketError> {
        match self.state(issue) {
            SummaryState::Found(summary) => return Ok(summary),
            SummaryState::ConfirmedAbsent => {
                return Err(TicketError::NotFound(issue.to_string()));
            }
            SummaryState::Failed(reason) => return Err(TicketError::Lookup(reason)),
            SummaryState::Unresolved => {}
        }

        debug!("Looking up summary for issue {}", issue);
        let result = self.inner.summary(issue);
        let state = match &result {
            Ok(summary) => SummaryState::Found(summary.clone()),
            Err(TicketError::NotFound(_)) => SummaryState::ConfirmedAbsent,
            Err(TicketError::Lookup(reason)) => {
                warn!("Lookup for issue {} failed, not retried this run: {}", issue, reason);
                SummaryState::Failed(reason.clone())
            }
        };
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(issue.to_string(), state);
        result
    }
}

/// Fixed issue → summary table, for offline runs.
#[derive(Debug, Clone, Default)]
pub struct StaticLookup {
    summaries: HashMap<String, String>,
}

impl StaticLookup {
    pub fn new<I, K, V>(summaries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            summaries: summaries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl TicketLookup for StaticLookup {
    fn summary(&self, issue: &str) -> Result<String, TicketError> {
        self.summaries
            .get(issue)
            .cloned()
            .ok_or_else(|| TicketError::NotFound(issue.to_string()))
    }
}
