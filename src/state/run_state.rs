//! Synchronized per-run state
//!
//! [`RunState`] owns the processed-URL set, the fingerprint set and the saved
//! counter. All operations are check-and-mark under a short lock, so the same
//! object serves sequential and pool scheduling. No lock is ever held across
//! an await point.

use crate::record::Record;
use crate::url::dedup_key;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Fingerprints and the saved counter share one lock so that quota
/// admission is a single critical section.
#[derive(Debug, Default)]
struct EmissionLedger {
    fingerprints: HashSet<String>,
    saved: usize,
}

impl EmissionLedger {
    /// Records a fingerprint, returning false if it was already emitted
    fn mark_emitted(&mut self, record: &Record) -> bool {
        self.fingerprints.insert(record.fingerprint())
    }
}

/// Outcome of admitting one page's records against the quota
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Admission {
    /// Records to push, already counted in `saved`
    pub accepted: Vec<Record>,

    /// Records whose fingerprint had already been emitted
    pub duplicates: usize,

    /// Records failing the minimum-quality rule
    pub invalid: usize,

    /// Unique records cut off because the quota was reached
    pub over_quota: usize,
}

/// Per-run crawl state shared by every worker
#[derive(Debug)]
pub struct RunState {
    wanted: usize,
    processed_urls: Mutex<HashSet<String>>,
    ledger: Mutex<EmissionLedger>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RunState {
    /// Creates empty run state for a quota of `wanted` records
    pub fn new(wanted: usize) -> Self {
        Self {
            wanted,
            processed_urls: Mutex::new(HashSet::new()),
            ledger: Mutex::new(EmissionLedger::default()),
        }
    }

    /// Marks a URL as processed, returning false if it already was
    pub fn should_process_url(&self, url: &str) -> bool {
        lock(&self.processed_urls).insert(dedup_key(url))
    }

    /// Marks a record's fingerprint as emitted, returning false if it already was
    ///
    /// The orchestrator goes through [`RunState::admit`]; this is the single
    /// record check for embedders that push records themselves. Both share
    /// one fingerprint set.
    pub fn should_emit(&self, record: &Record) -> bool {
        lock(&self.ledger).mark_emitted(record)
    }

    /// Filters, truncates and counts a batch of records in one critical section
    ///
    /// Invalid records are discarded, duplicates are filtered by fingerprint,
    /// and the survivors are truncated to the remaining quota before `saved`
    /// is incremented. The caller must push exactly `accepted`.
    pub fn admit(&self, records: Vec<Record>) -> Admission {
        let mut ledger = lock(&self.ledger);
        let mut admission = Admission::default();

        for record in records {
            if !record.is_valid() {
                admission.invalid += 1;
                continue;
            }

            if ledger.saved + admission.accepted.len() >= self.wanted {
                admission.over_quota += 1;
                continue;
            }

            if ledger.mark_emitted(&record) {
                admission.accepted.push(record);
            } else {
                admission.duplicates += 1;
            }
        }

        ledger.saved += admission.accepted.len();
        admission
    }

    /// Number of records admitted so far; never decreases
    pub fn saved_count(&self) -> usize {
        lock(&self.ledger).saved
    }

    /// Number of records still wanted
    pub fn remaining(&self) -> usize {
        self.wanted.saturating_sub(self.saved_count())
    }

    /// Returns true once the quota has been reached
    pub fn quota_met(&self) -> bool {
        self.saved_count() >= self.wanted
    }

    pub fn wanted(&self) -> usize {
        self.wanted
    }

    /// Number of distinct URLs marked as processed
    pub fn processed_url_count(&self) -> usize {
        lock(&self.processed_urls).len()
    }
}
