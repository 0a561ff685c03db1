//! One full pass over the birthday table.

use crate::birthday::{BirthdayStore, due};
use crate::celebration::{CelebrationNotifier, EntryOutcome};
use crate::error::Result;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Counters for one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Day the sweep matched against.
    pub day: Option<NaiveDate>,
    /// Records examined.
    pub checked: usize,
    /// Records whose birthday is today.
    pub due: usize,
    /// Due records celebrated during this sweep.
    pub celebrated: usize,
    /// Celebrations where a matching entry already existed.
    pub already_scheduled: usize,
    /// Due records skipped because they were already celebrated today.
    pub duplicates: usize,
    /// Due records whose celebration failed.
    pub failed: usize,
}

impl SweepReport {
    /// One-line summary for logs and command replies.
    pub fn summary(&self) -> String {
        format!(
            "checked {} birthdays, {} due today: {} celebrated, {} already done, {} failed",
            self.checked,
            self.due,
            self.celebrated,
            self.duplicates,
            self.failed
        )
    }
}

/// Members already celebrated on the current day.
#[derive(Debug, Default)]
pub struct RunLedger {
    day: Option<NaiveDate>,
    seen: HashSet<String>,
}

impl RunLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `key` was already recorded for `day`.
    pub fn contains(&mut self, day: NaiveDate, key: &str) -> bool {
        self.roll_to(day);
        self.seen.contains(key)
    }

    /// Record `key` for `day`.
    pub fn record(&mut self, day: NaiveDate, key: String) {
        self.roll_to(day);
        self.seen.insert(key);
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    fn roll_to(&mut self, day: NaiveDate) {
        if self.day != Some(day) {
            self.seen.clear();
            self.day = Some(day);
        }
    }
}

pub(crate) fn build_run_key(venue: &str, user: &str, day: NaiveDate) -> String {
    format!("{venue}:{user}:{day}")
}

/// Scan every stored birthday and celebrate the ones falling on `today`.
///
/// Failures for one member are logged and counted; they never stop the
/// rest of the sweep.
///
/// # Errors
/// Returns an error only when the store itself cannot be read.
pub async fn run_sweep(
    store: &BirthdayStore,
    notifier: &CelebrationNotifier,
    ledger: &mut RunLedger,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> Result<SweepReport> {
    let venues = store.snapshot()?;
    let mut report = SweepReport {
        day: Some(today),
        ..SweepReport::default()
    };

    for venue in venues {
        for record in &venue.records {
            report.checked += 1;
            if !due::is_due(today, record.date) {
                continue;
            }
            report.due += 1;

            let run_key = build_run_key(&venue.venue_id, &record.user_id, today);
            if ledger.contains(today, &run_key) {
                debug!("suppressing duplicate celebration '{run_key}'");
                report.duplicates += 1;
                continue;
            }

            match notifier.celebrate(&venue.venue_id, record, today, now).await {
                Ok(outcome) => {
                    if outcome.entry == EntryOutcome::AlreadyScheduled {
                        report.already_scheduled += 1;
                    }
                    report.celebrated += 1;
                    ledger.record(today, run_key);
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        venue = %venue.venue_id,
                        user = %record.user_id,
                        "birthday celebration failed: {e}"
                    );
                }
            }
        }
    }

    info!(day = %today, "birthday sweep finished: {}", report.summary());
    Ok(report)
}
