//! Session report
//!
//! The report is computed once, after the final sweep, from the ledger of
//! completed jobs. Each ledger entry is credited to the worker that reported
//! it done. Per-worker totals are the sum of credited values, and the single
//! worker with the strictly greatest total receives the winner bonus.
//!
//! Ties are broken in favour of the lowest worker id. An empty ledger has no
//! winner.
//!
//! - `text`: human-readable report lines
//! - `json`: JSON report file

pub mod json;
pub mod text;

use crate::job::{Ledger, WorkerId};
use serde::Serialize;
use std::collections::BTreeMap;

/// One ledger entry attributed to its credited worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreditLine {
    pub worker: WorkerId,
    pub name: String,
    pub slot: usize,
    pub value: u16,
}

/// Accumulated value for one worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerTotal {
    pub worker: WorkerId,
    pub name: String,
    pub jobs: usize,
    pub total_value: u32,
}

/// Winner of the session, with the bonus applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Winner {
    pub worker: WorkerId,
    pub name: String,
    /// Credited total before the bonus
    pub earned: u32,
    /// Credited total plus the bonus
    pub total_value: u32,
}

/// End-of-session report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionReport {
    /// Ledger entries in the order they were swept
    pub credits: Vec<CreditLine>,
    /// Totals per credited worker, ordered by worker id
    pub totals: Vec<WorkerTotal>,
    pub winner: Option<Winner>,
    pub bonus: u32,
}

impl SessionReport {
    /// Tally a ledger
    ///
    /// `name_of` maps a worker id to its display name.
    pub fn tally<F>(ledger: &Ledger, name_of: F, bonus: u32) -> Self
    where
        F: Fn(WorkerId) -> String,
    {
        let mut credits = Vec::with_capacity(ledger.len());
        let mut by_worker: BTreeMap<WorkerId, (usize, u32)> = BTreeMap::new();

        for job in ledger.entries() {
            // Ledger entries are always Complete, so a worker is always bound
            let Some(worker) = job.worker() else {
                continue;
            };
            credits.push(CreditLine {
                worker,
                name: name_of(worker),
                slot: job.slot(),
                value: job.value(),
            });
            let entry = by_worker.entry(worker).or_insert((0, 0));
            entry.0 += 1;
            entry.1 += u32::from(job.value());
        }

        let totals: Vec<WorkerTotal> = by_worker
            .into_iter()
            .map(|(worker, (jobs, total_value))| WorkerTotal {
                worker,
                name: name_of(worker),
                jobs,
                total_value,
            })
            .collect();

        // Iteration is in ascending id order, so a strict comparison keeps
        // the lowest id among tied maxima
        let mut best: Option<&WorkerTotal> = None;
        for total in &totals {
            if best.map_or(true, |b| total.total_value > b.total_value) {
                best = Some(total);
            }
        }
        let winner = best.map(|b| Winner {
            worker: b.worker,
            name: b.name.clone(),
            earned: b.total_value,
            total_value: b.total_value + bonus,
        });

        Self {
            credits,
            totals,
            winner,
            bonus,
        }
    }

    /// Credited total for `worker`, without the bonus
    pub fn total_for(&self, worker: WorkerId) -> u32 {
        self.totals
            .iter()
            .find(|t| t.worker == worker)
            .map_or(0, |t| t.total_value)
    }

    /// Number of jobs credited to `worker`
    pub fn jobs_for(&self, worker: WorkerId) -> usize {
        self.totals
            .iter()
            .find(|t| t.worker == worker)
            .map_or(0, |t| t.jobs)
    }
}
