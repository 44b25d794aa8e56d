//! Append-only record of completed jobs

use super::Job;
use serde::Serialize;

/// Jobs that reached Complete during the session, in sweep order
#[derive(Debug, Clone, Default, Serialize)]
pub struct Ledger {
    entries: Vec<Job>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, job: Job) {
        self.entries.push(job);
    }

    pub fn entries(&self) -> &[Job] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
