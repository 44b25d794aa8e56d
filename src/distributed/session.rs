//! Coordinator session state
//!
//! All arbitration lives here, apart from socket I/O. The dispatch loop in
//! [`super::coordinator`] feeds decoded requests in one at a time and writes
//! back whatever reply [`Dispatched::reply`] produces. Because requests are
//! applied strictly in order, the first WANT_JOB for a NotStarted slot wins
//! and every later one for the same slot is refused until the slot is swept
//! and replaced.

use crate::distributed::protocol::{Reply, Request};
use crate::job::{Job, JobError, JobFactory, JobStatus, JobTable, Ledger, WorkerId};
use crate::output::SessionReport;

/// Outcome of applying one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched {
    /// NEED_JOB: a copy of the table as it stands now
    Snapshot(JobTable),
    /// WANT_JOB on a NotStarted slot
    Claimed { slot: usize, job: Job },
    /// WANT_JOB on a slot that was not NotStarted
    Refused { slot: usize, status: JobStatus },
    /// JOB_DONE on a Working slot
    Completed { slot: usize, job: Job },
    /// JOB_DONE the table could not apply; no reply is sent
    Ignored { slot: usize, reason: JobError },
}

impl Dispatched {
    /// Reply owed to the requesting worker, if any
    pub fn reply(&self) -> Option<Reply> {
        match self {
            Dispatched::Snapshot(table) => Some(Reply::Snapshot(table.clone())),
            Dispatched::Claimed { .. } => Some(Reply::Ack),
            Dispatched::Refused { .. } => Some(Reply::Nack),
            Dispatched::Completed { .. } | Dispatched::Ignored { .. } => None,
        }
    }
}

/// Authoritative table plus the completed-jobs ledger
pub struct SessionState {
    table: JobTable,
    factory: JobFactory,
    ledger: Ledger,
    reclaim_on_disconnect: bool,
}

impl SessionState {
    /// Create a session with a freshly generated table
    pub fn new(mut factory: JobFactory, reclaim_on_disconnect: bool) -> Self {
        let table = JobTable::generate(&mut factory);
        Self::with_table(table, factory, reclaim_on_disconnect)
    }

    /// Create a session around an explicit starting table
    pub fn with_table(table: JobTable, factory: JobFactory, reclaim_on_disconnect: bool) -> Self {
        Self {
            table,
            factory,
            ledger: Ledger::new(),
            reclaim_on_disconnect,
        }
    }

    /// Replace every slot with a fresh job
    pub fn initialize_table(&mut self) {
        self.table = JobTable::generate(&mut self.factory);
    }

    /// Replace the table wholesale
    pub fn install_table(&mut self, table: JobTable) {
        self.table = table;
    }

    pub fn table(&self) -> &JobTable {
        &self.table
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Apply one worker request
    pub fn handle(&mut self, worker: WorkerId, request: Request) -> Dispatched {
        match request {
            Request::NeedJob => Dispatched::Snapshot(self.table.clone()),
            Request::WantJob(slot) => match self.table.claim(slot, worker) {
                Ok(job) => Dispatched::Claimed { slot, job },
                Err(JobError::NotClaimable { status, .. }) => Dispatched::Refused { slot, status },
                // Decoding bounds the slot, so this only covers a bad caller
                Err(reason) => Dispatched::Ignored { slot, reason },
            },
            Request::JobDone(slot) => match self.table.complete(slot, worker) {
                Ok(job) => Dispatched::Completed { slot, job },
                Err(reason) => Dispatched::Ignored { slot, reason },
            },
        }
    }

    /// Move Complete jobs to the ledger and replace them
    pub fn sweep(&mut self) -> Vec<Job> {
        self.table.sweep(&mut self.ledger, &mut self.factory)
    }

    /// Handle a worker leaving the session
    ///
    /// Its Working jobs are returned to the pool only when reclaiming is
    /// enabled; otherwise they stay Working until the session ends. Returns
    /// the released slots.
    pub fn worker_lost(&mut self, worker: WorkerId) -> Vec<usize> {
        if !self.reclaim_on_disconnect {
            return Vec::new();
        }
        self.table.release_worker(worker)
    }

    /// Run the final sweep and tally the ledger
    pub fn finish<F>(&mut self, name_of: F, bonus: u32) -> SessionReport
    where
        F: Fn(WorkerId) -> String,
    {
        self.sweep();
        SessionReport::tally(&self.ledger, name_of, bonus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::TABLE_SIZE;

    fn session(reclaim: bool) -> SessionState {
        SessionState::new(JobFactory::with_seed(21), reclaim)
    }

    #[test]
    fn test_first_claim_wins() {
        let mut state = session(false);

        assert!(matches!(
            state.handle(0, Request::WantJob(3)),
            Dispatched::Claimed { slot: 3, .. }
        ));
        let refused = state.handle(1, Request::WantJob(3));
        assert_eq!(
            refused,
            Dispatched::Refused { slot: 3, status: JobStatus::Working }
        );
        assert_eq!(refused.reply(), Some(Reply::Nack));
        assert_eq!(state.table().get(3).unwrap().worker(), Some(0));
    }

    #[test]
    fn test_need_job_returns_current_table() {
        let mut state = session(false);
        state.handle(2, Request::WantJob(0));

        match state.handle(1, Request::NeedJob) {
            Dispatched::Snapshot(table) => {
                assert_eq!(table.get(0).unwrap().status(), JobStatus::Working);
                assert_eq!(table.available(), TABLE_SIZE - 1);
            }
            other => panic!("Expected snapshot, got {:?}", other),
        }
    }

    #[test]
    fn test_done_then_sweep_credits_reporter() {
        let mut state = session(false);
        state.handle(1, Request::WantJob(6));
        let value = state.table().get(6).unwrap().value();

        let done = state.handle(1, Request::JobDone(6));
        assert!(matches!(done, Dispatched::Completed { slot: 6, .. }));
        assert_eq!(done.reply(), None);

        // Still Complete until the sweep runs, so it cannot be claimed
        assert!(matches!(
            state.handle(0, Request::WantJob(6)),
            Dispatched::Refused { status: JobStatus::Complete, .. }
        ));

        let swept = state.sweep();
        assert_eq!(swept.len(), 1);
        assert_eq!(state.ledger().len(), 1);
        assert_eq!(state.ledger().entries()[0].worker(), Some(1));
        assert!(state.table().get(6).unwrap().is_available());

        let report = state.finish(|id| id.to_string(), 5);
        assert_eq!(report.total_for(1), u32::from(value));
        assert_eq!(report.winner.unwrap().total_value, u32::from(value) + 5);
    }

    #[test]
    fn test_done_on_unclaimed_slot_is_ignored() {
        let mut state = session(false);
        let outcome = state.handle(0, Request::JobDone(4));
        assert!(matches!(
            outcome,
            Dispatched::Ignored { slot: 4, reason: JobError::NotWorking { .. } }
        ));
        assert_eq!(outcome.reply(), None);
        assert!(state.sweep().is_empty());
    }

    #[test]
    fn test_orphaned_jobs_stay_working_by_default() {
        let mut state = session(false);
        state.handle(2, Request::WantJob(1));
        assert!(state.worker_lost(2).is_empty());
        assert_eq!(state.table().get(1).unwrap().status(), JobStatus::Working);
    }

    #[test]
    fn test_reclaim_on_disconnect() {
        let mut state = session(true);
        state.handle(2, Request::WantJob(1));
        state.handle(2, Request::WantJob(8));
        state.handle(3, Request::WantJob(5));

        assert_eq!(state.worker_lost(2), vec![1, 8]);
        assert!(state.table().get(1).unwrap().is_available());
        assert_eq!(state.table().get(5).unwrap().worker(), Some(3));
    }

    #[test]
    fn test_finish_runs_final_sweep() {
        let mut state = session(false);
        state.handle(0, Request::WantJob(2));
        state.handle(0, Request::JobDone(2));

        let report = state.finish(|_| "Ali".to_string(), 5);
        assert_eq!(report.credits.len(), 1);
        assert_eq!(report.credits[0].slot, 2);
        assert_eq!(state.ledger().len(), 1);
    }

    #[test]
    fn test_initialize_table_resets_slots() {
        let mut state = session(false);
        state.handle(0, Request::WantJob(0));
        state.initialize_table();
        assert_eq!(state.table().available(), TABLE_SIZE);
    }
}
