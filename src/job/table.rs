//! Fixed-size job table

use super::{Job, JobError, JobFactory, JobStatus, Ledger, WorkerId};
use serde::Serialize;

/// Number of slots on the board
pub const TABLE_SIZE: usize = 10;

/// Ordered table of exactly [`TABLE_SIZE`] jobs
///
/// Slot `i` always holds the job whose id is `i`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobTable {
    jobs: [Job; TABLE_SIZE],
}

impl JobTable {
    /// Fill every slot with a freshly generated job
    pub fn generate(factory: &mut JobFactory) -> Self {
        Self {
            jobs: std::array::from_fn(|slot| factory.generate(slot as u16)),
        }
    }

    /// Build a table from explicit jobs
    ///
    /// Fails if a job sits in a slot other than its own id.
    pub fn from_jobs(jobs: [Job; TABLE_SIZE]) -> Result<Self, JobError> {
        for (slot, job) in jobs.iter().enumerate() {
            if job.slot() != slot {
                return Err(JobError::NoSuchSlot(job.slot()));
            }
        }
        Ok(Self { jobs })
    }

    pub fn get(&self, slot: usize) -> Option<&Job> {
        self.jobs.get(slot)
    }

    pub fn jobs(&self) -> &[Job; TABLE_SIZE] {
        &self.jobs
    }

    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter()
    }

    /// Claim `slot` for `worker`
    pub fn claim(&mut self, slot: usize, worker: WorkerId) -> Result<Job, JobError> {
        let job = self.jobs.get_mut(slot).ok_or(JobError::NoSuchSlot(slot))?;
        job.claim(worker)?;
        Ok(*job)
    }

    /// Complete `slot`, crediting `worker`
    pub fn complete(&mut self, slot: usize, worker: WorkerId) -> Result<Job, JobError> {
        let job = self.jobs.get_mut(slot).ok_or(JobError::NoSuchSlot(slot))?;
        job.complete(worker)?;
        Ok(*job)
    }

    /// Return every Working job held by `worker` to the pool
    ///
    /// Returns the released slots.
    pub fn release_worker(&mut self, worker: WorkerId) -> Vec<usize> {
        let mut released = Vec::new();
        for job in self.jobs.iter_mut() {
            if job.status() == JobStatus::Working && job.worker() == Some(worker) {
                job.release();
                released.push(job.slot());
            }
        }
        released
    }

    /// Move Complete jobs into the ledger and replace them
    ///
    /// Each completed job is recorded before its slot is overwritten.
    /// Returns the jobs that were swept, in slot order.
    pub fn sweep(&mut self, ledger: &mut Ledger, factory: &mut JobFactory) -> Vec<Job> {
        let mut swept = Vec::new();
        for slot in 0..TABLE_SIZE {
            if self.jobs[slot].status() != JobStatus::Complete {
                continue;
            }
            let finished = self.jobs[slot];
            ledger.record(finished);
            self.jobs[slot] = factory.generate(slot as u16);
            swept.push(finished);
        }
        swept
    }

    /// Number of slots currently available for claiming
    pub fn available(&self) -> usize {
        self.jobs.iter().filter(|job| job.is_available()).count()
    }
}
