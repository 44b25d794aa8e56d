//! Job model
//!
//! A job is one chore on the shared board. Each job carries three difficulty
//! attributes drawn from `[1, 5]` and a value derived from them once, at
//! creation:
//!
//! ```text
//! value = slow × (dirty + heavy)
//! ```
//!
//! Status moves strictly forward:
//!
//! ```text
//! NotStarted --claim--> Working --complete--> Complete
//! ```
//!
//! The coordinator's [`JobTable`] is authoritative. Workers hold snapshots
//! rebuilt from the wire with [`Job::from_parts`].

pub mod ledger;
pub mod table;

pub use ledger::Ledger;
pub use table::{JobTable, TABLE_SIZE};

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Worker identifier, assigned by the coordinator at connect time
pub type WorkerId = u16;

/// Smallest attribute value a generated job can carry
pub const MIN_ATTRIBUTE: u8 = 1;

/// Largest attribute value a generated job can carry
pub const MAX_ATTRIBUTE: u8 = 5;

/// Job status
///
/// The discriminants are the status codes carried in table snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    NotStarted = 0,
    Working = 1,
    Complete = 2,
}

impl JobStatus {
    /// Status code used on the wire
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Decode a wire status code
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(Self::NotStarted),
            1 => Some(Self::Working),
            2 => Some(Self::Complete),
            _ => None,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::NotStarted => write!(f, "NOT_STARTED"),
            JobStatus::Working => write!(f, "WORKING"),
            JobStatus::Complete => write!(f, "COMPLETE"),
        }
    }
}

/// Errors raised by job state transitions and reconstruction
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("{attribute} must be between 1 and 5, got {value}")]
    AttributeOutOfRange { attribute: &'static str, value: u16 },

    #[error("job value {actual} does not match slow × (dirty + heavy) = {expected}")]
    ValueMismatch { expected: u16, actual: u16 },

    #[error("job {slot} cannot be claimed while {status}")]
    NotClaimable { slot: u16, status: JobStatus },

    #[error("job {slot} cannot be completed while {status}")]
    NotWorking { slot: u16, status: JobStatus },

    #[error("no job slot {0}")]
    NoSuchSlot(usize),
}

/// A single job occupying one slot of the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Job {
    id: u16,
    slow: u8,
    dirty: u8,
    heavy: u8,
    value: u16,
    status: JobStatus,
    worker: Option<WorkerId>,
}

impl Job {
    /// Create a fresh, unclaimed job
    pub fn new(id: u16, slow: u8, dirty: u8, heavy: u8) -> Result<Self, JobError> {
        check_attribute("slow", slow.into())?;
        check_attribute("dirty", dirty.into())?;
        check_attribute("heavy", heavy.into())?;

        Ok(Self {
            id,
            slow,
            dirty,
            heavy,
            value: compute_value(slow, dirty, heavy),
            status: JobStatus::NotStarted,
            worker: None,
        })
    }

    /// Rebuild a job from the six snapshot fields
    ///
    /// Snapshots do not carry the assigned worker, so the result never has one.
    pub fn from_parts(
        id: u16,
        slow: u16,
        dirty: u16,
        heavy: u16,
        value: u16,
        status: JobStatus,
    ) -> Result<Self, JobError> {
        let slow = check_attribute("slow", slow)?;
        let dirty = check_attribute("dirty", dirty)?;
        let heavy = check_attribute("heavy", heavy)?;

        let expected = compute_value(slow, dirty, heavy);
        if expected != value {
            return Err(JobError::ValueMismatch { expected, actual: value });
        }

        Ok(Self {
            id,
            slow,
            dirty,
            heavy,
            value,
            status,
            worker: None,
        })
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    /// Slot index this job occupies
    pub fn slot(&self) -> usize {
        self.id as usize
    }

    pub fn slow(&self) -> u8 {
        self.slow
    }

    pub fn dirty(&self) -> u8 {
        self.dirty
    }

    pub fn heavy(&self) -> u8 {
        self.heavy
    }

    pub fn value(&self) -> u16 {
        self.value
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Worker bound to this job; `None` while not started
    pub fn worker(&self) -> Option<WorkerId> {
        self.worker
    }

    pub fn is_available(&self) -> bool {
        self.status == JobStatus::NotStarted
    }

    /// Claim the job for `worker` (NotStarted → Working)
    pub fn claim(&mut self, worker: WorkerId) -> Result<(), JobError> {
        if self.status != JobStatus::NotStarted {
            return Err(JobError::NotClaimable {
                slot: self.id,
                status: self.status,
            });
        }
        self.status = JobStatus::Working;
        self.worker = Some(worker);
        Ok(())
    }

    /// Mark the job done and credit `worker` (Working → Complete)
    pub fn complete(&mut self, worker: WorkerId) -> Result<(), JobError> {
        if self.status != JobStatus::Working {
            return Err(JobError::NotWorking {
                slot: self.id,
                status: self.status,
            });
        }
        self.status = JobStatus::Complete;
        self.worker = Some(worker);
        Ok(())
    }

    /// Return a Working job to the pool (Working → NotStarted)
    pub(crate) fn release(&mut self) {
        if self.status == JobStatus::Working {
            self.status = JobStatus::NotStarted;
            self.worker = None;
        }
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "job {} (value {}: slow {}, dirty {}, heavy {}) {}",
            self.id, self.value, self.slow, self.dirty, self.heavy, self.status
        )
    }
}

fn compute_value(slow: u8, dirty: u8, heavy: u8) -> u16 {
    u16::from(slow) * (u16::from(dirty) + u16::from(heavy))
}

fn check_attribute(attribute: &'static str, value: u16) -> Result<u8, JobError> {
    if value < u16::from(MIN_ATTRIBUTE) || value > u16::from(MAX_ATTRIBUTE) {
        return Err(JobError::AttributeOutOfRange { attribute, value });
    }
    Ok(value as u8)
}

/// Random job generator
///
/// Uses xoshiro256++ so that a seeded factory reproduces the same sequence of
/// jobs, which the tests rely on.
pub struct JobFactory {
    rng: Xoshiro256PlusPlus,
}

impl JobFactory {
    /// Create a factory with a random seed
    pub fn new() -> Self {
        Self {
            rng: Xoshiro256PlusPlus::from_entropy(),
        }
    }

    /// Create a factory with a specific seed
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
        }
    }

    /// Create a factory, seeded when `seed` is given
    pub fn from_seed_option(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::with_seed(seed),
            None => Self::new(),
        }
    }

    /// Generate a fresh job for `slot`
    pub fn generate(&mut self, slot: u16) -> Job {
        let slow = self.rng.gen_range(MIN_ATTRIBUTE..=MAX_ATTRIBUTE);
        let dirty = self.rng.gen_range(MIN_ATTRIBUTE..=MAX_ATTRIBUTE);
        let heavy = self.rng.gen_range(MIN_ATTRIBUTE..=MAX_ATTRIBUTE);

        Job {
            id: slot,
            slow,
            dirty,
            heavy,
            value: compute_value(slow, dirty, heavy),
            status: JobStatus::NotStarted,
            worker: None,
        }
    }
}

impl Default for JobFactory {
    fn default() -> Self {
        Self::new()
    }
}
