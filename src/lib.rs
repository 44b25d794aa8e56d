//! choreboard - coordinator/worker job-table simulation
//!
//! A coordinator offers a fixed table of ten jobs to a handful of workers over
//! a fixed-width TCP protocol. Each worker picks jobs according to its mood,
//! simulates the work and reports completion. When the session clock runs
//! out the coordinator tallies every completed job and names a winner.
//!
//! # Architecture
//!
//! - **Job model**: jobs, the ten-slot table and the completed-jobs ledger
//! - **Wire protocol**: six two-byte message codes, no framing
//! - **Coordinator**: single-task multiplexed dispatch loop
//! - **Workers**: mood-driven job selection over their own connection
//! - **Report**: per-job credit lines, per-worker totals and a winner bonus

pub mod config;
pub mod distributed;
pub mod job;
pub mod output;
pub mod util;

// Re-export commonly used types
pub use config::Config;
pub use job::{Job, JobStatus, JobTable};

/// Result type used throughout choreboard
pub type Result<T> = anyhow::Result<T>;
