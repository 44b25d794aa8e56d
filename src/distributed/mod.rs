//! Coordinator and worker implementation
//!
//! # Architecture
//!
//! choreboard uses a coordinator-worker architecture over plain TCP:
//!
//! - **Coordinator**: owns the job table, arbitrates claims, sweeps completed
//!   jobs into the ledger and reports the winner
//! - **Workers**: pull table snapshots, claim jobs according to their mood,
//!   simulate the work and report completion
//!
//! # Modules
//!
//! - `protocol`: fixed-width wire messages and stream helpers
//! - `session`: claim arbitration and the ledger, independent of sockets
//! - `coordinator`: multiplexed dispatch loop
//! - `mood`: worker job-selection policies
//! - `worker`: worker client
//! - `standalone`: coordinator and workers in one process

pub mod coordinator;
pub mod mood;
pub mod protocol;
pub mod session;
pub mod standalone;
pub mod worker;

// Re-export key types
pub use coordinator::Coordinator;
pub use mood::Mood;
pub use protocol::{MessageCode, ProtocolError, ReadOutcome, Reply, Request};
pub use session::{Dispatched, SessionState};
pub use standalone::{run_standalone, StandaloneOutcome};
pub use worker::{ExitReason, Step, Worker, WorkerSummary};
