//! Utility modules
//!
//! - `log`: dual console/file session log
//! - `time`: session clock and duration formatting

pub mod log;
pub mod time;

pub use log::SessionLog;
pub use time::SessionClock;
