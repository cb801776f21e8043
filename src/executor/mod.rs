//! Run execution
//!
//! Plans discovered suites and schedules them across workers.

mod parallel;
mod runner;

pub use parallel::SuiteScheduler;
pub use runner::{PlannedSuite, Runner, TestInfo};
