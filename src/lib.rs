//! Suite Engine - test suite orchestration
//!
//! Runs discovered test suites to completion: lifecycle hooks, test
//! dependencies, per-test and per-suite timeouts, and parallel scheduling
//! by assembly, suite or test. Every suite produces an outcome tree of
//! passed, failed and skipped units.
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use suite_engine::config::{ParallelBy, RunConfig};
//! use suite_engine::executor::Runner;
//! use suite_engine::models::{SuiteDescriptor, TestDescriptor};
//!
//! # async fn demo() {
//! let suite = SuiteDescriptor::new("Cart")
//!     .before_test("empty_cart", |_| Ok(()))
//!     .test(TestDescriptor::new("add_item", |_| Ok(())));
//!
//! let config = RunConfig::default()
//!     .with_parallel_by(ParallelBy::Suite)
//!     .with_threads(4);
//! let run = Runner::new(Arc::new(config)).run(vec![suite]).await;
//! println!("{}", run.result());
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod engine;
pub mod executor;
pub mod models;
pub mod output;
pub mod results;
pub mod samples;
pub mod utils;
