//! Run planning and execution
//!
//! Turns discovered suite descriptors into a filtered execution plan and
//! runs it under the configured parallelism.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use super::parallel::SuiteScheduler;
use crate::config::RunConfig;
use crate::engine::{Listeners, SuiteListener, TestSuite};
use crate::models::{DataSet, RunOutcome, SuiteDescriptor};
use crate::utils::Timer;

/// One suite instance selected to run
#[derive(Clone, Debug)]
pub struct PlannedSuite {
    /// Position in the plan, outcomes are reported in this order
    pub index: usize,
    /// Suite with disabled and filtered-out tests removed
    pub descriptor: SuiteDescriptor,
    pub data_set: Option<DataSet>,
}

impl PlannedSuite {
    pub fn full_name(&self) -> String {
        match &self.data_set {
            Some(data_set) => format!("{}[{}]", self.descriptor.name, data_set.name),
            None => self.descriptor.name.clone(),
        }
    }

    pub(crate) fn instantiate(&self, config: Arc<RunConfig>, listeners: Listeners) -> TestSuite {
        TestSuite::new(&self.descriptor, self.data_set.as_ref(), config, listeners)
    }
}

/// A test that would run, as reported by [`Runner::list`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TestInfo {
    /// `Suite.method`, the name test masks are matched against
    pub full_name: String,
    pub display_name: String,
    pub method_name: String,
    pub suite_name: String,
}

/// Entry point of a run: filters, plans and executes suites
pub struct Runner {
    config: Arc<RunConfig>,
    listeners: Listeners,
}

impl Runner {
    pub fn new(config: Arc<RunConfig>) -> Self {
        Self {
            config,
            listeners: Listeners::new(),
        }
    }

    /// Register a listener for every suite of the run
    pub fn with_listener(mut self, listener: Arc<dyn SuiteListener>) -> Self {
        self.listeners.register(listener);
        self
    }

    pub fn with_listeners(mut self, listeners: Listeners) -> Self {
        self.listeners = listeners;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Apply tag, category and mask filters and expand parameterized suites.
    /// Suites left without tests are not planned.
    pub fn plan(&self, suites: &[SuiteDescriptor]) -> Vec<PlannedSuite> {
        let mut planned = Vec::new();

        for suite in suites {
            if !self.config.suite_tags_match(&suite.normalized_tags()) {
                debug!("Suite '{}' filtered out by tags", suite.name);
                continue;
            }

            let mut filtered = suite.clone();
            filtered.tests.retain(|test| {
                if let Some(reason) = &test.disabled {
                    debug!("Test '{}.{}' is disabled: {}", suite.name, test.name, reason);
                    return false;
                }
                self.config.categories_match(&test.categories)
                    && self
                        .config
                        .name_matches(&format!("{}.{}", suite.name, test.name))
            });

            if filtered.tests.is_empty() {
                debug!("Suite '{}' has no tests to run", suite.name);
                continue;
            }

            if filtered.data_sets.is_empty() {
                planned.push(PlannedSuite {
                    index: planned.len(),
                    descriptor: filtered,
                    data_set: None,
                });
            } else {
                for data_set in &suite.data_sets {
                    planned.push(PlannedSuite {
                        index: planned.len(),
                        descriptor: filtered.clone(),
                        data_set: Some(data_set.clone()),
                    });
                }
            }
        }

        planned
    }

    /// Tests the plan would run, without running anything
    pub fn list(&self, suites: &[SuiteDescriptor]) -> Vec<TestInfo> {
        self.plan(suites)
            .iter()
            .flat_map(|planned| {
                let suite = planned.instantiate(self.config.clone(), Listeners::new());
                let suite_name = suite.full_name();
                suite
                    .tests()
                    .iter()
                    .map(|test| TestInfo {
                        full_name: test.outcome().full_method_name.clone(),
                        display_name: test.title().to_string(),
                        method_name: test.method_name().to_string(),
                        suite_name: suite_name.clone(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Run every planned suite and collect the outcomes in plan order
    pub async fn run(&self, suites: Vec<SuiteDescriptor>) -> RunOutcome {
        let started_at = Utc::now();
        let timer = Timer::start("run");

        for line in self.config.info().lines() {
            info!("{}", line);
        }

        let planned = self.plan(&suites);
        info!(
            "Planned {} suite(s) out of {} discovered",
            planned.len(),
            suites.len()
        );

        let scheduler = SuiteScheduler::new(self.config.clone(), self.listeners.clone());
        let outcomes = scheduler.schedule(planned).await;

        let run = RunOutcome::new(started_at, outcomes, timer.stop());
        info!(
            "Run completed in {}ms - {}: {}/{} passed, {} failed, {} skipped ({:.1}%)",
            run.execution_time.as_millis(),
            run.result(),
            run.passed(),
            run.total(),
            run.failed(),
            run.skipped(),
            run.pass_rate()
        );
        run
    }
}
