//! Suite orchestration
//!
//! A `TestSuite` owns the hooks and tests of one suite instance and drives
//! them through the suite lifecycle:
//!
//! ```text
//! Created -> StartingHooks -> RunningTests -> FinishingHooks -> Done
//! Created -> SkippedAll -> Done                   (start listener failed)
//! StartingHooks -> SkippedAll -> FinishingHooks   (BeforeSuite failed)
//! ```
//!
//! Everything raised by user code is captured into outcomes; `execute` never
//! fails.

use futures::future::join_all;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::listener::{Listeners, SuiteEvent};
use super::suite_method::SuiteMethod;
use super::test::Test;
use crate::config::{ParallelBy, RunConfig, TestsDependency};
use crate::models::{
    DataSet, Failure, Invocation, Status, SuiteDescriptor, SuiteMethodOutcome, SuiteMethodType,
    SuiteOutcome, TestOutcome,
};
use crate::utils::{Deadline, Timer};

/// Lifecycle state of a suite
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SuiteState {
    Created,
    StartingHooks,
    RunningTests,
    SkippedAll,
    FinishingHooks,
    Done,
}

impl fmt::Display for SuiteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Method names with the status they ended in, in processing order
type History = Vec<(String, Status)>;

/// One suite instance: hooks, tests and the outcome being filled in
pub struct TestSuite {
    config: Arc<RunConfig>,
    listeners: Listeners,
    tags: Vec<String>,
    metadata: BTreeMap<String, String>,
    invocation: Invocation,
    before_suites: Vec<SuiteMethod>,
    before_tests: Vec<SuiteMethod>,
    after_tests: Vec<SuiteMethod>,
    after_suites: Vec<SuiteMethod>,
    tests: Vec<Test>,
    skip_tests: bool,
    state: SuiteState,
    outcome: SuiteOutcome,
}

impl TestSuite {
    /// Build a suite instance. `data_set` selects the instance of a parameterized suite.
    pub fn new(
        descriptor: &SuiteDescriptor,
        data_set: Option<&DataSet>,
        config: Arc<RunConfig>,
        listeners: Listeners,
    ) -> Self {
        let outcome = SuiteOutcome::new(&descriptor.name, data_set.map(|d| d.name.clone()));
        let suite_id = outcome.id;

        let hooks_of = |kind: SuiteMethodType| -> Vec<SuiteMethod> {
            descriptor
                .hooks
                .iter()
                .filter(|h| h.kind == kind)
                .map(|h| SuiteMethod::new(h, suite_id))
                .collect()
        };

        let tests = descriptor
            .tests
            .iter()
            .flat_map(|t| {
                if t.data_sets.is_empty() {
                    vec![Test::new(t, None, &descriptor.name, suite_id)]
                } else {
                    t.data_sets
                        .iter()
                        .map(|d| Test::new(t, Some(d), &descriptor.name, suite_id))
                        .collect()
                }
            })
            .collect();

        let invocation = Invocation {
            suite_name: descriptor.name.clone(),
            data_set_name: data_set.map(|d| d.name.clone()),
            suite_args: data_set.map(|d| d.params.clone()).unwrap_or_default(),
            ..Default::default()
        };

        Self {
            config,
            listeners,
            tags: descriptor.normalized_tags(),
            metadata: descriptor.metadata.clone(),
            invocation,
            before_suites: hooks_of(SuiteMethodType::BeforeSuite),
            before_tests: hooks_of(SuiteMethodType::BeforeTest),
            after_tests: hooks_of(SuiteMethodType::AfterTest),
            after_suites: hooks_of(SuiteMethodType::AfterSuite),
            tests,
            skip_tests: false,
            state: SuiteState::Created,
            outcome,
        }
    }

    pub fn name(&self) -> &str {
        &self.outcome.name
    }

    /// Name with the data set in brackets for parameterized suites
    pub fn full_name(&self) -> String {
        self.outcome.full_name()
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn tests(&self) -> &[Test] {
        &self.tests
    }

    pub fn hooks(&self, kind: SuiteMethodType) -> &[SuiteMethod] {
        match kind {
            SuiteMethodType::BeforeSuite => &self.before_suites,
            SuiteMethodType::BeforeTest => &self.before_tests,
            SuiteMethodType::AfterTest => &self.after_tests,
            SuiteMethodType::AfterSuite => &self.after_suites,
        }
    }

    pub fn state(&self) -> SuiteState {
        self.state
    }

    pub fn outcome(&self) -> &SuiteOutcome {
        &self.outcome
    }

    pub fn into_outcome(self) -> SuiteOutcome {
        self.outcome
    }

    /// Run the whole suite lifecycle on the calling task
    pub async fn execute(&mut self) -> &SuiteOutcome {
        if self.state != SuiteState::Created {
            warn!("Suite '{}' was already executed", self.full_name());
            return &self.outcome;
        }

        info!("==================== SUITE '{}' ====================", self.full_name());
        let timer = Timer::start(format!("suite {}", self.full_name()));

        match self.listeners.notify(SuiteEvent::Start, self) {
            Ok(()) => self.run_suite().await,
            Err(reason) => self.skip_all(format!(
                "Exception occurred during {} event invoke: {}",
                SuiteEvent::Start,
                reason
            )),
        }

        // Failures are logged by the registry and do not affect the suite.
        let _ = self.listeners.notify(SuiteEvent::Finish, self);

        self.outcome.execution_time = timer.stop();
        self.transition(SuiteState::Done);
        info!("SUITE '{}' {}", self.full_name(), self.outcome.result);

        &self.outcome
    }

    async fn run_suite(&mut self) {
        let deadline = Deadline::after(self.config.suite_timeout);

        self.transition(SuiteState::StartingHooks);
        let limit = deadline.limit(self.config.test_timeout);
        let started = run_hooks(
            &mut self.before_suites,
            &self.invocation,
            &deadline,
            limit,
            &mut self.outcome.suite_methods,
        )
        .await;

        if started {
            self.transition(SuiteState::RunningTests);
            if self.config.parallel_by == ParallelBy::Test && self.config.threads > 1 {
                self.run_tests_parallel(&deadline).await;
            } else {
                self.run_tests_serial(&deadline).await;
            }
        } else {
            self.skip_all("BeforeSuite hook failed".to_string());
        }

        self.transition(SuiteState::FinishingHooks);
        for method in &mut self.after_suites {
            method
                .execute(&self.invocation, self.config.test_timeout)
                .await;
            self.outcome.suite_methods.push(method.outcome().clone());
        }
    }

    /// Mark every test skipped without running anything and raise the skip event
    fn skip_all(&mut self, reason: String) {
        self.transition(SuiteState::SkippedAll);
        warn!("Suite '{}' skipped: {}", self.full_name(), reason);

        for test in &mut self.tests {
            test.skip(reason.clone());
            self.outcome.tests.push(test.outcome().clone());
        }

        self.outcome.result = Status::Skipped;
        self.outcome.skip_reason = Some(reason);

        let _ = self.listeners.notify(SuiteEvent::Skip, self);
    }

    async fn run_tests_serial(&mut self, deadline: &Deadline) {
        let mut history = History::new();

        for index in 0..self.tests.len() {
            if let Some(reason) = self.dependency_skip(&self.tests[index], &history) {
                let test = &mut self.tests[index];
                if self.config.dependent_tests == TestsDependency::Skip {
                    test.skip(reason);
                    self.outcome.tests.push(test.outcome().clone());
                } else {
                    info!("TEST '{}' not run: {}", test.title(), reason);
                }
                history.push((test.method_name().to_string(), Status::Skipped));
                continue;
            }

            let test = &mut self.tests[index];

            if self.skip_tests {
                test.skip("Skipped after an AfterTest hook failure");
            } else {
                let report = run_unit(
                    test,
                    &mut self.before_tests,
                    &mut self.after_tests,
                    &self.invocation,
                    &self.config,
                    deadline,
                )
                .await;

                self.outcome.suite_methods.extend(report.hook_outcomes);
                if report.skip_remaining {
                    self.skip_tests = true;
                }
            }

            if test.outcome().result == Status::Failed {
                self.outcome.result = Status::Failed;
            }
            history.push((test.method_name().to_string(), test.outcome().result));
            self.outcome.tests.push(test.outcome().clone());
        }
    }

    /// Dispatch tests to up to `threads` concurrent workers. Dependencies are
    /// resolved against tests that completed before dispatch.
    async fn run_tests_parallel(&mut self, deadline: &Deadline) {
        let semaphore = Arc::new(Semaphore::new(self.config.threads));
        let history: Arc<Mutex<History>> = Arc::new(Mutex::new(History::new()));
        let mut slots: Vec<Option<TestOutcome>> = vec![None; self.tests.len()];
        let mut handles = Vec::new();

        for index in 0..self.tests.len() {
            let permit = semaphore.clone().acquire_owned().await.ok();

            let completed = lock_history(&history).clone();
            if let Some(reason) = self.dependency_skip(&self.tests[index], &completed) {
                let test = &mut self.tests[index];
                if self.config.dependent_tests == TestsDependency::Skip {
                    test.skip(reason);
                    slots[index] = Some(test.outcome().clone());
                } else {
                    info!("TEST '{}' not run: {}", test.title(), reason);
                }
                lock_history(&history).push((test.method_name().to_string(), Status::Skipped));
                continue;
            }

            let mut test = self.tests[index].clone();
            let mut before_tests = self.before_tests.clone();
            let mut after_tests = self.after_tests.clone();
            let invocation = self.invocation.clone();
            let config = self.config.clone();
            let deadline = *deadline;
            let history = history.clone();

            debug!("Dispatching TEST '{}' to a worker", test.title());
            handles.push((
                index,
                tokio::spawn(async move {
                    let _permit = permit;
                    let report = run_unit(
                        &mut test,
                        &mut before_tests,
                        &mut after_tests,
                        &invocation,
                        &config,
                        &deadline,
                    )
                    .await;
                    lock_history(&history)
                        .push((test.method_name().to_string(), test.outcome().result));
                    (test, report)
                }),
            ));
        }

        let (indexes, tasks): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
        for (index, joined) in indexes.into_iter().zip(join_all(tasks).await) {
            match joined {
                Ok((test, report)) => {
                    self.outcome.suite_methods.extend(report.hook_outcomes);
                    self.tests[index] = test;
                }
                Err(e) => self.tests[index].fail(Failure::panic(e.to_string())),
            }
            slots[index] = Some(self.tests[index].outcome().clone());
        }

        for outcome in slots.into_iter().flatten() {
            if outcome.result == Status::Failed {
                self.outcome.result = Status::Failed;
            }
            self.outcome.tests.push(outcome);
        }
    }

    /// Reason to hold `test` back when a test it depends on did not pass.
    /// Only tests already processed are considered; `Run` policy never holds back.
    fn dependency_skip(&self, test: &Test, history: &History) -> Option<String> {
        let dependency = test.depends_on()?;
        let failed = history
            .iter()
            .any(|(name, status)| name == dependency && *status != Status::Passed);

        if !failed {
            return None;
        }
        if self.config.dependent_tests == TestsDependency::Run {
            debug!(
                "TEST '{}' runs although dependency '{}' did not pass",
                test.title(),
                dependency
            );
            return None;
        }
        Some(format!("Dependency '{dependency}' did not pass"))
    }

    fn transition(&mut self, next: SuiteState) {
        debug!("Suite '{}': {} -> {}", self.outcome.name, self.state, next);
        self.state = next;
    }
}

/// What running one test with its BeforeTest/AfterTest hooks produced
struct UnitReport {
    hook_outcomes: Vec<SuiteMethodOutcome>,
    /// An AfterTest hook asked to skip the rest of the suite
    skip_remaining: bool,
}

/// BeforeTest chain, test body, AfterTest hooks
async fn run_unit(
    test: &mut Test,
    before_tests: &mut [SuiteMethod],
    after_tests: &mut [SuiteMethod],
    invocation: &Invocation,
    config: &RunConfig,
    deadline: &Deadline,
) -> UnitReport {
    let mut report = UnitReport {
        hook_outcomes: Vec::new(),
        skip_remaining: false,
    };

    if deadline.expired() {
        test.fail(Failure::suite_timeout(deadline.budget()));
        return report;
    }

    let limit = deadline.limit(config.test_timeout);
    if !run_hooks(before_tests, invocation, deadline, limit, &mut report.hook_outcomes).await {
        test.skip("BeforeTest hook failed");
        return report;
    }

    if deadline.expired() {
        test.fail(Failure::suite_timeout(deadline.budget()));
        return report;
    }

    let test_failed = test
        .execute(invocation, deadline.limit(config.test_timeout))
        .await
        == Status::Failed;

    for method in after_tests.iter_mut() {
        if test_failed && !method.run_always() {
            debug!(
                "AfterTest chain stopped at '{}' for failed test '{}'",
                method.name(),
                test.title()
            );
            break;
        }

        let status = method.execute(invocation, config.test_timeout).await;
        report.hook_outcomes.push(method.outcome().clone());

        if status == Status::Failed
            && method.skip_tests_on_fail()
            && config.parallel_by != ParallelBy::Test
        {
            report.skip_remaining = true;
        }
    }

    report
}

/// Run hooks in order, stopping at the first one that does not pass
async fn run_hooks(
    methods: &mut [SuiteMethod],
    invocation: &Invocation,
    deadline: &Deadline,
    limit: Duration,
    records: &mut Vec<SuiteMethodOutcome>,
) -> bool {
    for method in methods.iter_mut() {
        let status = if deadline.expired() {
            method.fail(Failure::suite_timeout(deadline.budget()));
            Status::Failed
        } else {
            method.execute(invocation, limit.min(deadline.remaining())).await
        };
        records.push(method.outcome().clone());

        if status != Status::Passed {
            return false;
        }
    }
    true
}

fn lock_history(history: &Mutex<History>) -> std::sync::MutexGuard<'_, History> {
    history.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
