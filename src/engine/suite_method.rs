//! Lifecycle hook execution unit

use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use super::invoke::run_guarded;
use crate::models::{
    Failure, HookDescriptor, Invocation, MethodBody, Status, SuiteMethodOutcome, SuiteMethodType,
};

/// One BeforeSuite/BeforeTest/AfterTest/AfterSuite hook of a suite
#[derive(Clone)]
pub struct SuiteMethod {
    name: String,
    method_type: SuiteMethodType,
    run_always: bool,
    skip_tests_on_fail: bool,
    body: MethodBody,
    parent_id: Uuid,
    outcome: SuiteMethodOutcome,
}

impl SuiteMethod {
    pub fn new(hook: &HookDescriptor, parent_id: Uuid) -> Self {
        Self {
            name: hook.name.clone(),
            method_type: hook.kind,
            run_always: hook.run_always,
            skip_tests_on_fail: hook.skip_tests_on_fail,
            body: hook.body.clone(),
            parent_id,
            outcome: SuiteMethodOutcome::new(&hook.name, parent_id, hook.kind),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn method_type(&self) -> SuiteMethodType {
        self.method_type
    }

    pub fn run_always(&self) -> bool {
        self.run_always
    }

    pub fn skip_tests_on_fail(&self) -> bool {
        self.skip_tests_on_fail
    }

    /// Outcome of the latest execution
    pub fn outcome(&self) -> &SuiteMethodOutcome {
        &self.outcome
    }

    /// Run the hook body under `timeout` and record a fresh outcome
    pub async fn execute(&mut self, base: &Invocation, timeout: Duration) -> Status {
        self.outcome = SuiteMethodOutcome::new(&self.name, self.parent_id, self.method_type);

        let invocation = Invocation {
            method_name: self.name.clone(),
            args: Vec::new(),
            ..base.clone()
        };

        debug!("{} '{}' started", self.method_type, self.name);
        let execution = run_guarded(self.body.clone(), invocation, timeout).await;

        self.outcome.result = execution.result;
        self.outcome.execution_time = execution.elapsed;
        self.outcome.started_at = Some(execution.started_at);
        self.outcome.failure = execution.failure;

        match &self.outcome.failure {
            Some(failure) => warn!("{} '{}' FAILED: {}", self.method_type, self.name, failure),
            None => debug!("{} '{}' {}", self.method_type, self.name, self.outcome.result),
        }

        self.outcome.result
    }

    /// Record a failure without running the body
    pub fn fail(&mut self, failure: Failure) {
        self.outcome = SuiteMethodOutcome::new(&self.name, self.parent_id, self.method_type);
        warn!("{} '{}' FAILED: {}", self.method_type, self.name, failure);
        self.outcome.result = Status::Failed;
        self.outcome.failure = Some(failure);
    }
}
