//! Outcome models for suite execution
//!
//! Defines statuses, failures and the suite/test/hook outcome records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

use super::descriptor::SuiteMethodType;

/// Execution status of a test, hook or suite
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Passed,
    Failed,
    Skipped,
}

impl Status {
    pub fn symbol(&self) -> &'static str {
        match self {
            Status::Passed => "✓",
            Status::Failed => "✗",
            Status::Skipped => "○",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Status::Passed)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Passed => write!(f, "PASSED"),
            Status::Failed => write!(f, "FAILED"),
            Status::Skipped => write!(f, "SKIPPED"),
        }
    }
}

/// What made an execution unit fail
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// User code returned an error
    Error,
    /// User code panicked
    Panic,
    /// User code did not finish within its time budget
    Timeout,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Error => write!(f, "error"),
            FailureKind::Panic => write!(f, "panic"),
            FailureKind::Timeout => write!(f, "timeout"),
        }
    }
}

/// Captured failure of a test or hook
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
    /// Full error chain or backtrace, when available
    pub details: Option<String>,
}

impl Failure {
    pub fn error(err: &anyhow::Error) -> Self {
        Self {
            kind: FailureKind::Error,
            message: err.to_string(),
            details: Some(format!("{err:?}")),
        }
    }

    pub fn panic(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Panic,
            message: message.into(),
            details: None,
        }
    }

    pub fn timeout(limit: Duration) -> Self {
        Self {
            kind: FailureKind::Timeout,
            message: format!("timed out after {}ms", limit.as_millis()),
            details: None,
        }
    }

    /// The suite budget ran out before the unit could start
    pub fn suite_timeout(budget: Duration) -> Self {
        Self {
            kind: FailureKind::Timeout,
            message: format!("suite timeout of {}ms exceeded", budget.as_millis()),
            details: None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == FailureKind::Timeout
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

/// Outcome of a single lifecycle hook execution
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SuiteMethodOutcome {
    pub id: Uuid,
    pub title: String,
    pub parent_id: Uuid,
    pub method_type: SuiteMethodType,
    pub result: Status,
    #[serde(with = "duration_ms")]
    pub execution_time: Duration,
    pub failure: Option<Failure>,
    pub started_at: Option<DateTime<Utc>>,
}

impl SuiteMethodOutcome {
    pub fn new(title: impl Into<String>, parent_id: Uuid, method_type: SuiteMethodType) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            parent_id,
            method_type,
            result: Status::Skipped,
            execution_time: Duration::ZERO,
            failure: None,
            started_at: None,
        }
    }
}

impl fmt::Display for SuiteMethodOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:?} '{}' [{}ms]",
            self.result.symbol(),
            self.method_type,
            self.title,
            self.execution_time.as_millis()
        )?;
        if let Some(failure) = &self.failure {
            write!(f, " - {failure}")?;
        }
        Ok(())
    }
}

/// Outcome of a single test execution
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TestOutcome {
    pub id: Uuid,
    pub title: String,
    /// `Suite.method` name used for mask filtering and dependency lookup
    pub full_method_name: String,
    pub parent_id: Uuid,
    pub result: Status,
    #[serde(with = "duration_ms")]
    pub execution_time: Duration,
    pub failure: Option<Failure>,
    pub skip_reason: Option<String>,
    pub categories: Vec<String>,
    pub author: Option<String>,
    pub bugs: Vec<String>,
    pub started_at: Option<DateTime<Utc>>,
}

impl TestOutcome {
    pub fn new(title: impl Into<String>, full_method_name: impl Into<String>, parent_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            full_method_name: full_method_name.into(),
            parent_id,
            result: Status::Skipped,
            execution_time: Duration::ZERO,
            failure: None,
            skip_reason: None,
            categories: Vec::new(),
            author: None,
            bugs: Vec::new(),
            started_at: None,
        }
    }

    pub fn timed_out(&self) -> bool {
        self.failure.as_ref().is_some_and(Failure::is_timeout)
    }
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{}ms]",
            self.result.symbol(),
            self.title,
            self.execution_time.as_millis()
        )?;
        if let Some(failure) = &self.failure {
            write!(f, " - {failure}")?;
        } else if let Some(reason) = &self.skip_reason {
            write!(f, " - {reason}")?;
        }
        Ok(())
    }
}

/// Outcome of a whole suite: its tests in execution order plus hook records
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SuiteOutcome {
    pub id: Uuid,
    pub name: String,
    pub data_set_name: Option<String>,
    /// Suites are roots of the outcome tree
    pub parent_id: Option<Uuid>,
    pub result: Status,
    #[serde(with = "duration_ms")]
    pub execution_time: Duration,
    pub tests: Vec<TestOutcome>,
    pub suite_methods: Vec<SuiteMethodOutcome>,
    pub skip_reason: Option<String>,
}

impl SuiteOutcome {
    pub fn new(name: impl Into<String>, data_set_name: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            data_set_name,
            parent_id: None,
            result: Status::Passed,
            execution_time: Duration::ZERO,
            tests: Vec::new(),
            suite_methods: Vec::new(),
            skip_reason: None,
        }
    }

    /// Suite name with the data set appended for parameterized suites
    pub fn full_name(&self) -> String {
        match &self.data_set_name {
            Some(data_set) if !data_set.is_empty() => format!("{}[{}]", self.name, data_set),
            _ => self.name.clone(),
        }
    }

    pub fn total(&self) -> usize {
        self.tests.len()
    }

    pub fn passed(&self) -> usize {
        self.count(Status::Passed)
    }

    pub fn failed(&self) -> usize {
        self.count(Status::Failed)
    }

    pub fn skipped(&self) -> usize {
        self.count(Status::Skipped)
    }

    pub fn pass_rate(&self) -> f64 {
        if self.tests.is_empty() {
            0.0
        } else {
            (self.passed() as f64 / self.total() as f64) * 100.0
        }
    }

    fn count(&self, status: Status) -> usize {
        self.tests.iter().filter(|t| t.result == status).count()
    }
}

impl fmt::Display for SuiteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Suite '{}' - {}", self.full_name(), self.result)?;
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        for test in &self.tests {
            writeln!(f, "  {test}")?;
        }
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        writeln!(
            f,
            "Total: {} | Passed: {} | Failed: {} | Skipped: {}",
            self.total(),
            self.passed(),
            self.failed(),
            self.skipped()
        )?;
        writeln!(
            f,
            "Pass Rate: {:.1}% | Duration: {}ms",
            self.pass_rate(),
            self.execution_time.as_millis()
        )
    }
}

/// Aggregated outcome of a whole run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunOutcome {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(with = "duration_ms")]
    pub execution_time: Duration,
    pub suites: Vec<SuiteOutcome>,
}

impl RunOutcome {
    pub fn new(started_at: DateTime<Utc>, suites: Vec<SuiteOutcome>, execution_time: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at,
            finished_at: Utc::now(),
            execution_time,
            suites,
        }
    }

    /// Failed if any suite failed, Skipped if every suite was skipped
    pub fn result(&self) -> Status {
        if self.suites.iter().any(|s| s.result == Status::Failed) {
            Status::Failed
        } else if !self.suites.is_empty() && self.suites.iter().all(|s| s.result == Status::Skipped) {
            Status::Skipped
        } else {
            Status::Passed
        }
    }

    pub fn total(&self) -> usize {
        self.suites.iter().map(SuiteOutcome::total).sum()
    }

    pub fn passed(&self) -> usize {
        self.suites.iter().map(SuiteOutcome::passed).sum()
    }

    pub fn failed(&self) -> usize {
        self.suites.iter().map(SuiteOutcome::failed).sum()
    }

    pub fn skipped(&self) -> usize {
        self.suites.iter().map(SuiteOutcome::skipped).sum()
    }

    pub fn pass_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            (self.passed() as f64 / total as f64) * 100.0
        }
    }

    pub fn suite(&self, name: &str) -> Option<&SuiteOutcome> {
        self.suites.iter().find(|s| s.name == name)
    }
}

/// Serialize durations as whole milliseconds
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
