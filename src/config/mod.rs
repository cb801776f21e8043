//! Run configuration
//!
//! Timeouts, parallelization policy, dependency policy and name filters.
//! A `RunConfig` is built before a run and shared read-only (`Arc`) during it.

mod env;
mod file;
mod mask;

pub use env::{print_env_help, EnvBuilder, EnvConfig, EnvGuard, ENV_PREFIX};
pub use file::{find_config_file, ConfigFile};
pub use mask::TestMask;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Default per-test timeout
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Default whole-suite budget
pub const DEFAULT_SUITE_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Configuration load failures. These abort the run before any suite executes.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Unknown {field} '{value}'. Available values are: {expected}")]
    UnknownVariant {
        field: &'static str,
        value: String,
        expected: String,
    },

    #[error("Invalid {field} '{value}': {reason}")]
    InvalidValue {
        field: &'static str,
        value: String,
        reason: String,
    },
}

/// Granularity at which the runner spreads work across workers
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParallelBy {
    /// Whole suite groups per worker
    #[default]
    Assembly,
    /// One suite per worker at a time
    Suite,
    /// Tests of one suite spread across workers
    Test,
}

impl ParallelBy {
    pub fn all() -> [ParallelBy; 3] {
        [ParallelBy::Assembly, ParallelBy::Suite, ParallelBy::Test]
    }

    pub fn name(&self) -> &'static str {
        match self {
            ParallelBy::Assembly => "Assembly",
            ParallelBy::Suite => "Suite",
            ParallelBy::Test => "Test",
        }
    }
}

impl fmt::Display for ParallelBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ParallelBy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_variant("parallelization mode", s, &ParallelBy::all(), ParallelBy::name)
    }
}

/// What happens to a test whose dependency did not pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TestsDependency {
    /// Record the dependent test as skipped
    Skip,
    /// Leave the dependent test out of the outcome entirely
    DoNotRun,
    /// Run the dependent test anyway
    #[default]
    Run,
}

impl TestsDependency {
    pub fn all() -> [TestsDependency; 3] {
        [
            TestsDependency::Skip,
            TestsDependency::DoNotRun,
            TestsDependency::Run,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            TestsDependency::Skip => "Skip",
            TestsDependency::DoNotRun => "DoNotRun",
            TestsDependency::Run => "Run",
        }
    }
}

impl fmt::Display for TestsDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for TestsDependency {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_variant("dependent tests policy", s, &TestsDependency::all(), TestsDependency::name)
    }
}

fn parse_variant<T: Copy>(
    field: &'static str,
    value: &str,
    variants: &[T],
    name: fn(&T) -> &'static str,
) -> Result<T, ConfigError> {
    let wanted = value.trim();
    variants
        .iter()
        .find(|v| name(v).eq_ignore_ascii_case(wanted))
        .copied()
        .ok_or_else(|| ConfigError::UnknownVariant {
            field,
            value: value.to_string(),
            expected: variants.iter().map(name).collect::<Vec<_>>().join(","),
        })
}

/// Engine run parameters
#[derive(Clone, Debug)]
pub struct RunConfig {
    /// Time a single test may take
    pub test_timeout: Duration,

    /// Time budget of a whole suite
    pub suite_timeout: Duration,

    /// Parallelization granularity
    pub parallel_by: ParallelBy,

    /// Number of workers, never below 1
    pub threads: usize,

    /// Policy for tests whose dependency did not pass
    pub dependent_tests: TestsDependency,

    run_tags: BTreeSet<String>,
    run_categories: BTreeSet<String>,
    run_tests: Vec<TestMask>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            test_timeout: DEFAULT_TEST_TIMEOUT,
            suite_timeout: DEFAULT_SUITE_TIMEOUT,
            parallel_by: ParallelBy::default(),
            threads: 1,
            dependent_tests: TestsDependency::default(),
            run_tags: BTreeSet::new(),
            run_categories: BTreeSet::new(),
            run_tests: Vec::new(),
        }
    }
}

impl RunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_test_timeout(mut self, timeout: Duration) -> Self {
        self.test_timeout = timeout;
        self
    }

    pub fn with_suite_timeout(mut self, timeout: Duration) -> Self {
        self.suite_timeout = timeout;
        self
    }

    pub fn with_parallel_by(mut self, parallel_by: ParallelBy) -> Self {
        self.parallel_by = parallel_by;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    pub fn with_dependent_tests(mut self, policy: TestsDependency) -> Self {
        self.dependent_tests = policy;
        self
    }

    /// Suite tags to run. Uppercased and trimmed; blanks are ignored.
    pub fn set_suite_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.run_tags = normalize(tags);
    }

    /// Test categories to run. Uppercased and trimmed; blanks are ignored.
    pub fn set_test_categories<I, S>(&mut self, categories: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.run_categories = normalize(categories);
    }

    /// Test name masks to run, see [`TestMask`]
    pub fn set_tests_masks<I, S>(&mut self, masks: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.run_tests = masks
            .into_iter()
            .filter(|m| !m.as_ref().trim().is_empty())
            .filter_map(|m| match TestMask::new(m.as_ref()) {
                Ok(mask) => Some(mask),
                Err(e) => {
                    warn!("Ignoring test mask '{}': {}", m.as_ref(), e);
                    None
                }
            })
            .collect();
    }

    pub fn run_tags(&self) -> &BTreeSet<String> {
        &self.run_tags
    }

    pub fn run_categories(&self) -> &BTreeSet<String> {
        &self.run_categories
    }

    pub fn run_tests(&self) -> &[TestMask] {
        &self.run_tests
    }

    /// Restore every field to its default
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Suite passes the tag filter when no tags are set or any tag matches
    pub fn suite_tags_match(&self, suite_tags: &[String]) -> bool {
        self.run_tags.is_empty()
            || suite_tags
                .iter()
                .any(|t| self.run_tags.contains(&t.trim().to_uppercase()))
    }

    /// Test passes the category filter when no categories are set or any matches
    pub fn categories_match(&self, categories: &[String]) -> bool {
        self.run_categories.is_empty()
            || categories
                .iter()
                .any(|c| self.run_categories.contains(&c.trim().to_uppercase()))
    }

    /// Test passes the mask filter when no masks are set or any mask matches
    pub fn name_matches(&self, full_name: &str) -> bool {
        self.run_tests.is_empty() || self.run_tests.iter().any(|m| m.is_match(full_name))
    }

    /// Readable description of the run configuration
    pub fn info(&self) -> String {
        const DELIMITER: &str = ",";

        let tags: Vec<&str> = self.run_tags.iter().map(String::as_str).collect();
        let categories: Vec<&str> = self.run_categories.iter().map(String::as_str).collect();
        let masks: Vec<&str> = self.run_tests.iter().map(TestMask::source).collect();

        let mut info = String::new();
        info.push_str(&format!("Tags to run: {}\n", tags.join(DELIMITER)));
        info.push_str(&format!("Categories to run: {}\n", categories.join(DELIMITER)));
        info.push_str(&format!("Tests filter: {}\n", masks.join(DELIMITER)));
        info.push_str(&format!(
            "Parallel by '{}' to '{}' thread(s)\n",
            self.parallel_by, self.threads
        ));
        info.push_str(&format!("Dependent tests: '{}'\n", self.dependent_tests));
        info.push_str(&format!("Test run timeout: {:?}\n", self.test_timeout));
        info.push_str(&format!("Suite run timeout: {:?}\n", self.suite_timeout));
        info
    }
}

fn normalize<I, S>(values: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .map(|v| v.as_ref().trim().to_uppercase())
        .filter(|v| !v.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RunConfig::default();
        assert_eq!(config.test_timeout, Duration::from_secs(900));
        assert_eq!(config.suite_timeout, Duration::from_secs(3600));
        assert_eq!(config.parallel_by, ParallelBy::Assembly);
        assert_eq!(config.threads, 1);
        assert_eq!(config.dependent_tests, TestsDependency::Run);
        assert!(config.run_tags().is_empty());
        assert!(config.run_categories().is_empty());
        assert!(config.run_tests().is_empty());
    }

    #[test]
    fn test_set_suite_tags_normalizes() {
        let mut config = RunConfig::default();
        config.set_suite_tags([" smoke", "Regression ", "  ", ""]);
        let tags: Vec<_> = config.run_tags().iter().cloned().collect();
        assert_eq!(tags, ["REGRESSION", "SMOKE"]);

        config.set_suite_tags(["api"]);
        assert_eq!(config.run_tags().len(), 1);
        assert!(config.run_tags().contains("API"));
    }

    #[test]
    fn test_set_test_categories_normalizes() {
        let mut config = RunConfig::default();
        config.set_test_categories(["ui", " Ui", "backend"]);
        assert_eq!(config.run_categories().len(), 2);
        assert!(config.categories_match(&["UI".to_string()]));
        assert!(config.categories_match(&["backend".to_string()]));
        assert!(!config.categories_match(&["perf".to_string()]));
        assert!(!config.categories_match(&[]));
    }

    #[test]
    fn test_set_tests_masks() {
        let mut config = RunConfig::default();
        config.set_tests_masks(["Suite1.Test~", " "]);
        assert_eq!(config.run_tests().len(), 1);
        assert!(config.name_matches("Suite1.TestLogin"));
        assert!(!config.name_matches("Suite2.TestLogin"));
    }

    #[test]
    fn test_empty_filters_match_everything() {
        let config = RunConfig::default();
        assert!(config.suite_tags_match(&[]));
        assert!(config.categories_match(&[]));
        assert!(config.name_matches("Any.Thing"));
    }

    #[test]
    fn test_reset_restores_defaults() {
        let mut config = RunConfig::default()
            .with_threads(8)
            .with_parallel_by(ParallelBy::Test)
            .with_dependent_tests(TestsDependency::Skip)
            .with_test_timeout(Duration::from_secs(1));
        config.set_suite_tags(["smoke"]);
        config.set_tests_masks(["A.~"]);

        config.reset();

        assert_eq!(config.threads, 1);
        assert_eq!(config.parallel_by, ParallelBy::Assembly);
        assert_eq!(config.dependent_tests, TestsDependency::Run);
        assert_eq!(config.test_timeout, DEFAULT_TEST_TIMEOUT);
        assert!(config.run_tags().is_empty());
        assert!(config.run_tests().is_empty());
    }

    #[test]
    fn test_threads_never_zero() {
        let config = RunConfig::default().with_threads(0);
        assert_eq!(config.threads, 1);
    }

    #[test]
    fn test_enum_parsing_is_case_insensitive() {
        assert_eq!("suite".parse::<ParallelBy>().unwrap(), ParallelBy::Suite);
        assert_eq!(" TEST ".parse::<ParallelBy>().unwrap(), ParallelBy::Test);
        assert_eq!(
            "donotrun".parse::<TestsDependency>().unwrap(),
            TestsDependency::DoNotRun
        );
    }

    #[test]
    fn test_unknown_enum_lists_options() {
        let err = "Class".parse::<ParallelBy>().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("'Class'"));
        assert!(message.contains("Assembly,Suite,Test"));
    }

    #[test]
    fn test_info_mentions_policy() {
        let mut config = RunConfig::default().with_threads(4).with_parallel_by(ParallelBy::Suite);
        config.set_suite_tags(["smoke"]);
        let info = config.info();
        assert!(info.contains("Tags to run: SMOKE"));
        assert!(info.contains("Parallel by 'Suite' to '4' thread(s)"));
        assert!(info.contains("Dependent tests: 'Run'"));
    }
}
