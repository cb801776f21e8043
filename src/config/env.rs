//! Environment variable configuration
//!
//! Provides environment variable overrides for the run configuration.

use std::env;
use std::time::Duration;

use super::{ConfigError, RunConfig};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "SUITE_ENGINE";

/// Run configuration overrides read from environment variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// Config file from SUITE_ENGINE_CONFIG
    pub config_file: Option<String>,
    /// Worker count from SUITE_ENGINE_THREADS
    pub threads: Option<String>,
    /// Parallelization mode from SUITE_ENGINE_PARALLEL
    pub parallel: Option<String>,
    /// Dependent tests policy from SUITE_ENGINE_DEPENDENT_TESTS
    pub dependent_tests: Option<String>,
    /// Test timeout in minutes from SUITE_ENGINE_TEST_TIMEOUT
    pub test_timeout: Option<String>,
    /// Suite timeout in minutes from SUITE_ENGINE_SUITE_TIMEOUT
    pub suite_timeout: Option<String>,
    /// Comma-separated tags from SUITE_ENGINE_TAGS
    pub tags: Option<String>,
    /// Comma-separated categories from SUITE_ENGINE_CATEGORIES
    pub categories: Option<String>,
    /// Comma-separated test masks from SUITE_ENGINE_TESTS
    pub tests: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            config_file: get_env("CONFIG"),
            threads: get_env("THREADS"),
            parallel: get_env("PARALLEL"),
            dependent_tests: get_env("DEPENDENT_TESTS"),
            test_timeout: get_env("TEST_TIMEOUT"),
            suite_timeout: get_env("SUITE_TIMEOUT"),
            tags: get_env("TAGS"),
            categories: get_env("CATEGORIES"),
            tests: get_env("TESTS"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.config_file.is_some()
            || self.threads.is_some()
            || self.parallel.is_some()
            || self.dependent_tests.is_some()
            || self.test_timeout.is_some()
            || self.suite_timeout.is_some()
            || self.tags.is_some()
            || self.categories.is_some()
            || self.tests.is_some()
    }

    /// Apply the overrides that are set. On error nothing is changed.
    pub fn apply(&self, config: &mut RunConfig) -> Result<(), ConfigError> {
        let mut updated = config.clone();

        if let Some(threads) = &self.threads {
            updated.threads = parse_threads(threads)?;
        }
        if let Some(parallel) = &self.parallel {
            updated.parallel_by = parallel.parse()?;
        }
        if let Some(policy) = &self.dependent_tests {
            updated.dependent_tests = policy.parse()?;
        }
        if let Some(minutes) = &self.test_timeout {
            updated.test_timeout = parse_minutes("test timeout", minutes)?;
        }
        if let Some(minutes) = &self.suite_timeout {
            updated.suite_timeout = parse_minutes("suite timeout", minutes)?;
        }
        if let Some(tags) = &self.tags {
            updated.set_suite_tags(tags.split(','));
        }
        if let Some(categories) = &self.categories {
            updated.set_test_categories(categories.split(','));
        }
        if let Some(tests) = &self.tests {
            updated.set_tests_masks(tests.split(','));
        }

        *config = updated;
        Ok(())
    }

    /// Print current environment configuration
    pub fn print_summary(&self) {
        println!("Environment Configuration:");
        println!("  {}_CONFIG:          {:?}", ENV_PREFIX, self.config_file);
        println!("  {}_THREADS:         {:?}", ENV_PREFIX, self.threads);
        println!("  {}_PARALLEL:        {:?}", ENV_PREFIX, self.parallel);
        println!("  {}_DEPENDENT_TESTS: {:?}", ENV_PREFIX, self.dependent_tests);
        println!("  {}_TEST_TIMEOUT:    {:?}", ENV_PREFIX, self.test_timeout);
        println!("  {}_SUITE_TIMEOUT:   {:?}", ENV_PREFIX, self.suite_timeout);
        println!("  {}_TAGS:            {:?}", ENV_PREFIX, self.tags);
        println!("  {}_CATEGORIES:      {:?}", ENV_PREFIX, self.categories);
        println!("  {}_TESTS:           {:?}", ENV_PREFIX, self.tests);
    }
}

fn parse_threads(value: &str) -> Result<usize, ConfigError> {
    match value.trim().parse::<usize>() {
        Ok(threads) if threads > 0 => Ok(threads),
        _ => Err(ConfigError::InvalidValue {
            field: "threads",
            value: value.to_string(),
            reason: "must be a positive integer".to_string(),
        }),
    }
}

fn parse_minutes(field: &'static str, value: &str) -> Result<Duration, ConfigError> {
    match value.trim().parse::<f64>() {
        Ok(minutes) if minutes.is_finite() && minutes > 0.0 => {
            Ok(Duration::from_secs_f64(minutes * 60.0))
        }
        _ => Err(ConfigError::InvalidValue {
            field,
            value: value.to_string(),
            reason: "must be a positive number of minutes".to_string(),
        }),
    }
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}"))
        .ok()
        .filter(|v| !v.trim().is_empty())
}

/// Builder for setting environment variables (useful for testing)
pub struct EnvBuilder {
    vars: Vec<(String, String)>,
}

impl EnvBuilder {
    /// Create a new environment builder
    pub fn new() -> Self {
        Self { vars: Vec::new() }
    }

    /// Set any prefixed variable
    pub fn var(mut self, name: &str, value: impl Into<String>) -> Self {
        self.vars.push((format!("{ENV_PREFIX}_{name}"), value.into()));
        self
    }

    pub fn threads(self, threads: usize) -> Self {
        self.var("THREADS", threads.to_string())
    }

    pub fn parallel(self, mode: impl Into<String>) -> Self {
        self.var("PARALLEL", mode)
    }

    pub fn dependent_tests(self, policy: impl Into<String>) -> Self {
        self.var("DEPENDENT_TESTS", policy)
    }

    pub fn tags(self, tags: impl Into<String>) -> Self {
        self.var("TAGS", tags)
    }

    /// Apply environment variables
    pub fn apply(self) {
        for (key, value) in self.vars {
            env::set_var(key, value);
        }
    }

    /// Apply and return guard that restores on drop
    pub fn apply_scoped(self) -> EnvGuard {
        let previous: Vec<_> = self
            .vars
            .iter()
            .map(|(k, _)| (k.clone(), env::var(k).ok()))
            .collect();

        self.apply();

        EnvGuard { previous }
    }
}

impl Default for EnvBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard that restores environment variables on drop
pub struct EnvGuard {
    previous: Vec<(String, Option<String>)>,
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.previous {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
    }
}

/// Print all SUITE_ENGINE environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {ENV_PREFIX}_CONFIG           Path to configuration file");
    println!("  {ENV_PREFIX}_THREADS          Number of worker threads");
    println!("  {ENV_PREFIX}_PARALLEL         Parallelization mode (Assembly, Suite, Test)");
    println!("  {ENV_PREFIX}_DEPENDENT_TESTS  Dependent tests policy (Skip, DoNotRun, Run)");
    println!("  {ENV_PREFIX}_TEST_TIMEOUT     Test timeout in minutes");
    println!("  {ENV_PREFIX}_SUITE_TIMEOUT    Suite timeout in minutes");
    println!("  {ENV_PREFIX}_TAGS             Comma-separated suite tags");
    println!("  {ENV_PREFIX}_CATEGORIES       Comma-separated test categories");
    println!("  {ENV_PREFIX}_TESTS            Comma-separated test masks");
}
