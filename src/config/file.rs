//! Configuration file management
//!
//! Finds and loads run configuration documents (JSON, or YAML by extension).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use super::{ConfigError, ParallelBy, RunConfig, TestsDependency};

/// Configuration file locations (in order of precedence)
const CONFIG_LOCATIONS: &[&str] = &[
    "./suite-engine.json",
    "./suite-engine.yaml",
    "./suite-engine.yml",
    "./.suite-engine.json",
    "~/.config/suite-engine/config.json",
    "~/.config/suite-engine/config.yaml",
];

/// On-disk shape of the run configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    /// Per-test timeout in minutes
    #[serde(default = "default_test_timeout")]
    pub test_timeout: f64,

    /// Suite budget in minutes
    #[serde(default = "default_suite_timeout")]
    pub suite_timeout: f64,

    /// Parallelization mode name
    #[serde(default = "default_parallel")]
    pub parallel: String,

    #[serde(default = "default_threads")]
    pub threads: usize,

    /// Dependent tests policy name
    #[serde(default = "default_tests_dependency")]
    pub tests_dependency: String,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub categories: Vec<String>,

    #[serde(default)]
    pub tests: Vec<String>,
}

fn default_test_timeout() -> f64 {
    15.0
}

fn default_suite_timeout() -> f64 {
    60.0
}

fn default_parallel() -> String {
    ParallelBy::default().name().to_string()
}

fn default_threads() -> usize {
    1
}

fn default_tests_dependency() -> String {
    TestsDependency::default().name().to_string()
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            test_timeout: default_test_timeout(),
            suite_timeout: default_suite_timeout(),
            parallel: default_parallel(),
            threads: default_threads(),
            tests_dependency: default_tests_dependency(),
            tags: Vec::new(),
            categories: Vec::new(),
            tests: Vec::new(),
        }
    }
}

impl ConfigFile {
    /// Load and parse a configuration document
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let parse_error = |message: String| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        };

        let file: Self = if is_yaml_file(path) {
            serde_yaml::from_str(&content).map_err(|e| parse_error(e.to_string()))?
        } else {
            serde_json::from_str(&content).map_err(|e| parse_error(e.to_string()))?
        };

        debug!("Loaded run configuration from {}", path.display());
        Ok(file)
    }

    /// Save configuration document, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        use anyhow::Context;

        let path = path.as_ref();
        let content = if is_yaml_file(path) {
            serde_yaml::to_string(self).context("Failed to serialize config")?
        } else {
            serde_json::to_string_pretty(self).context("Failed to serialize config")?
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Copy the document into a run configuration, validating every field
    pub fn apply(&self, config: &mut RunConfig) -> Result<(), ConfigError> {
        let test_timeout = minutes("test timeout", self.test_timeout)?;
        let suite_timeout = minutes("suite timeout", self.suite_timeout)?;
        let parallel_by: ParallelBy = self.parallel.parse()?;
        let dependent_tests: TestsDependency = self.tests_dependency.parse()?;

        if self.threads == 0 {
            return Err(ConfigError::InvalidValue {
                field: "threads",
                value: self.threads.to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        config.test_timeout = test_timeout;
        config.suite_timeout = suite_timeout;
        config.parallel_by = parallel_by;
        config.threads = self.threads;
        config.dependent_tests = dependent_tests;
        config.set_suite_tags(&self.tags);
        config.set_test_categories(&self.categories);
        config.set_tests_masks(&self.tests);
        Ok(())
    }

    /// Document describing a configuration
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            test_timeout: config.test_timeout.as_secs_f64() / 60.0,
            suite_timeout: config.suite_timeout.as_secs_f64() / 60.0,
            parallel: config.parallel_by.name().to_string(),
            threads: config.threads,
            tests_dependency: config.dependent_tests.name().to_string(),
            tags: config.run_tags().iter().cloned().collect(),
            categories: config.run_categories().iter().cloned().collect(),
            tests: config
                .run_tests()
                .iter()
                .map(|m| m.source().to_string())
                .collect(),
        }
    }

    /// Example document written by `config init`
    pub fn example() -> Self {
        Self {
            test_timeout: 5.0,
            suite_timeout: 30.0,
            parallel: ParallelBy::Suite.name().to_string(),
            threads: 4,
            tests_dependency: TestsDependency::Skip.name().to_string(),
            tags: vec!["smoke".to_string()],
            categories: Vec::new(),
            tests: vec!["Checkout.~".to_string()],
        }
    }
}

impl RunConfig {
    /// Build a configuration from a document
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.fill_from_file(path)?;
        Ok(config)
    }

    /// Overwrite this configuration from a document. On error nothing is changed.
    pub fn fill_from_file(&mut self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let file = ConfigFile::load(path)?;
        let mut updated = self.clone();
        file.apply(&mut updated)?;
        *self = updated;
        Ok(())
    }
}

/// Find a configuration file in the standard locations
pub fn find_config_file() -> Option<PathBuf> {
    CONFIG_LOCATIONS
        .iter()
        .map(|location| expand_path(location))
        .find(|path| path.exists())
}

fn minutes(field: &'static str, value: f64) -> Result<Duration, ConfigError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::InvalidValue {
            field,
            value: value.to_string(),
            reason: "must be a positive number of minutes".to_string(),
        });
    }
    Ok(Duration::from_secs_f64(value * 60.0))
}

/// Expand ~ to home directory
fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Check if file is YAML based on extension
fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_fill_from_json_file() {
        let dir = tempdir().unwrap();
        let path = write(
            dir.path(),
            "run.json",
            r#"{
                "testTimeout": 2,
                "suiteTimeout": 10,
                "parallel": "suite",
                "threads": 3,
                "testsDependency": "Skip",
                "tags": ["smoke", " api "],
                "categories": ["ui"],
                "tests": ["Suite1.Test~"]
            }"#,
        );

        let config = RunConfig::from_file(&path).unwrap();
        assert_eq!(config.test_timeout, Duration::from_secs(120));
        assert_eq!(config.suite_timeout, Duration::from_secs(600));
        assert_eq!(config.parallel_by, ParallelBy::Suite);
        assert_eq!(config.threads, 3);
        assert_eq!(config.dependent_tests, TestsDependency::Skip);
        assert!(config.run_tags().contains("API"));
        assert!(config.run_categories().contains("UI"));
        assert!(config.name_matches("Suite1.TestOne"));
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "run.json", "{}");
        let config = RunConfig::from_file(&path).unwrap();
        assert_eq!(config.parallel_by, ParallelBy::Assembly);
        assert_eq!(config.dependent_tests, TestsDependency::Run);
        assert_eq!(config.threads, 1);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let dir = tempdir().unwrap();
        let err = RunConfig::from_file(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "run.json", "{ not json");
        let err = RunConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_unknown_enum_case_is_config_error() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "run.json", r#"{ "parallel": "Method" }"#);
        let err = RunConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownVariant { .. }));

        let path = write(dir.path(), "dep.json", r#"{ "testsDependency": "Maybe" }"#);
        let err = RunConfig::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("Skip,DoNotRun,Run"));
    }

    #[test]
    fn test_failed_fill_leaves_config_untouched() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "run.json", r#"{ "threads": 6, "parallel": "nope" }"#);
        let mut config = RunConfig::default().with_threads(2);
        assert!(config.fill_from_file(&path).is_err());
        assert_eq!(config.threads, 2);
    }

    #[test]
    fn test_zero_threads_rejected() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "run.json", r#"{ "threads": 0 }"#);
        assert!(matches!(
            RunConfig::from_file(&path).unwrap_err(),
            ConfigError::InvalidValue { field: "threads", .. }
        ));
    }

    #[test]
    fn test_yaml_save_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("run.yaml");

        ConfigFile::example().save(&path).unwrap();
        let config = RunConfig::from_file(&path).unwrap();
        assert_eq!(config.parallel_by, ParallelBy::Suite);
        assert_eq!(config.threads, 4);
        assert_eq!(config.test_timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_from_config_round_trips_policy() {
        let mut config = RunConfig::default().with_parallel_by(ParallelBy::Test);
        config.set_tests_masks(["A.*"]);
        let file = ConfigFile::from_config(&config);
        assert_eq!(file.parallel, "Test");
        assert_eq!(file.tests, ["A.*"]);
        assert_eq!(file.test_timeout, 15.0);
    }

    #[test]
    fn test_expand_path() {
        let path = expand_path("./test.yaml");
        assert_eq!(path, PathBuf::from("./test.yaml"));
    }
}
