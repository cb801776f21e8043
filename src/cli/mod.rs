//! CLI argument parsing
//!
//! Defines the command-line interface using clap and resolves the run
//! configuration from file, environment and flags.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::{find_config_file, EnvConfig, ParallelBy, RunConfig, TestsDependency};

/// Test suite orchestration engine
#[derive(Parser, Debug)]
#[command(name = "suite-engine")]
#[command(version)]
#[command(about = "Run test suites with lifecycle hooks, dependencies and parallel scheduling")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the suites
    Run(RunArgs),

    /// List the tests a run would execute
    List(ListArgs),

    /// View stored run results
    Results(ResultsArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

/// Configuration sources and overrides shared by `run` and `list`
#[derive(Parser, Debug, Default)]
pub struct OverrideArgs {
    /// Configuration file (JSON or YAML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Number of worker threads
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Parallelization mode (Assembly, Suite, Test)
    #[arg(short, long)]
    pub parallel: Option<String>,

    /// Dependent tests policy (Skip, DoNotRun, Run)
    #[arg(short, long)]
    pub dependency: Option<String>,

    /// Suite tags to run (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub tags: Option<Vec<String>>,

    /// Test categories to run (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub categories: Option<Vec<String>>,

    /// Test masks to run, `~` matches anything, `*` anything but a dot
    #[arg(long, value_delimiter = ',')]
    pub tests: Option<Vec<String>>,

    /// Test timeout in minutes
    #[arg(long)]
    pub test_timeout: Option<f64>,

    /// Suite timeout in minutes
    #[arg(long)]
    pub suite_timeout: Option<f64>,
}

impl OverrideArgs {
    /// Build the run configuration: defaults, then file, then environment, then flags
    pub fn resolve(&self) -> Result<RunConfig> {
        self.resolve_with(&EnvConfig::load())
    }

    /// [`resolve`](Self::resolve) with an already loaded environment
    pub fn resolve_with(&self, env: &EnvConfig) -> Result<RunConfig> {
        let mut config = RunConfig::default();

        let explicit = self
            .config
            .clone()
            .or_else(|| env.config_file.as_ref().map(PathBuf::from));
        match explicit.or_else(find_config_file) {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                config.fill_from_file(&path)?;
            }
            None => debug!("No configuration file found, using defaults"),
        }

        env.apply(&mut config)?;
        self.apply(&mut config)?;
        Ok(config)
    }

    /// Apply command-line flags on top of `config`
    pub fn apply(&self, config: &mut RunConfig) -> Result<()> {
        if let Some(threads) = self.threads {
            anyhow::ensure!(threads > 0, "--threads must be at least 1");
            config.threads = threads;
        }
        if let Some(parallel) = &self.parallel {
            config.parallel_by = ParallelBy::from_str(parallel)?;
        }
        if let Some(dependency) = &self.dependency {
            config.dependent_tests = TestsDependency::from_str(dependency)?;
        }
        if let Some(tags) = &self.tags {
            config.set_suite_tags(tags);
        }
        if let Some(categories) = &self.categories {
            config.set_test_categories(categories);
        }
        if let Some(tests) = &self.tests {
            config.set_tests_masks(tests);
        }
        if let Some(minutes) = self.test_timeout {
            config.test_timeout = positive_minutes("--test-timeout", minutes)?;
        }
        if let Some(minutes) = self.suite_timeout {
            config.suite_timeout = positive_minutes("--suite-timeout", minutes)?;
        }
        Ok(())
    }
}

fn positive_minutes(flag: &str, minutes: f64) -> Result<Duration> {
    anyhow::ensure!(
        minutes.is_finite() && minutes > 0.0,
        "{flag} must be a positive number of minutes"
    );
    Ok(Duration::from_secs_f64(minutes * 60.0))
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub overrides: OverrideArgs,

    /// Output format (table, json, json-pretty, csv, summary)
    #[arg(short, long, default_value = "table")]
    pub format: String,

    /// Export results to a file (.json or .csv)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Keep the outcome in the results history
    #[arg(short, long)]
    pub save: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

/// Arguments for the list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub overrides: OverrideArgs,

    /// Output format (table, json, json-pretty, csv, summary)
    #[arg(short, long, default_value = "table")]
    pub format: String,
}

/// Arguments for the results command
#[derive(Parser, Debug)]
pub struct ResultsArgs {
    /// Run id (or id prefix) to show; lists stored runs when omitted
    pub id: Option<String>,

    /// Show the latest stored run
    #[arg(short, long, conflicts_with = "id")]
    pub latest: bool,

    /// Results directory
    #[arg(short, long)]
    pub dir: Option<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: String,

    /// Export the selected run to a file
    #[arg(short, long)]
    pub export: Option<PathBuf>,
}

/// Arguments for configuration management
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write an example configuration file
    Init {
        /// Output file path
        #[arg(short, long, default_value = "./suite-engine.json")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Show the resolved configuration
    Show {
        /// Show environment variables instead
        #[arg(short, long)]
        env: bool,

        /// Document format (json, yaml, info)
        #[arg(short, long, default_value = "info")]
        format: String,

        #[command(flatten)]
        overrides: OverrideArgs,
    },

    /// Validate a configuration file
    Validate {
        /// File to validate; the standard locations are searched when omitted
        file: Option<PathBuf>,
    },

    /// Show supported environment variables
    Env,
}

/// Config file path for `config validate`
pub fn validation_target(file: Option<PathBuf>) -> Result<PathBuf> {
    file.or_else(find_config_file)
        .context("No configuration file given and none found in the standard locations")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;

    #[test]
    fn test_run_args_parsing() {
        let args = Args::parse_from([
            "suite-engine",
            "run",
            "--threads",
            "4",
            "--parallel",
            "suite",
            "--tags",
            "smoke,api",
            "--tests",
            "Cart.~",
            "--format",
            "json",
            "--save",
        ]);
        match args.command {
            Command::Run(run) => {
                assert_eq!(run.overrides.threads, Some(4));
                assert_eq!(run.overrides.parallel.as_deref(), Some("suite"));
                assert_eq!(
                    run.overrides.tags,
                    Some(vec!["smoke".to_string(), "api".to_string()])
                );
                assert_eq!(run.format, "json");
                assert!(run.save);
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_config_args_parsing() {
        let args = Args::parse_from(["suite-engine", "config", "validate", "ci.yaml"]);
        match args.command {
            Command::Config(ConfigArgs {
                action: ConfigAction::Validate { file },
            }) => assert_eq!(file, Some(PathBuf::from("ci.yaml"))),
            _ => panic!("Expected Config Validate command"),
        }
    }

    #[test]
    fn test_flags_override_config() {
        let overrides = OverrideArgs {
            threads: Some(8),
            parallel: Some("TEST".to_string()),
            dependency: Some("skip".to_string()),
            categories: Some(vec!["fast".to_string()]),
            test_timeout: Some(0.5),
            ..Default::default()
        };

        let mut config = RunConfig::default();
        overrides.apply(&mut config).unwrap();

        assert_eq!(config.threads, 8);
        assert_eq!(config.parallel_by, ParallelBy::Test);
        assert_eq!(config.dependent_tests, TestsDependency::Skip);
        assert!(config.run_categories().contains("FAST"));
        assert_eq!(config.test_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_unknown_mode_is_a_config_error() {
        let overrides = OverrideArgs {
            parallel: Some("Galaxy".to_string()),
            ..Default::default()
        };

        let err = overrides.apply(&mut RunConfig::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::UnknownVariant { .. })
        ));
    }

    #[test]
    fn test_invalid_numbers_rejected() {
        let zero_threads = OverrideArgs {
            threads: Some(0),
            ..Default::default()
        };
        assert!(zero_threads.apply(&mut RunConfig::default()).is_err());

        let negative_timeout = OverrideArgs {
            suite_timeout: Some(-1.0),
            ..Default::default()
        };
        assert!(negative_timeout.apply(&mut RunConfig::default()).is_err());
    }

    #[test]
    fn test_explicit_config_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        std::fs::write(&path, r#"{"threads": 3, "parallel": "Suite"}"#).unwrap();

        let overrides = OverrideArgs {
            config: Some(path),
            parallel: Some("Test".to_string()),
            ..Default::default()
        };
        let config = overrides.resolve_with(&EnvConfig::default()).unwrap();

        assert_eq!(config.threads, 3);
        assert_eq!(config.parallel_by, ParallelBy::Test);
    }

    #[test]
    fn test_missing_explicit_config_fails() {
        let overrides = OverrideArgs {
            config: Some(PathBuf::from("/nonexistent/suite-engine.json")),
            ..Default::default()
        };
        assert!(overrides.resolve_with(&EnvConfig::default()).is_err());
    }
}
