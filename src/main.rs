//! Suite Engine CLI
//!
//! ```bash
//! # Run the built-in suites, four suites at a time
//! suite-engine run --parallel suite --threads 4
//!
//! # Only smoke suites, skipping tests whose dependency failed
//! suite-engine run --tags smoke --dependency skip --save
//!
//! # What would run for a test mask
//! suite-engine list --tests "Checkout.~"
//!
//! # Configuration
//! suite-engine config init
//! suite-engine config show --format yaml
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

use suite_engine::cli::{self, Args};
use suite_engine::config::{print_env_help, ConfigFile, EnvConfig};
use suite_engine::engine::TracingListener;
use suite_engine::executor::Runner;
use suite_engine::models::Status;
use suite_engine::output::{OutputFormat, ResultFormatter};
use suite_engine::results::{export, ExportFormat, ResultsStorage};
use suite_engine::samples;
use suite_engine::utils::{init_logger, LogLevel};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let level = if args.verbose {
        LogLevel::Debug
    } else {
        args.log_level.parse().unwrap_or(LogLevel::Info)
    };
    init_logger(level);

    let outcome = match args.command {
        cli::Command::Run(run_args) => run_suites(run_args).await,
        cli::Command::List(list_args) => list_tests(list_args).map(|()| true),
        cli::Command::Results(results_args) => show_results(results_args).map(|()| true),
        cli::Command::Config(config_args) => manage_config(config_args),
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn formatter(format: &str, no_color: bool) -> Result<ResultFormatter> {
    let format = OutputFormat::from_str(format)
        .with_context(|| format!("Unknown output format: {format}"))?;
    let formatter = ResultFormatter::new(format);
    Ok(if no_color {
        formatter.no_color()
    } else {
        formatter
    })
}

/// Returns whether the run did not fail
async fn run_suites(args: cli::RunArgs) -> Result<bool> {
    let formatter = formatter(&args.format, args.no_color)?;
    let config = Arc::new(args.overrides.resolve()?);

    let runner = Runner::new(config).with_listener(Arc::new(TracingListener));
    let run = runner.run(samples::suites()).await;

    println!("{}", formatter.format_run(&run));

    if let Some(path) = &args.output {
        let format = ExportFormat::from_extension(path).unwrap_or(ExportFormat::Json);
        export(&run, path, format)?;
    }
    if args.save {
        let path = ResultsStorage::default_dir().save(&run)?;
        info!("Run {} stored in {}", run.id, path.display());
    }

    Ok(run.result() != Status::Failed)
}

fn list_tests(args: cli::ListArgs) -> Result<()> {
    let formatter = formatter(&args.format, false)?;
    let config = Arc::new(args.overrides.resolve()?);

    let tests = Runner::new(config).list(&samples::suites());
    print!("{}", formatter.format_tests(&tests));
    Ok(())
}

fn show_results(args: cli::ResultsArgs) -> Result<()> {
    let storage = match args.dir {
        Some(dir) => ResultsStorage::new(dir),
        None => ResultsStorage::default_dir(),
    };

    let run = if let Some(id) = &args.id {
        storage.load(id)?
    } else if args.latest {
        match storage.latest()? {
            Some(run) => run,
            None => {
                println!("No stored results in {}", storage.base_dir().display());
                return Ok(());
            }
        }
    } else {
        let runs = storage.list_runs()?;
        if runs.is_empty() {
            println!("No stored results in {}", storage.base_dir().display());
            println!("Store a run with: suite-engine run --save");
            return Ok(());
        }

        println!("{:34} {:20} {:8} {:>6} {:>7}", "ID", "STARTED", "RESULT", "TESTS", "PASS");
        for info in runs {
            println!(
                "{:34} {:20} {:8} {:>6} {:>6.1}%",
                info.id.simple().to_string(),
                info.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                info.result.to_string(),
                info.total,
                info.pass_rate
            );
        }
        return Ok(());
    };

    println!("{}", formatter(&args.format, false)?.format_run(&run));
    if let Some(path) = &args.export {
        let format = ExportFormat::from_extension(path).unwrap_or(ExportFormat::Json);
        export(&run, path, format)?;
    }
    Ok(())
}

/// Returns whether the inspected configuration is valid
fn manage_config(args: cli::ConfigArgs) -> Result<bool> {
    match args.action {
        cli::ConfigAction::Init { output, force } => {
            if output.exists() && !force {
                anyhow::bail!(
                    "Configuration file already exists: {}. Use --force to overwrite.",
                    output.display()
                );
            }

            ConfigFile::example().save(&output)?;
            println!("✓ Configuration file created: {}", output.display());
            println!("\nEdit the file to customize your settings.");
        }

        cli::ConfigAction::Show {
            env,
            format,
            overrides,
        } => {
            if env {
                EnvConfig::load().print_summary();
            } else {
                let config = overrides.resolve()?;
                match format.as_str() {
                    "json" => println!(
                        "{}",
                        serde_json::to_string_pretty(&ConfigFile::from_config(&config))?
                    ),
                    "yaml" => print!("{}", serde_yaml::to_string(&ConfigFile::from_config(&config))?),
                    _ => print!("{}", config.info()),
                }
            }
        }

        cli::ConfigAction::Validate { file } => {
            let path = cli::validation_target(file)?;
            match ConfigFile::load(&path).and_then(|file| {
                let mut config = Default::default();
                file.apply(&mut config)
            }) {
                Ok(()) => println!("✓ Configuration file is valid: {}", path.display()),
                Err(e) => {
                    println!("✗ Configuration file is invalid: {}", path.display());
                    println!("  Error: {e}");
                    return Ok(false);
                }
            }
        }

        cli::ConfigAction::Env => print_env_help(),
    }

    Ok(true)
}
