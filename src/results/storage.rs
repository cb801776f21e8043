//! Run outcome persistence
//!
//! Keeps a history of run outcomes as JSON files and exports single runs as
//! JSON or CSV.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{FailureKind, RunOutcome, Status};

/// One CSV row per test outcome
#[derive(Debug, Serialize)]
pub struct TestRecord<'a> {
    pub suite: String,
    pub test: &'a str,
    pub full_method_name: &'a str,
    pub result: Status,
    pub duration_ms: u64,
    pub failure_kind: Option<FailureKind>,
    pub message: Option<&'a str>,
    pub skip_reason: Option<&'a str>,
}

/// Flatten a run into test rows, suites in run order
pub fn test_records(run: &RunOutcome) -> Vec<TestRecord<'_>> {
    run.suites
        .iter()
        .flat_map(|suite| {
            let suite_name = suite.full_name();
            suite.tests.iter().map(move |test| TestRecord {
                suite: suite_name.clone(),
                test: &test.title,
                full_method_name: &test.full_method_name,
                result: test.result,
                duration_ms: test.execution_time.as_millis() as u64,
                failure_kind: test.failure.as_ref().map(|f| f.kind),
                message: test.failure.as_ref().map(|f| f.message.as_str()),
                skip_reason: test.skip_reason.as_deref(),
            })
        })
        .collect()
}

/// Write the test rows of `run` as CSV with a header line
pub fn write_csv<W: Write>(run: &RunOutcome, writer: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for record in test_records(run) {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Export format
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(ExportFormat::Json),
            "csv" => Some(ExportFormat::Csv),
            _ => None,
        }
    }

    pub fn from_extension(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_str)
    }
}

/// Write a run outcome to `path`
pub fn export(run: &RunOutcome, path: &Path, format: ExportFormat) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let file = File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let writer = BufWriter::new(file);

    match format {
        ExportFormat::Json => {
            serde_json::to_writer_pretty(writer, run).context("Failed to write results")?
        }
        ExportFormat::Csv => write_csv(run, writer).context("Failed to write results")?,
    }

    info!("Exported results to {}", path.display());
    Ok(())
}

/// Brief information about a stored run
#[derive(Clone, Debug)]
pub struct RunInfo {
    pub id: Uuid,
    pub path: PathBuf,
    pub started_at: DateTime<Utc>,
    pub result: Status,
    pub total: usize,
    pub pass_rate: f64,
}

impl RunInfo {
    fn from_run(run: &RunOutcome, path: PathBuf) -> Self {
        Self {
            id: run.id,
            path,
            started_at: run.started_at,
            result: run.result(),
            total: run.total(),
            pass_rate: run.pass_rate(),
        }
    }
}

/// History of run outcomes under one directory
pub struct ResultsStorage {
    base_dir: PathBuf,
}

impl ResultsStorage {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Storage under the user data directory
    pub fn default_dir() -> Self {
        let base_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("suite-engine")
            .join("results");
        Self::new(base_dir)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn run_path(&self, run: &RunOutcome) -> PathBuf {
        self.base_dir.join(format!(
            "{}_{}.json",
            run.started_at.format("%Y%m%d_%H%M%S"),
            run.id.simple()
        ))
    }

    /// Save a run, returning the file it was written to
    pub fn save(&self, run: &RunOutcome) -> Result<PathBuf> {
        fs::create_dir_all(&self.base_dir)?;

        let path = self.run_path(run);
        let file = File::create(&path).context("Failed to create results file")?;
        serde_json::to_writer_pretty(BufWriter::new(file), run)
            .context("Failed to write results")?;

        info!("Saved run results to {}", path.display());
        Ok(path)
    }

    pub fn load_from_path(&self, path: &Path) -> Result<RunOutcome> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open results file {}", path.display()))?;
        serde_json::from_reader(BufReader::new(file)).context("Failed to parse results")
    }

    /// Load a stored run by id, or by a prefix of its id
    pub fn load(&self, id: &str) -> Result<RunOutcome> {
        let id = id.replace('-', "").to_lowercase();
        let info = self
            .list_runs()?
            .into_iter()
            .find(|info| info.id.simple().to_string().starts_with(&id))
            .with_context(|| format!("No stored run with id '{id}'"))?;
        self.load_from_path(&info.path)
    }

    /// Stored runs, newest first. Unreadable files are skipped.
    pub fn list_runs(&self) -> Result<Vec<RunInfo>> {
        if !self.base_dir.exists() {
            return Ok(Vec::new());
        }

        let mut runs = Vec::new();
        for entry in fs::read_dir(&self.base_dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                match self.load_from_path(&path) {
                    Ok(run) => runs.push(RunInfo::from_run(&run, path)),
                    Err(e) => debug!("Failed to load {}: {}", path.display(), e),
                }
            }
        }

        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(runs)
    }

    pub fn latest(&self) -> Result<Option<RunOutcome>> {
        match self.list_runs()?.into_iter().next() {
            Some(info) => self.load_from_path(&info.path).map(Some),
            None => Ok(None),
        }
    }
}
