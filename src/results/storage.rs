//! Aggregate persistence
//!
//! Saves the raw aggregate of a run as pretty JSON so it can be inspected
//! or re-projected later.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::RunSummary;
use crate::aggregator::{AggregateSnapshot, EventAggregator};

/// One persisted run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredRun {
    pub id: String,
    pub created_at: DateTime<Utc>,
    /// Lifecycle stream the aggregate was built from
    pub source: String,
    pub summary: RunSummary,
    pub aggregate: AggregateSnapshot,
    pub environment: EnvironmentInfo,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnvironmentInfo {
    pub os: String,
    pub arch: String,
    pub cwd: String,
    pub tool_version: String,
}

impl Default for EnvironmentInfo {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            cwd: std::env::current_dir()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl StoredRun {
    pub fn new(aggregator: &EventAggregator, source: impl Into<String>) -> Self {
        Self {
            id: generate_run_id(),
            created_at: Utc::now(),
            source: source.into(),
            summary: RunSummary::from_aggregate(aggregator),
            aggregate: aggregator.snapshot(),
            environment: EnvironmentInfo::default(),
        }
    }
}

fn generate_run_id() -> String {
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let random: u32 = rand::random::<u32>() % 10000;
    format!("{timestamp}_{random:04}")
}

/// Directory of stored runs, one JSON file per run
pub struct ResultsStorage {
    base_dir: PathBuf,
}

impl ResultsStorage {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// `<data dir>/bdd-report/runs`
    pub fn default_dir() -> Self {
        let base_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bdd-report")
            .join("runs");
        Self::new(base_dir)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn run_path(&self, run_id: &str) -> PathBuf {
        self.base_dir.join(format!("{run_id}.json"))
    }

    pub fn save(&self, run: &StoredRun) -> Result<PathBuf> {
        fs::create_dir_all(&self.base_dir)
            .with_context(|| format!("Failed to create {}", self.base_dir.display()))?;

        let path = self.run_path(&run.id);
        let file = File::create(&path).context("Failed to create results file")?;
        serde_json::to_writer_pretty(BufWriter::new(file), run).context("Failed to write results")?;

        info!("Saved aggregate to {}", path.display());
        Ok(path)
    }

    pub fn load(&self, run_id: &str) -> Result<StoredRun> {
        let run = Self::load_from_path(&self.run_path(run_id))?;
        debug!("Loaded run {run_id}");
        Ok(run)
    }

    pub fn load_from_path(path: &Path) -> Result<StoredRun> {
        let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        serde_json::from_reader(BufReader::new(file)).context("Failed to parse stored run")
    }

    /// Stored runs, newest first. Unreadable files are skipped.
    pub fn list(&self) -> Result<Vec<RunInfo>> {
        if !self.base_dir.exists() {
            return Ok(Vec::new());
        }

        let mut runs = Vec::new();
        for entry in fs::read_dir(&self.base_dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e != "json").unwrap_or(true) {
                continue;
            }
            match Self::load_from_path(&path) {
                Ok(run) => runs.push(RunInfo {
                    id: run.id,
                    created_at: run.created_at,
                    scenarios: run.summary.scenarios.total,
                    success: run.summary.is_success(),
                }),
                Err(e) => debug!("Failed to load {}: {e:#}", path.display()),
            }
        }

        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(runs)
    }

    pub fn latest(&self) -> Result<Option<StoredRun>> {
        match self.list()?.first() {
            Some(info) => self.load(&info.id).map(Some),
            None => Ok(None),
        }
    }

    pub fn delete(&self, run_id: &str) -> Result<()> {
        let path = self.run_path(run_id);
        if path.exists() {
            fs::remove_file(&path)?;
            info!("Deleted stored run {}", path.display());
        }
        Ok(())
    }
}

/// Listing entry for a stored run
#[derive(Clone, Debug, Serialize)]
pub struct RunInfo {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub scenarios: usize,
    pub success: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::ConsistencyMode;
    use crate::models::{AttemptRef, CaseFinished, LifecycleEvent, Status, TestCase, TestCaseResult};
    use tempfile::TempDir;

    fn aggregator() -> EventAggregator {
        let attempt = AttemptRef {
            pickle_id: "p1".to_string(),
            attempt_number: 1,
        };
        let events = vec![
            LifecycleEvent::TestCasePrepared(TestCase {
                pickle_id: "p1".to_string(),
                steps: Vec::new(),
            }),
            LifecycleEvent::TestCaseStarted(attempt.clone()),
            LifecycleEvent::TestCaseFinished(CaseFinished {
                test_case: attempt,
                result: TestCaseResult {
                    status: Status::Passed,
                    duration: Some(3.0),
                    retried: false,
                },
            }),
        ];
        EventAggregator::replay(ConsistencyMode::Strict, &events).unwrap()
    }

    #[test]
    fn test_generate_run_id() {
        let id = generate_run_id();
        assert_eq!(id.len(), "20260101_120000_0000".len());
    }

    #[test]
    fn test_save_load_list() {
        let dir = TempDir::new().unwrap();
        let storage = ResultsStorage::new(dir.path().join("runs"));
        assert!(storage.list().unwrap().is_empty());
        assert!(storage.latest().unwrap().is_none());

        let run = StoredRun::new(&aggregator(), "run.ndjson");
        let path = storage.save(&run).unwrap();
        assert!(path.exists());

        let loaded = storage.load(&run.id).unwrap();
        assert_eq!(loaded.aggregate, run.aggregate);
        assert_eq!(loaded.summary.scenarios.count(Status::Passed), 1);
        assert_eq!(loaded.source, "run.ndjson");

        let listed = storage.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].success);

        storage.delete(&run.id).unwrap();
        assert!(storage.list().unwrap().is_empty());
    }

    #[test]
    fn test_list_skips_foreign_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        fs::write(dir.path().join("broken.json"), "{").unwrap();
        let storage = ResultsStorage::new(dir.path());
        assert!(storage.list().unwrap().is_empty());
    }

    #[test]
    fn test_environment_info() {
        let env = EnvironmentInfo::default();
        assert!(!env.os.is_empty());
        assert_eq!(env.tool_version, env!("CARGO_PKG_VERSION"));
    }
}
