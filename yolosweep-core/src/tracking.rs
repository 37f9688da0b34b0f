//! Experiment tracking — run records, registry persistence, session lifecycle.

use crate::config::RunConfig;
use crate::error::SweepError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Run status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// One tracked training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: String,
    pub name: String,
    pub hyperparams: serde_json::Value,
    pub dataset_path: PathBuf,
    pub output_dir: PathBuf,
    pub status: RunStatus,
    pub final_metrics: Option<HashMap<String, f64>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RunRecord {
    pub fn new(config: &RunConfig, output_dir: &Path) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: config.run_name(),
            hyperparams: config.hyperparams(),
            dataset_path: config.dataset_path.clone(),
            output_dir: output_dir.to_path_buf(),
            status: RunStatus::Pending,
            final_metrics: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// JSON-backed registry of all runs in a sweep.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunRegistry {
    pub runs: Vec<RunRecord>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self { runs: Vec::new() }
    }

    pub fn add(&mut self, record: RunRecord) {
        self.runs.push(record);
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut RunRecord> {
        self.runs.iter_mut().find(|r| r.id == id)
    }

    pub fn list_by_status(&self, status: RunStatus) -> Vec<&RunRecord> {
        self.runs.iter().filter(|r| r.status == status).collect()
    }

    pub fn load(path: &Path) -> Result<Self, SweepError> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Atomic write: tmp sibling then rename, so a crash mid-save never
    /// corrupts the registry.
    pub fn save(&self, path: &Path) -> Result<(), SweepError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, &content)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

/// A tracking session scoped to one run: opened before training starts,
/// closed unconditionally after the training call returns.
pub struct TrackingSession {
    registry_path: PathBuf,
    run_id: String,
    run_name: String,
}

impl TrackingSession {
    /// Register the run as `Running` and persist it.
    pub fn open(
        registry_path: &Path,
        config: &RunConfig,
        output_dir: &Path,
    ) -> Result<Self, SweepError> {
        let mut record = RunRecord::new(config, output_dir);
        record.status = RunStatus::Running;
        let run_id = record.id.clone();
        let run_name = record.name.clone();

        let mut registry = RunRegistry::load(registry_path)?;
        registry.add(record);
        registry.save(registry_path)?;
        tracing::info!(run = %run_name, "tracking session opened");

        Ok(Self {
            registry_path: registry_path.to_path_buf(),
            run_id,
            run_name,
        })
    }

    pub fn run_name(&self) -> &str {
        &self.run_name
    }

    /// Finalize the record with the run outcome and any final metrics.
    pub fn close(
        self,
        succeeded: bool,
        final_metrics: Option<HashMap<String, f64>>,
    ) -> Result<(), SweepError> {
        let mut registry = RunRegistry::load(&self.registry_path)?;
        let record = registry
            .find_mut(&self.run_id)
            .ok_or_else(|| SweepError::tracking(format!("run {} not in registry", self.run_id)))?;
        record.status = if succeeded {
            RunStatus::Completed
        } else {
            RunStatus::Failed
        };
        record.final_metrics = final_metrics;
        record.updated_at = Utc::now();
        registry.save(&self.registry_path)?;
        tracing::info!(run = %self.run_name, succeeded, "tracking session closed");
        Ok(())
    }
}
