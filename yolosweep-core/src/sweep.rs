//! The grid-search driver.
//!
//! Sequential and synchronous by design: each grid cell blocks until its
//! training call returns, and a failure aborts the remaining grid. There is
//! no retry, no skip-and-continue, and no resume; re-running restarts from
//! the first combination.

use crate::config::{RunConfig, SweepGrid};
use crate::error::SweepError;
use crate::metrics::final_metrics;
use crate::trainer::{Device, TrainRequest, Trainer};
use crate::tracking::TrackingSession;
use crate::zoo::PretrainedZoo;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const REGISTRY_NAME: &str = "runs.json";

/// Drives one full sweep over a [`SweepGrid`].
pub struct SweepRunner {
    base_dir: PathBuf,
    grid: SweepGrid,
    zoo: PretrainedZoo,
    trainer: Arc<dyn Trainer>,
    device: Device,
}

impl SweepRunner {
    pub fn new(
        base_dir: impl Into<PathBuf>,
        grid: SweepGrid,
        zoo: PretrainedZoo,
        trainer: Arc<dyn Trainer>,
        device: Device,
    ) -> Self {
        Self {
            base_dir: base_dir.into(),
            grid,
            zoo,
            trainer,
            device,
        }
    }

    /// Registry file shared by all runs of this sweep.
    pub fn registry_path(&self) -> PathBuf {
        self.base_dir.join("experiments").join(REGISTRY_NAME)
    }

    /// Enumerate the grid without training; used by dry runs.
    pub fn plan(&self, dataset_manifest: &Path) -> Result<Vec<RunConfig>, SweepError> {
        self.grid.validate()?;
        Ok(self.grid.combinations(dataset_manifest))
    }

    /// Execute the whole grid, one cell at a time, in fixed nested order.
    /// Returns the number of completed runs.
    pub async fn run(&self, dataset_manifest: &Path) -> Result<usize, SweepError> {
        let configs = self.plan(dataset_manifest)?;
        let registry_path = self.registry_path();
        tracing::info!(
            cells = configs.len(),
            device = self.device.as_arg(),
            "starting sweep"
        );

        let mut completed = 0usize;
        for config in &configs {
            let output_dir = config.experiment_dir(&self.base_dir);
            std::fs::create_dir_all(&output_dir)?;

            let session = TrackingSession::open(&registry_path, config, &output_dir)?;
            let weights = match self.zoo.resolve(config.model_size).await {
                Ok(weights) => weights,
                Err(e) => {
                    // The run never started; leave it Failed, not Running.
                    session.close(false, None)?;
                    return Err(e);
                }
            };

            let request = TrainRequest {
                data: config.dataset_path.clone(),
                weights,
                epochs: config.epochs,
                batch: config.batch,
                optimizer: config.optimizer,
                output_dir: output_dir.clone(),
                run_name: config.run_name(),
                device: self.device,
            };

            let outcome = self.trainer.train(&request).await;
            let metrics = if outcome.is_ok() {
                final_metrics(&output_dir.join("results.csv"))
            } else {
                None
            };
            // Close unconditionally, then let a training error abort the grid.
            // A close failure must not mask the training error itself.
            if let Err(close_err) = session.close(outcome.is_ok(), metrics) {
                if outcome.is_ok() {
                    return Err(close_err);
                }
                tracing::warn!(error = %close_err, "failed to record run outcome");
            }
            outcome?;
            completed += 1;
        }

        tracing::info!(completed, "sweep finished");
        Ok(completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ModelSize, OptimizerKind};
    use crate::dataset::{DatasetClient, validate_api_key};
    use crate::tracking::{RunRegistry, RunStatus};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records every invocation instead of training.
    #[derive(Default)]
    struct RecordingTrainer {
        requests: Mutex<Vec<TrainRequest>>,
        fail_at: Option<usize>,
    }

    #[async_trait]
    impl Trainer for RecordingTrainer {
        async fn train(&self, req: &TrainRequest) -> Result<(), SweepError> {
            let mut requests = self.requests.lock().unwrap();
            let index = requests.len();
            requests.push(req.clone());
            match self.fail_at {
                Some(n) if n == index => Err(SweepError::training("boom")),
                _ => Ok(()),
            }
        }
    }

    fn small_grid() -> SweepGrid {
        SweepGrid {
            model_sizes: vec![ModelSize::N, ModelSize::S],
            epochs: vec![25, 50],
            batches: vec![2],
            optimizers: vec![OptimizerKind::Adam, OptimizerKind::Sgd],
        }
    }

    fn seeded_zoo(dir: &Path) -> PretrainedZoo {
        let zoo = PretrainedZoo::new(dir);
        for size in ModelSize::ALL {
            std::fs::create_dir_all(dir).unwrap();
            std::fs::write(zoo.weight_path(size), b"pt").unwrap();
        }
        zoo
    }

    #[tokio::test]
    async fn default_grid_invokes_trainer_160_times() {
        let dir = TempDir::new().unwrap();
        let trainer = Arc::new(RecordingTrainer::default());
        let runner = SweepRunner::new(
            dir.path(),
            SweepGrid::default(),
            seeded_zoo(&dir.path().join("weights")),
            trainer.clone(),
            Device::Cpu,
        );

        let completed = runner.run(Path::new("data/data.yaml")).await.unwrap();
        assert_eq!(completed, 160);
        assert_eq!(trainer.requests.lock().unwrap().len(), 160);
    }

    #[tokio::test]
    async fn runs_follow_fixed_nested_order_with_unique_dirs() {
        let dir = TempDir::new().unwrap();
        let trainer = Arc::new(RecordingTrainer::default());
        let runner = SweepRunner::new(
            dir.path(),
            small_grid(),
            seeded_zoo(&dir.path().join("weights")),
            trainer.clone(),
            Device::Cpu,
        );

        runner.run(Path::new("data/data.yaml")).await.unwrap();
        let requests = trainer.requests.lock().unwrap();
        assert_eq!(requests.len(), 8);
        assert_eq!(requests[0].run_name, "yolov8n-epoch_25_batch_2_optimizer_Adam");
        assert_eq!(requests[1].run_name, "yolov8n-epoch_25_batch_2_optimizer_SGD");
        assert_eq!(requests[7].run_name, "yolov8s-epoch_50_batch_2_optimizer_SGD");

        let dirs: std::collections::HashSet<_> =
            requests.iter().map(|r| r.output_dir.clone()).collect();
        assert_eq!(dirs.len(), 8);
        for request in requests.iter() {
            assert!(request.output_dir.is_dir());
            assert!(request.weights.exists());
        }
    }

    #[tokio::test]
    async fn completed_runs_are_registered() {
        let dir = TempDir::new().unwrap();
        let trainer = Arc::new(RecordingTrainer::default());
        let runner = SweepRunner::new(
            dir.path(),
            small_grid(),
            seeded_zoo(&dir.path().join("weights")),
            trainer,
            Device::Cpu,
        );

        runner.run(Path::new("data/data.yaml")).await.unwrap();
        let registry = RunRegistry::load(&runner.registry_path()).unwrap();
        assert_eq!(registry.runs.len(), 8);
        assert_eq!(registry.list_by_status(RunStatus::Completed).len(), 8);
    }

    #[tokio::test]
    async fn missing_credential_prevents_any_training() {
        let dir = TempDir::new().unwrap();
        let trainer = Arc::new(RecordingTrainer::default());
        let runner = SweepRunner::new(
            dir.path(),
            small_grid(),
            seeded_zoo(&dir.path().join("weights")),
            trainer.clone(),
            Device::Cpu,
        );

        // Same ordering as the binary: the dataset client is constructed
        // before any run starts, so a missing key aborts the whole sweep.
        let result = async {
            let _client = DatasetClient::new(validate_api_key(None)?)?;
            runner.run(Path::new("data/data.yaml")).await
        }
        .await;

        assert!(matches!(result, Err(SweepError::MissingCredential(_))));
        assert!(trainer.requests.lock().unwrap().is_empty());
        assert!(!runner.registry_path().exists());
    }

    #[tokio::test]
    async fn weights_failure_closes_run_before_aborting() {
        let dir = TempDir::new().unwrap();
        // A regular file where the checkpoint cache should go makes
        // resolution fail before any download is attempted.
        let blocker = dir.path().join("weights");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let trainer = Arc::new(RecordingTrainer::default());
        let runner = SweepRunner::new(
            dir.path(),
            small_grid(),
            PretrainedZoo::new(blocker.join("cache")),
            trainer.clone(),
            Device::Cpu,
        );

        let err = runner.run(Path::new("data/data.yaml")).await.unwrap_err();
        assert!(matches!(err, SweepError::Io(_)));
        assert!(trainer.requests.lock().unwrap().is_empty());

        // The opened run was finalized as failed, not left running.
        let registry = RunRegistry::load(&runner.registry_path()).unwrap();
        assert_eq!(registry.runs.len(), 1);
        assert_eq!(registry.list_by_status(RunStatus::Failed).len(), 1);
        assert!(registry.list_by_status(RunStatus::Running).is_empty());
    }

    #[tokio::test]
    async fn close_failure_does_not_mask_training_error() {
        let dir = TempDir::new().unwrap();

        /// Corrupts the registry before failing, so the close itself errors.
        struct CorruptingTrainer {
            registry: PathBuf,
        }
        #[async_trait]
        impl Trainer for CorruptingTrainer {
            async fn train(&self, _req: &TrainRequest) -> Result<(), SweepError> {
                std::fs::write(&self.registry, "not json").unwrap();
                Err(SweepError::training("boom"))
            }
        }

        let runner = SweepRunner::new(
            dir.path(),
            SweepGrid {
                model_sizes: vec![ModelSize::N],
                epochs: vec![25],
                batches: vec![2],
                optimizers: vec![OptimizerKind::Adam],
            },
            seeded_zoo(&dir.path().join("weights")),
            Arc::new(CorruptingTrainer {
                registry: dir.path().join("experiments").join("runs.json"),
            }),
            Device::Cpu,
        );

        let err = runner.run(Path::new("data/data.yaml")).await.unwrap_err();
        assert!(matches!(err, SweepError::Training(_)));
    }

    #[tokio::test]
    async fn training_failure_aborts_remaining_grid() {
        let dir = TempDir::new().unwrap();
        let trainer = Arc::new(RecordingTrainer {
            requests: Mutex::new(Vec::new()),
            fail_at: Some(2),
        });
        let runner = SweepRunner::new(
            dir.path(),
            small_grid(),
            seeded_zoo(&dir.path().join("weights")),
            trainer.clone(),
            Device::Cpu,
        );

        let err = runner.run(Path::new("data/data.yaml")).await.unwrap_err();
        assert!(matches!(err, SweepError::Training(_)));
        // The failing cell was the third of eight; nothing after it ran.
        assert_eq!(trainer.requests.lock().unwrap().len(), 3);

        // The failing run was still closed before the grid aborted.
        let registry = RunRegistry::load(&runner.registry_path()).unwrap();
        assert_eq!(registry.runs.len(), 3);
        assert_eq!(registry.list_by_status(RunStatus::Completed).len(), 2);
        assert_eq!(registry.list_by_status(RunStatus::Failed).len(), 1);
    }

    #[tokio::test]
    async fn final_metrics_land_in_registry() {
        let dir = TempDir::new().unwrap();

        /// Writes a results.csv like the real trainer before succeeding.
        struct CsvTrainer;
        #[async_trait]
        impl Trainer for CsvTrainer {
            async fn train(&self, req: &TrainRequest) -> Result<(), SweepError> {
                std::fs::write(
                    req.output_dir.join("results.csv"),
                    "epoch, metrics/mAP50(B)\n1, 0.71\n",
                )
                .unwrap();
                Ok(())
            }
        }

        let runner = SweepRunner::new(
            dir.path(),
            SweepGrid {
                model_sizes: vec![ModelSize::N],
                epochs: vec![25],
                batches: vec![2],
                optimizers: vec![OptimizerKind::Adam],
            },
            seeded_zoo(&dir.path().join("weights")),
            Arc::new(CsvTrainer),
            Device::Cpu,
        );

        runner.run(Path::new("data/data.yaml")).await.unwrap();
        let registry = RunRegistry::load(&runner.registry_path()).unwrap();
        let metrics = registry.runs[0].final_metrics.as_ref().unwrap();
        assert_eq!(metrics["metrics/mAP50(B)"], 0.71);
    }

    #[tokio::test]
    async fn rerun_is_idempotent_on_directories() {
        let dir = TempDir::new().unwrap();
        let trainer = Arc::new(RecordingTrainer::default());
        let runner = SweepRunner::new(
            dir.path(),
            small_grid(),
            seeded_zoo(&dir.path().join("weights")),
            trainer.clone(),
            Device::Cpu,
        );

        runner.run(Path::new("data/data.yaml")).await.unwrap();
        // Directories already exist on the second pass.
        runner.run(Path::new("data/data.yaml")).await.unwrap();
        assert_eq!(trainer.requests.lock().unwrap().len(), 16);
    }
}
