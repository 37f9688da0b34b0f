//! Trainer seam — subprocess orchestration of the external training CLI.
//!
//! Training itself (forward/backward pass, loss, optimizer step, metric
//! logging) is delegated entirely to the external `yolo` CLI; this module
//! only builds the invocation and reports its exit status.

use crate::config::OptimizerKind;
use crate::error::SweepError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Weight decay passed to every run (Ultralytics default).
pub const WEIGHT_DECAY: f64 = 5e-4;
/// Warm-up epoch count passed to every run (Ultralytics default).
pub const WARMUP_EPOCHS: u32 = 3;

/// Environment variable overriding the trainer executable name.
pub const YOLO_BIN_VAR: &str = "YOLO_BIN";

/// Compute device for a training run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Cuda,
    Cpu,
}

impl Device {
    /// Device argument as the trainer CLI expects it.
    pub fn as_arg(&self) -> &'static str {
        match self {
            Device::Cuda => "0",
            Device::Cpu => "cpu",
        }
    }

    /// Prefer the accelerator when `nvidia-smi` reports one, fall back to CPU.
    pub async fn detect() -> Device {
        let probe = tokio::process::Command::new("nvidia-smi")
            .arg("-L")
            .output()
            .await;
        match probe {
            Ok(out) if out.status.success() && !out.stdout.is_empty() => Device::Cuda,
            _ => Device::Cpu,
        }
    }
}

/// Everything one training invocation needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainRequest {
    /// Dataset manifest (`data.yaml`).
    pub data: PathBuf,
    /// Pretrained checkpoint to fine-tune from.
    pub weights: PathBuf,
    pub epochs: u32,
    pub batch: u32,
    pub optimizer: OptimizerKind,
    /// Experiment output directory; the trainer writes all artifacts here.
    pub output_dir: PathBuf,
    pub run_name: String,
    pub device: Device,
}

/// Seam between the sweep driver and the external training procedure.
#[async_trait]
pub trait Trainer: Send + Sync {
    /// Run one training to completion. Errors are not caught by the driver;
    /// a failure aborts the remaining grid.
    async fn train(&self, req: &TrainRequest) -> Result<(), SweepError>;
}

/// Build the `yolo detect train` argument list for a request.
pub fn yolo_args(req: &TrainRequest) -> Vec<String> {
    let project = req
        .output_dir
        .parent()
        .unwrap_or(&req.output_dir)
        .display()
        .to_string();
    let name = req
        .output_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| req.run_name.clone());
    vec![
        "detect".to_string(),
        "train".to_string(),
        format!("data={}", req.data.display()),
        format!("model={}", req.weights.display()),
        format!("epochs={}", req.epochs),
        format!("batch={}", req.batch),
        format!("optimizer={}", req.optimizer),
        format!("weight_decay={WEIGHT_DECAY}"),
        format!("warmup_epochs={WARMUP_EPOCHS}"),
        format!("device={}", req.device.as_arg()),
        format!("project={project}"),
        format!("name={name}"),
        "exist_ok=True".to_string(),
    ]
}

/// Real trainer: shells out to the Ultralytics `yolo` CLI.
pub struct YoloTrainer {
    bin: String,
}

impl YoloTrainer {
    pub fn new() -> Self {
        Self {
            bin: std::env::var(YOLO_BIN_VAR).unwrap_or_else(|_| "yolo".to_string()),
        }
    }

    pub fn with_bin(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }
}

impl Default for YoloTrainer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Trainer for YoloTrainer {
    async fn train(&self, req: &TrainRequest) -> Result<(), SweepError> {
        let args = yolo_args(req);
        tracing::info!(run = %req.run_name, bin = %self.bin, "launching training");
        let status = tokio::process::Command::new(&self.bin)
            .args(&args)
            .status()
            .await
            .map_err(|e| SweepError::training(format!("failed to launch {}: {e}", self.bin)))?;

        if !status.success() {
            return Err(SweepError::training(format!(
                "run {} exited with {status}",
                req.run_name
            )));
        }
        Ok(())
    }
}
