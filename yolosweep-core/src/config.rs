//! Run configuration and grid definition.
//!
//! A [`RunConfig`] is immutable once constructed and fully determines one
//! training invocation; its experiment directory and run name are pure
//! functions of the four hyperparameters.

use crate::error::SweepError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// YOLOv8 model scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelSize {
    N,
    S,
    M,
    L,
    X,
}

impl ModelSize {
    /// All scales, smallest first.
    pub const ALL: [ModelSize; 5] = [
        ModelSize::N,
        ModelSize::S,
        ModelSize::M,
        ModelSize::L,
        ModelSize::X,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelSize::N => "n",
            ModelSize::S => "s",
            ModelSize::M => "m",
            ModelSize::L => "l",
            ModelSize::X => "x",
        }
    }

    /// Checkpoint stem for this scale, e.g. `yolov8n`.
    pub fn model_tag(&self) -> String {
        format!("yolov8{}", self.as_str())
    }
}

impl fmt::Display for ModelSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelSize {
    type Err = SweepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "n" => Ok(ModelSize::N),
            "s" => Ok(ModelSize::S),
            "m" => Ok(ModelSize::M),
            "l" => Ok(ModelSize::L),
            "x" => Ok(ModelSize::X),
            other => Err(SweepError::invalid_input(format!(
                "unknown model size '{other}' (expected one of n, s, m, l, x)"
            ))),
        }
    }
}

/// Optimizer passed through to the external trainer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptimizerKind {
    Adam,
    #[serde(rename = "SGD")]
    Sgd,
}

impl OptimizerKind {
    pub const ALL: [OptimizerKind; 2] = [OptimizerKind::Adam, OptimizerKind::Sgd];

    /// Name as the trainer CLI expects it.
    pub fn as_str(&self) -> &'static str {
        match self {
            OptimizerKind::Adam => "Adam",
            OptimizerKind::Sgd => "SGD",
        }
    }
}

impl fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptimizerKind {
    type Err = SweepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "adam" => Ok(OptimizerKind::Adam),
            "sgd" => Ok(OptimizerKind::Sgd),
            other => Err(SweepError::invalid_input(format!(
                "unknown optimizer '{other}' (expected Adam or SGD)"
            ))),
        }
    }
}

/// One cell of the grid. Immutable; fully determines a training invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    pub model_size: ModelSize,
    pub epochs: u32,
    pub batch: u32,
    pub optimizer: OptimizerKind,
    pub dataset_path: PathBuf,
}

impl RunConfig {
    /// Leaf directory name, e.g. `epoch_50_batch_2_optimizer_Adam`.
    pub fn cell_name(&self) -> String {
        format!(
            "epoch_{}_batch_{}_optimizer_{}",
            self.epochs, self.batch, self.optimizer
        )
    }

    /// Experiment output directory relative to `base`:
    /// `experiments/yolov8<size>/epoch_<e>_batch_<b>_optimizer_<opt>`.
    pub fn experiment_dir(&self, base: &Path) -> PathBuf {
        base.join("experiments")
            .join(self.model_size.model_tag())
            .join(self.cell_name())
    }

    /// Tracking run name, e.g. `yolov8n-epoch_50_batch_2_optimizer_Adam`.
    pub fn run_name(&self) -> String {
        format!("{}-{}", self.model_size.model_tag(), self.cell_name())
    }

    /// Hyperparameters as a JSON object for tracking metadata.
    pub fn hyperparams(&self) -> serde_json::Value {
        serde_json::json!({
            "model": self.model_size.model_tag(),
            "epochs": self.epochs,
            "batch": self.batch,
            "optimizer": self.optimizer.as_str(),
        })
    }
}

/// Ordered value lists for the four grid axes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepGrid {
    #[serde(default = "default_model_sizes")]
    pub model_sizes: Vec<ModelSize>,
    #[serde(default = "default_epochs")]
    pub epochs: Vec<u32>,
    #[serde(default = "default_batches")]
    pub batches: Vec<u32>,
    #[serde(default = "default_optimizers")]
    pub optimizers: Vec<OptimizerKind>,
}

fn default_model_sizes() -> Vec<ModelSize> {
    ModelSize::ALL.to_vec()
}

fn default_epochs() -> Vec<u32> {
    vec![25, 50, 75, 100]
}

fn default_batches() -> Vec<u32> {
    vec![2, 4, 8, 16]
}

fn default_optimizers() -> Vec<OptimizerKind> {
    OptimizerKind::ALL.to_vec()
}

impl Default for SweepGrid {
    fn default() -> Self {
        Self {
            model_sizes: default_model_sizes(),
            epochs: default_epochs(),
            batches: default_batches(),
            optimizers: default_optimizers(),
        }
    }
}

impl SweepGrid {
    /// Reject empty axes and non-positive counts before any run starts.
    pub fn validate(&self) -> Result<(), SweepError> {
        if self.model_sizes.is_empty()
            || self.epochs.is_empty()
            || self.batches.is_empty()
            || self.optimizers.is_empty()
        {
            return Err(SweepError::invalid_input("grid axis must not be empty"));
        }
        if self.epochs.iter().any(|&e| e == 0) {
            return Err(SweepError::invalid_input("epoch count must be positive"));
        }
        if self.batches.iter().any(|&b| b == 0) {
            return Err(SweepError::invalid_input("batch size must be positive"));
        }
        Ok(())
    }

    /// Total number of grid cells.
    pub fn len(&self) -> usize {
        self.model_sizes.len() * self.epochs.len() * self.batches.len() * self.optimizers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cartesian product in fixed nested order: model size outermost,
    /// then epochs, then batch, optimizer innermost.
    pub fn combinations(&self, dataset_path: &Path) -> Vec<RunConfig> {
        let mut configs = Vec::with_capacity(self.len());
        for &model_size in &self.model_sizes {
            for &epochs in &self.epochs {
                for &batch in &self.batches {
                    for &optimizer in &self.optimizers {
                        configs.push(RunConfig {
                            model_size,
                            epochs,
                            batch,
                            optimizer,
                            dataset_path: dataset_path.to_path_buf(),
                        });
                    }
                }
            }
        }
        configs
    }
}
