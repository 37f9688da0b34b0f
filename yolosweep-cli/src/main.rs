//! yolosweep CLI — fine-tune YOLOv8 across a hyperparameter grid.
//!
//! Downloads the dataset export, then trains one model per grid cell,
//! sequentially, recording every run in the experiment registry.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use yolosweep_core::{
    DatasetClient, DatasetSource, Device, ModelSize, OptimizerKind, PretrainedZoo, SweepGrid,
    SweepRunner, YoloTrainer,
};

/// Grid-search fine-tuning for YOLOv8 object detection
#[derive(Parser, Debug)]
#[command(name = "yolosweep", version, about, long_about = None)]
struct Cli {
    /// Dataset-provider workspace slug
    #[arg(long)]
    workspace: String,

    /// Dataset-provider project slug
    #[arg(long)]
    project: String,

    /// Dataset version to export
    #[arg(long, default_value_t = 1)]
    dataset_version: u32,

    /// Base project directory (experiments and registry live under it)
    #[arg(long, default_value = ".")]
    base_dir: PathBuf,

    /// Directory the dataset export is extracted into
    #[arg(long, default_value = "datasets")]
    dataset_dir: PathBuf,

    /// Cache directory for pretrained checkpoints
    #[arg(long, default_value = "weights")]
    weights_dir: PathBuf,

    /// Override the model-size axis (comma separated: n,s,m,l,x)
    #[arg(long, value_delimiter = ',')]
    model_sizes: Option<Vec<ModelSize>>,

    /// Override the epoch axis (comma separated)
    #[arg(long, value_delimiter = ',')]
    epochs: Option<Vec<u32>>,

    /// Override the batch-size axis (comma separated)
    #[arg(long, value_delimiter = ',')]
    batches: Option<Vec<u32>>,

    /// Override the optimizer axis (comma separated: Adam,SGD)
    #[arg(long, value_delimiter = ',')]
    optimizers: Option<Vec<OptimizerKind>>,

    /// Enumerate the grid and derived paths without training
    #[arg(long)]
    dry_run: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn grid(&self) -> SweepGrid {
        let mut grid = SweepGrid::default();
        if let Some(sizes) = &self.model_sizes {
            grid.model_sizes = sizes.clone();
        }
        if let Some(epochs) = &self.epochs {
            grid.epochs = epochs.clone();
        }
        if let Some(batches) = &self.batches {
            grid.batches = batches.clone();
        }
        if let Some(optimizers) = &self.optimizers {
            grid.optimizers = optimizers.clone();
        }
        grid
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("yolosweep={default_level}")));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let grid = cli.grid();
    let expected_manifest = cli.dataset_dir.join("data.yaml");

    if cli.dry_run {
        let runner = SweepRunner::new(
            &cli.base_dir,
            grid,
            PretrainedZoo::new(&cli.weights_dir),
            Arc::new(YoloTrainer::new()),
            Device::Cpu,
        );
        let plan = runner.plan(&expected_manifest)?;
        println!("{} runs planned:", plan.len());
        for config in &plan {
            println!("  {}", config.experiment_dir(&cli.base_dir).display());
        }
        return Ok(());
    }

    // Credential precondition: abort before any work when the key is absent.
    let client = DatasetClient::from_env().context("dataset-provider credential check failed")?;

    let source = DatasetSource::new(&cli.workspace, &cli.project, cli.dataset_version);
    let manifest = client
        .ensure_local(&source, &cli.dataset_dir)
        .await
        .context("dataset download failed")?;

    let device = Device::detect().await;
    tracing::info!(device = device.as_arg(), "selected compute device");

    let runner = SweepRunner::new(
        &cli.base_dir,
        grid,
        PretrainedZoo::new(&cli.weights_dir),
        Arc::new(YoloTrainer::new()),
        device,
    );
    let completed = runner.run(&manifest).await.context("sweep aborted")?;
    println!(
        "{completed} runs completed; registry at {}",
        runner.registry_path().display()
    );
    Ok(())
}
