//! # yolosweep-core — YOLOv8 grid-search fine-tuning driver
//!
//! This crate provides everything the sweep binary needs: the run
//! configuration and grid model, the hosted dataset client, the pretrained
//! checkpoint zoo, the trainer seam around the external training CLI, the
//! run-tracking registry, and the sequential grid driver itself.
//!
//! The heavy lifting — model architecture, optimizer, loss, metric
//! computation — stays with the external trainer; this crate is the
//! orchestration around it.

pub mod config;
pub mod dataset;
pub mod error;
pub mod metrics;
pub mod sweep;
pub mod tracking;
pub mod trainer;
pub mod zoo;

pub use config::{ModelSize, OptimizerKind, RunConfig, SweepGrid};
pub use dataset::{DatasetClient, DatasetSource};
pub use error::SweepError;
pub use sweep::SweepRunner;
pub use tracking::{RunRecord, RunRegistry, RunStatus, TrackingSession};
pub use trainer::{Device, TrainRequest, Trainer, YoloTrainer};
pub use zoo::PretrainedZoo;
