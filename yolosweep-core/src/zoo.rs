//! Pretrained checkpoint resolution.

use crate::config::ModelSize;
use crate::error::SweepError;
use std::path::PathBuf;

const RELEASE_BASE_URL: &str = "https://github.com/ultralytics/assets/releases/download/v8.2.0";

/// Local cache of pretrained YOLOv8 checkpoints, filled on demand.
pub struct PretrainedZoo {
    cache_dir: PathBuf,
}

impl PretrainedZoo {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// Checkpoint filename for a scale, e.g. `yolov8n.pt`.
    pub fn weight_name(size: ModelSize) -> String {
        format!("{}.pt", size.model_tag())
    }

    pub fn weight_path(&self, size: ModelSize) -> PathBuf {
        self.cache_dir.join(Self::weight_name(size))
    }

    /// Return the local checkpoint path for `size`, downloading it from the
    /// upstream release when not cached yet.
    pub async fn resolve(&self, size: ModelSize) -> Result<PathBuf, SweepError> {
        let target = self.weight_path(size);
        if target.exists() {
            return Ok(target);
        }

        std::fs::create_dir_all(&self.cache_dir)?;
        let url = format!("{RELEASE_BASE_URL}/{}", Self::weight_name(size));
        tracing::info!(%url, "downloading pretrained checkpoint");
        let bytes = reqwest::get(&url)
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        if bytes.is_empty() {
            return Err(SweepError::model(format!(
                "empty checkpoint download from {url}"
            )));
        }
        std::fs::write(&target, &bytes)?;
        Ok(target)
    }
}
