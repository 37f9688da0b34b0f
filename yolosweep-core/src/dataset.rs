//! Hosted dataset provider client.
//!
//! Resolves a (workspace, project, version) triple into a local dataset
//! directory containing a `data.yaml` manifest and image/label files. The
//! provider credential is the single hard precondition of the whole sweep:
//! without it, nothing runs.

use crate::error::SweepError;
use serde::Deserialize;
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// Environment variable holding the dataset-provider API key.
pub const API_KEY_VAR: &str = "ROBOFLOW_API_KEY";

const DEFAULT_BASE_URL: &str = "https://api.roboflow.com";
const MANIFEST_NAME: &str = "data.yaml";

/// Validate a credential value read from the environment.
///
/// Pure so the precondition is testable without touching process state.
pub fn validate_api_key(value: Option<String>) -> Result<String, SweepError> {
    match value {
        Some(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
        _ => Err(SweepError::missing_credential(format!(
            "{API_KEY_VAR} is not set; export it before starting a sweep"
        ))),
    }
}

/// Read and validate the provider credential from the process environment.
pub fn api_key_from_env() -> Result<String, SweepError> {
    validate_api_key(std::env::var(API_KEY_VAR).ok())
}

/// Identifies one hosted dataset export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSource {
    pub workspace: String,
    pub project: String,
    pub version: u32,
}

impl DatasetSource {
    pub fn new(workspace: impl Into<String>, project: impl Into<String>, version: u32) -> Self {
        Self {
            workspace: workspace.into(),
            project: project.into(),
            version,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExportResponse {
    export: ExportLink,
}

#[derive(Debug, Deserialize)]
struct ExportLink {
    link: String,
}

/// HTTP client for the dataset provider's export API.
pub struct DatasetClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl DatasetClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, SweepError> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, SweepError> {
        let api_key = validate_api_key(Some(api_key.into()))?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
        })
    }

    /// Construct from the process environment, failing fast when the
    /// credential is absent.
    pub fn from_env() -> Result<Self, SweepError> {
        Self::new(api_key_from_env()?)
    }

    /// Ensure the dataset export is present under `dest` and return the path
    /// to its manifest.
    ///
    /// Skips the download when the manifest already exists locally; the
    /// provider owns versioning, so a present export is taken as current.
    pub async fn ensure_local(
        &self,
        source: &DatasetSource,
        dest: &Path,
    ) -> Result<PathBuf, SweepError> {
        let manifest = dest.join(MANIFEST_NAME);
        if manifest.exists() {
            tracing::info!(path = %manifest.display(), "dataset already present, skipping download");
            return Ok(manifest);
        }

        std::fs::create_dir_all(dest)?;

        let export_url = format!(
            "{}/{}/{}/{}/yolov8",
            self.base_url, source.workspace, source.project, source.version
        );
        tracing::info!(
            workspace = %source.workspace,
            project = %source.project,
            version = source.version,
            "requesting dataset export"
        );
        let export: ExportResponse = self
            .http
            .get(&export_url)
            .query(&[("api_key", self.api_key.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let archive = self
            .http
            .get(&export.export.link)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        tracing::info!(bytes = archive.len(), "downloaded dataset archive");

        zip::ZipArchive::new(Cursor::new(archive))?.extract(dest)?;

        if !manifest.exists() {
            return Err(SweepError::dataset(format!(
                "export of {}/{} v{} contained no {MANIFEST_NAME}",
                source.workspace, source.project, source.version
            )));
        }
        Ok(manifest)
    }
}
