use std::path::PathBuf;
use std::sync::Arc;

use face_dataset::VitPreprocessor;

use crate::drift::SummaryDriftReporter;
use crate::error::{ServerError, ServerResult};
use crate::model::{HeuristicModel, DEFAULT_MODEL_THRESHOLD};
use crate::state::AppState;
use crate::storage::{HttpObjectStore, LocalObjectStore, ObjectStore};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_BUCKET_NAME: &str = "project-mloperations-data";
pub const DEFAULT_OBJECT_STORE_ROOT: &str = "bucket";
pub const DEFAULT_DRIFT_DIR: &str = "data/drifting";

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub bucket: String,
    /// S3-compatible endpoint; a local directory bucket is used when unset.
    pub object_store_endpoint: Option<String>,
    pub object_store_root: PathBuf,
    pub model_threshold: f32,
    /// Local directory holding the current-data CSV before upload.
    pub drift_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.into(),
            bucket: DEFAULT_BUCKET_NAME.into(),
            object_store_endpoint: None,
            object_store_root: PathBuf::from(DEFAULT_OBJECT_STORE_ROOT),
            model_threshold: DEFAULT_MODEL_THRESHOLD,
            drift_dir: PathBuf::from(DEFAULT_DRIFT_DIR),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> ServerResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ServerResult<Self> {
        let defaults = Self::default();
        let model_threshold = match lookup("MODEL_THRESHOLD") {
            Some(raw) => raw.trim().parse::<f32>().map_err(|e| {
                ServerError::Config(format!("MODEL_THRESHOLD={raw:?} is not a number: {e}"))
            })?,
            None => defaults.model_threshold,
        };
        Ok(Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            bucket: lookup("BUCKET_NAME").unwrap_or(defaults.bucket),
            object_store_endpoint: lookup("OBJECT_STORE_ENDPOINT").filter(|s| !s.is_empty()),
            object_store_root: lookup("OBJECT_STORE_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.object_store_root),
            model_threshold,
            drift_dir: lookup("DRIFT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.drift_dir),
        })
    }

    pub fn build_store(&self) -> ServerResult<Arc<dyn ObjectStore>> {
        Ok(match &self.object_store_endpoint {
            Some(endpoint) => Arc::new(HttpObjectStore::new(endpoint, &self.bucket)?),
            None => Arc::new(LocalObjectStore::new(&self.object_store_root, &self.bucket)),
        })
    }

    /// Wire the default collaborators: ViT preprocessing, the heuristic model
    /// and the summary drift reporter.
    pub fn build_state(&self) -> ServerResult<AppState> {
        let store = self.build_store()?;
        tracing::warn!(
            threshold = self.model_threshold,
            "no trained classifier configured; using heuristic model"
        );
        Ok(AppState::new(
            Arc::new(VitPreprocessor::default()),
            Arc::new(HeuristicModel::new(self.model_threshold)),
            store,
            Arc::new(SummaryDriftReporter::default()),
            self.drift_dir.clone(),
        ))
    }
}
