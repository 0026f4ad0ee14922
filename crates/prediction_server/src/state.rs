use std::path::PathBuf;
use std::sync::Arc;

use face_dataset::ImagePreprocessor;
use tokio::sync::Mutex;

use crate::drift::{DriftReporter, CURRENT_DATA_FILE};
use crate::model::InferenceModel;
use crate::storage::ObjectStore;

/// Collaborators shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    pub preprocessor: Arc<dyn ImagePreprocessor>,
    pub model: Arc<dyn InferenceModel>,
    pub store: Arc<dyn ObjectStore>,
    pub reporter: Arc<dyn DriftReporter>,
    pub drift_dir: PathBuf,
    /// Serialises appends to the current-data file and its upload.
    pub record_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(
        preprocessor: Arc<dyn ImagePreprocessor>,
        model: Arc<dyn InferenceModel>,
        store: Arc<dyn ObjectStore>,
        reporter: Arc<dyn DriftReporter>,
        drift_dir: PathBuf,
    ) -> Self {
        tracing::info!(
            preprocessor = %preprocessor.describe(),
            model = %model.describe(),
            store = %store.describe(),
            drift_dir = %drift_dir.display(),
            "prediction service state"
        );
        Self {
            preprocessor,
            model,
            store,
            reporter,
            drift_dir,
            record_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn current_data_path(&self) -> PathBuf {
        self.drift_dir.join(CURRENT_DATA_FILE)
    }
}
