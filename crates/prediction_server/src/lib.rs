//! HTTP prediction service with drift tracking.
//!
//! - `POST /predict/` classifies an uploaded image and records its statistics
//! - `GET /data-drifting-report` renders current records against reference data
//!
//! The model, object store, drift reporter and image preprocessor are all
//! injected through [`AppState`].

pub mod config;
pub mod drift;
pub mod error;
pub mod handlers;
pub mod model;
pub mod state;
pub mod storage;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

pub use config::ServerConfig;
pub use drift::{
    calculate_image_params, DriftReporter, ImageParams, SummaryDriftReporter, Table,
    CURRENT_DATA_KEY, REFERENCE_DATA_KEY,
};
pub use error::{ServerError, ServerResult};
pub use handlers::PredictResponse;
pub use model::{HeuristicModel, InferenceModel, Prediction};
pub use state::AppState;
pub use storage::{HttpObjectStore, LocalObjectStore, ObjectStore};

pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/predict/", post(handlers::predict))
        .route("/data-drifting-report", get(handlers::data_drifting_report))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
