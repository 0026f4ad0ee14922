use axum::extract::{Multipart, State};
use axum::response::Html;
use axum::Json;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::drift::{
    append_record, calculate_image_params, timestamp_now, ImageParams, Table, CURRENT_DATA_KEY,
    REFERENCE_DATA_KEY,
};
use crate::error::{ServerError, ServerResult};
use crate::model::Prediction;
use crate::state::AppState;

pub const UPLOAD_FIELD: &str = "data";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    pub inference: Prediction,
    pub message: String,
}

/// `POST /predict/`: classify the image in multipart field `data`.
///
/// The drift record is written after the response is produced, on a spawned task.
pub async fn predict(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ServerResult<Json<PredictResponse>> {
    let mut upload: Option<Bytes> = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(UPLOAD_FIELD) {
            upload = Some(field.bytes().await?);
            break;
        }
    }
    let data = upload.ok_or_else(|| {
        ServerError::BadRequest(format!("missing multipart field `{UPLOAD_FIELD}`"))
    })?;

    let worker = state.clone();
    let (prediction, params) = tokio::task::spawn_blocking(move || classify(&worker, &data))
        .await??;
    tracing::info!(inference = %prediction, width = params.width, height = params.height, "prediction");

    tokio::spawn(async move {
        if let Err(err) = record_prediction(&state, params, prediction).await {
            tracing::warn!(error = %err, "failed to record prediction for drift tracking");
        }
    });

    Ok(Json(PredictResponse {
        inference: prediction,
        message: "OK".into(),
    }))
}

fn classify(state: &AppState, data: &[u8]) -> ServerResult<(Prediction, ImageParams)> {
    let image = image::load_from_memory(data)
        .map_err(|e| ServerError::BadRequest(format!("could not decode image: {e}")))?;
    let pixel_values = state.preprocessor.preprocess(&image)?;
    let prediction = state.model.predict(&pixel_values);
    Ok((prediction, calculate_image_params(&image)))
}

/// Append the record locally, then upload the whole file under the current-data key.
pub async fn record_prediction(
    state: &AppState,
    params: ImageParams,
    prediction: Prediction,
) -> ServerResult<()> {
    let _guard = state.record_lock.lock().await;
    let path = state.current_data_path();
    let local = path.clone();
    let timestamp = timestamp_now();
    tokio::task::spawn_blocking(move || append_record(&local, params, prediction, &timestamp))
        .await??;
    state.store.upload(&path, CURRENT_DATA_KEY).await
}

/// `GET /data-drifting-report`: compare uploaded predictions against the reference data.
pub async fn data_drifting_report(State(state): State<AppState>) -> ServerResult<Html<String>> {
    let reference = Table::from_csv_bytes(&state.store.download(REFERENCE_DATA_KEY).await?)?;
    let mut current = Table::from_csv_bytes(&state.store.download(CURRENT_DATA_KEY).await?)?;
    // Timestamps are not compared.
    current.drop_last_column();
    tracing::info!(
        reference_rows = reference.rows.len(),
        current_rows = current.rows.len(),
        "building drift report"
    );
    let html = state.reporter.run(&reference, &current)?;
    Ok(Html(html))
}
