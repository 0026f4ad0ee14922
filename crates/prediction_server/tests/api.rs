//! Drives the router end to end with a directory-backed bucket.

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use face_dataset::VitPreprocessorBuilder;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use prediction_server::{
    router, AppState, HeuristicModel, LocalObjectStore, PredictResponse, Prediction,
    SummaryDriftReporter, Table, CURRENT_DATA_KEY, REFERENCE_DATA_KEY,
};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const BOUNDARY: &str = "face-dataset-test-boundary";

struct Harness {
    _tmp: tempfile::TempDir,
    bucket: PathBuf,
    drift_dir: PathBuf,
    app: Router,
}

fn harness() -> anyhow::Result<Harness> {
    let tmp = tempfile::tempdir()?;
    let store = LocalObjectStore::new(tmp.path().join("store"), "test-bucket");
    let bucket = tmp.path().join("store/test-bucket");
    let drift_dir = tmp.path().join("drifting");
    let state = AppState::new(
        Arc::new(VitPreprocessorBuilder::new().size(Some((8, 8))).build()),
        Arc::new(HeuristicModel::default()),
        Arc::new(store),
        Arc::new(SummaryDriftReporter::default()),
        drift_dir.clone(),
    );
    Ok(Harness {
        _tmp: tmp,
        bucket,
        drift_dir,
        app: router(state),
    })
}

fn jpeg_bytes(color: [u8; 3]) -> anyhow::Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 12, Rgb(color)))
        .write_to(&mut out, ImageFormat::Jpeg)?;
    Ok(out.into_inner())
}

fn multipart_request(field: &str, payload: &[u8]) -> anyhow::Result<Request<Body>> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"image_0.jpg\"\r\nContent-Type: image/jpeg\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(payload);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    Ok(Request::builder()
        .method("POST")
        .uri("/predict/")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))?)
}

async fn read_body(resp: axum::response::Response) -> anyhow::Result<Vec<u8>> {
    Ok(to_bytes(resp.into_body(), usize::MAX).await?.to_vec())
}

async fn wait_for_rows(path: &Path, rows: usize) -> anyhow::Result<Table> {
    for _ in 0..100 {
        if let Ok(data) = std::fs::read(path) {
            let table = Table::from_csv_bytes(&data)?;
            if table.rows.len() >= rows {
                return Ok(table);
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    anyhow::bail!("{} never reached {rows} rows", path.display())
}

#[tokio::test]
async fn predict_returns_inference_and_records_drift_row() -> anyhow::Result<()> {
    let h = harness()?;
    let resp = h
        .app
        .clone()
        .oneshot(multipart_request("data", &jpeg_bytes([240, 240, 240])?)?)
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: PredictResponse = serde_json::from_slice(&read_body(resp).await?)?;
    assert_eq!(body.message, "OK");
    assert_eq!(body.inference, Prediction::Attractive);

    let uploaded = wait_for_rows(&h.bucket.join(CURRENT_DATA_KEY), 1).await?;
    assert_eq!(uploaded.columns.len(), 9);
    let row = &uploaded.rows[0];
    assert_eq!(row[0], "16");
    assert_eq!(row[1], "12");
    assert_eq!(row[7], "1");
    assert!(row[8].contains(", "), "timestamp {:?}", row[8]);
    assert!(h.drift_dir.join("current_data.csv").is_file());
    Ok(())
}

#[tokio::test]
async fn predictions_accumulate_in_one_file() -> anyhow::Result<()> {
    let h = harness()?;
    for color in [[250, 250, 250], [5, 5, 5]] {
        let resp = h
            .app
            .clone()
            .oneshot(multipart_request("data", &jpeg_bytes(color)?)?)
            .await?;
        assert_eq!(resp.status(), StatusCode::OK);
    }
    let local = wait_for_rows(&h.drift_dir.join("current_data.csv"), 2).await?;
    let mut flags: Vec<&str> = local.rows.iter().map(|r| r[7].as_str()).collect();
    flags.sort();
    assert_eq!(flags, vec!["0", "1"]);
    Ok(())
}

#[tokio::test]
async fn predict_without_data_field_is_bad_request() -> anyhow::Result<()> {
    let h = harness()?;
    let resp = h
        .app
        .oneshot(multipart_request("file", &jpeg_bytes([1, 2, 3])?)?)
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = serde_json::from_slice(&read_body(resp).await?)?;
    assert!(body["detail"].as_str().unwrap_or_default().contains("data"));
    Ok(())
}

#[tokio::test]
async fn predict_with_undecodable_image_is_bad_request() -> anyhow::Result<()> {
    let h = harness()?;
    let resp = h
        .app
        .oneshot(multipart_request("data", b"definitely not a jpeg")?)
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(!h.drift_dir.join("current_data.csv").exists());
    Ok(())
}

#[tokio::test]
async fn drift_report_compares_current_against_reference() -> anyhow::Result<()> {
    let h = harness()?;
    let drifting = h.bucket.join("data/drifting");
    std::fs::create_dir_all(&drifting)?;
    std::fs::write(
        drifting.join("reference_data.csv"),
        "brightness,contrast,inference\n100,10,1\n120,12,0\n",
    )?;
    std::fs::write(
        drifting.join("current_data.csv"),
        "brightness,contrast,inference,timestamp\n110,11,1,\"01/02/2024, 03:04:05\"\n",
    )?;

    let resp = h
        .app
        .oneshot(
            Request::builder()
                .uri("/data-drifting-report")
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let content_type = resp
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/html"));
    let html = String::from_utf8(read_body(resp).await?)?;
    assert!(html.contains("<td>brightness</td>"));
    assert!(html.contains("<td>inference</td>"));
    assert!(!html.contains("timestamp"));
    assert!(html.contains("Current rows: 1."));
    Ok(())
}

#[tokio::test]
async fn drift_report_without_reference_is_not_found() -> anyhow::Result<()> {
    let h = harness()?;
    let resp = h
        .app
        .oneshot(
            Request::builder()
                .uri("/data-drifting-report")
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = serde_json::from_slice(&read_body(resp).await?)?;
    assert_eq!(
        body["detail"],
        format!("object {REFERENCE_DATA_KEY} not found")
    );
    Ok(())
}
