//! Drift records and reports.
//!
//! Every prediction appends one row of image statistics plus the predicted
//! flag and a timestamp to the current-data CSV. The report compares that
//! file against the reference CSV column by column.

use chrono::Local;
use image::DynamicImage;
use std::fs::OpenOptions;
use std::path::Path;

use crate::error::{ServerError, ServerResult};
use crate::model::Prediction;

pub const REFERENCE_DATA_KEY: &str = "data/drifting/reference_data.csv";
pub const CURRENT_DATA_KEY: &str = "data/drifting/current_data.csv";
pub const CURRENT_DATA_FILE: &str = "current_data.csv";
pub const TIMESTAMP_FORMAT: &str = "%m/%d/%Y, %H:%M:%S";

/// Header written when the current-data file is created.
pub const RECORD_COLUMNS: [&str; 9] = [
    "width",
    "height",
    "mean_r",
    "mean_g",
    "mean_b",
    "brightness",
    "contrast",
    "inference",
    "timestamp",
];

/// Per-image statistics tracked for drift.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageParams {
    pub width: u32,
    pub height: u32,
    pub mean_r: f64,
    pub mean_g: f64,
    pub mean_b: f64,
    /// Mean luminance (ITU-R BT.601 weights), 0..255.
    pub brightness: f64,
    /// Standard deviation of luminance.
    pub contrast: f64,
}

impl ImageParams {
    fn to_fields(self) -> [String; 7] {
        [
            self.width.to_string(),
            self.height.to_string(),
            format!("{:.4}", self.mean_r),
            format!("{:.4}", self.mean_g),
            format!("{:.4}", self.mean_b),
            format!("{:.4}", self.brightness),
            format!("{:.4}", self.contrast),
        ]
    }
}

pub fn calculate_image_params(image: &DynamicImage) -> ImageParams {
    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();
    let count = (width as f64) * (height as f64);
    if count == 0.0 {
        return ImageParams {
            width,
            height,
            mean_r: 0.0,
            mean_g: 0.0,
            mean_b: 0.0,
            brightness: 0.0,
            contrast: 0.0,
        };
    }

    let mut sums = [0f64; 3];
    let mut luma_sum = 0f64;
    let mut luma_sq = 0f64;
    for px in rgb.pixels() {
        let [r, g, b] = px.0.map(f64::from);
        sums[0] += r;
        sums[1] += g;
        sums[2] += b;
        let luma = 0.299 * r + 0.587 * g + 0.114 * b;
        luma_sum += luma;
        luma_sq += luma * luma;
    }
    let brightness = luma_sum / count;
    let variance = (luma_sq / count - brightness * brightness).max(0.0);
    ImageParams {
        width,
        height,
        mean_r: sums[0] / count,
        mean_g: sums[1] / count,
        mean_b: sums[2] / count,
        brightness,
        contrast: variance.sqrt(),
    }
}

pub fn timestamp_now() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Append one prediction record to `path`, writing the header if the file is new.
pub fn append_record(
    path: &Path,
    params: ImageParams,
    prediction: Prediction,
    timestamp: &str,
) -> ServerResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ServerError::io(parent, e))?;
    }
    let is_new = !path.exists();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| ServerError::io(path, e))?;
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(file);
    if is_new {
        writer.write_record(RECORD_COLUMNS)?;
    }
    let [width, height, r, g, b, brightness, contrast] = params.to_fields();
    writer.write_record([
        width,
        height,
        r,
        g,
        b,
        brightness,
        contrast,
        prediction.as_flag().to_string(),
        timestamp.to_string(),
    ])?;
    writer.flush().map_err(|e| ServerError::io(path, e))?;
    Ok(())
}

/// A CSV file held as text cells; the first row is the header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnStats {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
}

impl Table {
    pub fn from_csv_bytes(data: &[u8]) -> ServerResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(data);
        let columns = reader.headers()?.iter().map(str::to_string).collect();
        let rows = reader
            .records()
            .map(|r| r.map(|rec| rec.iter().map(str::to_string).collect()))
            .collect::<Result<Vec<Vec<String>>, csv::Error>>()?;
        Ok(Self { columns, rows })
    }

    pub fn drop_last_column(&mut self) {
        if self.columns.pop().is_some() {
            let width = self.columns.len();
            for row in &mut self.rows {
                row.truncate(width);
            }
        }
    }

    /// Mean and population std of the numeric cells in `column`.
    pub fn column_stats(&self, column: &str) -> Option<ColumnStats> {
        let idx = self.columns.iter().position(|c| c == column)?;
        let values: Vec<f64> = self
            .rows
            .iter()
            .filter_map(|row| row.get(idx))
            .filter_map(|cell| cell.parse::<f64>().ok())
            .collect();
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Some(ColumnStats {
            count: values.len(),
            mean,
            std: var.sqrt(),
        })
    }
}

/// Renders an HTML comparison of current data against reference data.
pub trait DriftReporter: Send + Sync {
    fn run(&self, reference: &Table, current: &Table) -> ServerResult<String>;
}

/// Per-column mean/std comparison; a column drifts when its current mean moves
/// more than `threshold` reference standard deviations.
#[derive(Debug, Clone, Copy)]
pub struct SummaryDriftReporter {
    pub threshold: f64,
}

impl Default for SummaryDriftReporter {
    fn default() -> Self {
        Self { threshold: 1.0 }
    }
}

impl SummaryDriftReporter {
    fn shift(reference: ColumnStats, current: ColumnStats) -> f64 {
        let delta = (current.mean - reference.mean).abs();
        if reference.std > 0.0 {
            delta / reference.std
        } else if delta == 0.0 {
            0.0
        } else {
            f64::INFINITY
        }
    }
}

impl DriftReporter for SummaryDriftReporter {
    fn run(&self, reference: &Table, current: &Table) -> ServerResult<String> {
        if reference.columns.is_empty() {
            return Err(ServerError::Report("reference data has no columns".into()));
        }
        let mut body = String::new();
        let mut compared = 0usize;
        let mut drifted = 0usize;
        for column in &reference.columns {
            let name = escape_html(column);
            match (reference.column_stats(column), current.column_stats(column)) {
                (Some(r), Some(c)) => {
                    let shift = Self::shift(r, c);
                    let drift = shift > self.threshold;
                    compared += 1;
                    drifted += usize::from(drift);
                    body.push_str(&format!(
                        "<tr><td>{name}</td><td>{:.4}</td><td>{:.4}</td><td>{:.4}</td><td>{:.4}</td><td>{shift:.3}</td><td>{}</td></tr>\n",
                        r.mean,
                        r.std,
                        c.mean,
                        c.std,
                        if drift { "yes" } else { "no" }
                    ));
                }
                (Some(_), None) => body.push_str(&format!(
                    "<tr><td>{name}</td><td colspan=\"6\">no numeric values in current data</td></tr>\n"
                )),
                (None, _) => body.push_str(&format!(
                    "<tr><td>{name}</td><td colspan=\"6\">not numeric</td></tr>\n"
                )),
            }
        }

        Ok(format!(
            "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>Data drift report</title></head>\n<body>\n\
             <h1>Data drift report</h1>\n\
             <p>Reference rows: {}. Current rows: {}.</p>\n\
             <p>Drift detected in {drifted} of {compared} columns (threshold {} std).</p>\n\
             <table>\n<thead><tr><th>column</th><th>reference mean</th><th>reference std</th>\
             <th>current mean</th><th>current std</th><th>shift</th><th>drift</th></tr></thead>\n\
             <tbody>\n{body}</tbody>\n</table>\n</body>\n</html>\n",
            reference.rows.len(),
            current.rows.len(),
            self.threshold,
        ))
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn params_of_uniform_image() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 2, Rgb([100, 50, 200])));
        let p = calculate_image_params(&img);
        assert_eq!((p.width, p.height), (4, 2));
        assert_eq!((p.mean_r, p.mean_g, p.mean_b), (100.0, 50.0, 200.0));
        assert!((p.brightness - (29.9 + 29.35 + 22.8)).abs() < 1e-9);
        assert!(p.contrast.abs() < 1e-3);
    }

    #[test]
    fn contrast_grows_with_spread() {
        let mut img = RgbImage::from_pixel(2, 1, Rgb([0, 0, 0]));
        img.put_pixel(1, 0, Rgb([255, 255, 255]));
        let p = calculate_image_params(&DynamicImage::ImageRgb8(img));
        assert!((p.brightness - 127.5).abs() < 1e-6);
        assert!((p.contrast - 127.5).abs() < 1e-6);
    }

    #[test]
    fn records_append_under_single_header() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("drift/current_data.csv");
        let params = calculate_image_params(&DynamicImage::ImageRgb8(RgbImage::from_pixel(
            2,
            2,
            Rgb([10, 20, 30]),
        )));
        append_record(&path, params, Prediction::Attractive, "01/02/2024, 03:04:05").unwrap();
        append_record(&path, params, Prediction::NotAttractive, "01/02/2024, 03:04:06").unwrap();

        let table = Table::from_csv_bytes(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(table.columns, RECORD_COLUMNS);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][7], "1");
        assert_eq!(table.rows[1][7], "0");
        assert_eq!(table.rows[1][8], "01/02/2024, 03:04:06");
    }

    #[test]
    fn drop_last_column_trims_rows() {
        let mut t = Table::from_csv_bytes(b"a,b,ts\n1,2,x\n3,4,y\n").unwrap();
        t.drop_last_column();
        assert_eq!(t.columns, vec!["a", "b"]);
        assert_eq!(t.rows, vec![vec!["1", "2"], vec!["3", "4"]]);
        assert_eq!(t.column_stats("b").unwrap().mean, 3.0);
    }

    #[test]
    fn summary_report_flags_shifted_columns() {
        let reference = Table::from_csv_bytes(b"a,b\n1,10\n3,10\n").unwrap();
        let current = Table::from_csv_bytes(b"a,b\n2,20\n2,20\n").unwrap();
        let html = SummaryDriftReporter::default()
            .run(&reference, &current)
            .unwrap();
        assert!(html.contains("Drift detected in 1 of 2 columns"));
        assert!(html.contains("<td>a</td>"));
        assert!(html.contains("<td>b</td>"));
    }

    #[test]
    fn report_escapes_column_names() {
        let reference = Table::from_csv_bytes(b"<x>\n1\n").unwrap();
        let html = SummaryDriftReporter::default()
            .run(&reference, &Table::default())
            .unwrap();
        assert!(html.contains("&lt;x&gt;"));
        assert!(html.contains("no numeric values in current data"));
    }
}
