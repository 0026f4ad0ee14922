//! One-off conversion of the raw CelebA layout into the processed layout.

use crate::config::DataPaths;
use crate::preprocess::{open_image, ImagePreprocessor};
use crate::store::{list_images, IMAGES_SUBDIR, LABELS_FILE};
use crate::types::{DatasetResult, FaceDatasetError, REDUCED_IMAGE_COUNT};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Zero-based column of the "Attractive" attribute in the raw label file.
pub const ATTRACTIVE_COLUMN: usize = 3;
const LOG_EVERY_IMAGES: usize = 1000;

#[derive(Debug, Clone, Serialize)]
pub struct ProcessSummary {
    pub labels_path: PathBuf,
    pub labels_written: usize,
    pub images_dir: PathBuf,
    pub images_processed: usize,
}

/// Map the raw `-1 / 1` attribute encoding onto `0 / 1`.
pub fn remap_attribute(value: f64) -> i64 {
    let v = value as i64;
    if v == -1 {
        0
    } else {
        v
    }
}

/// Read the raw attribute file (one header row), keep `column`, remap it and
/// write a single-column integer CSV without a header. Returns the row count.
pub fn convert_raw_labels(src: &Path, dst: &Path, column: usize) -> DatasetResult<usize> {
    let file = fs::File::open(src).map_err(|e| FaceDatasetError::io(src, e))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let mut values = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| FaceDatasetError::Csv {
            path: src.to_path_buf(),
            source: e,
        })?;
        let line = record.position().map(|p| p.line() as usize).unwrap_or(0);
        if record.iter().all(|f| f.is_empty()) {
            continue;
        }
        let field = record.get(column).ok_or_else(|| FaceDatasetError::Parse {
            path: src.to_path_buf(),
            line,
            msg: format!("row has {} columns, expected column {column}", record.len()),
        })?;
        let value: f64 = field.parse().map_err(|_| FaceDatasetError::Parse {
            path: src.to_path_buf(),
            line,
            msg: format!("column {column}: {field:?} is not a number"),
        })?;
        values.push(remap_attribute(value));
    }

    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).map_err(|e| FaceDatasetError::io(parent, e))?;
    }
    let csv_err = |e: csv::Error| FaceDatasetError::Csv {
        path: dst.to_path_buf(),
        source: e,
    };
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_path(dst)
        .map_err(csv_err)?;
    for v in &values {
        writer.write_record([v.to_string()]).map_err(csv_err)?;
    }
    writer.flush().map_err(|e| FaceDatasetError::io(dst, e))?;
    Ok(values.len())
}

/// Write labels to `<processed>/labels.csv`, then decode, preprocess and save
/// every raw image as `<processed>/images/image_<i>.jpg`.
///
/// An empty raw image directory is an error. With `reduced`, only the first
/// 5000 images are processed; the label file is always written in full.
/// A single undecodable image aborts the run.
pub fn process_raw_data(
    paths: &DataPaths,
    preprocessor: &dyn ImagePreprocessor,
    reduced: bool,
) -> DatasetResult<ProcessSummary> {
    process_raw_data_with_limit(
        paths,
        preprocessor,
        reduced.then_some(REDUCED_IMAGE_COUNT),
    )
}

/// [`process_raw_data`] with an explicit cap on the number of images.
pub fn process_raw_data_with_limit(
    paths: &DataPaths,
    preprocessor: &dyn ImagePreprocessor,
    limit: Option<usize>,
) -> DatasetResult<ProcessSummary> {
    let labels_path = paths.processed_data_dir.join(LABELS_FILE);
    let labels_written =
        convert_raw_labels(&paths.raw_labels_path(), &labels_path, ATTRACTIVE_COLUMN)?;
    tracing::info!("Successfully saved labels under {}", labels_path.display());

    let raw_images_dir = paths.raw_images_dir();
    let mut raw_images = match list_images(&raw_images_dir) {
        Ok(images) => images,
        Err(FaceDatasetError::NotFound { .. }) => Vec::new(),
        Err(e) => return Err(e),
    };
    if raw_images.is_empty() {
        return Err(FaceDatasetError::NotFound {
            path: raw_images_dir.clone(),
            msg: format!(
                "No images detected in directory {}. Make sure the raw input images are set in the right place.",
                raw_images_dir.display()
            ),
        });
    }
    if let Some(limit) = limit {
        raw_images.truncate(limit);
    }
    let total = raw_images.len();

    let images_dir = paths.processed_data_dir.join(IMAGES_SUBDIR);
    fs::create_dir_all(&images_dir).map_err(|e| FaceDatasetError::io(&images_dir, e))?;

    for (id, raw_path) in raw_images.iter().enumerate() {
        if id % LOG_EVERY_IMAGES == 0 {
            tracing::info!("Processed {id} of {total} images");
        }
        let image = open_image(raw_path)?;
        let pixel_values = preprocessor.preprocess(&image)?;
        let out = images_dir.join(format!("image_{id}.jpg"));
        pixel_values
            .to_rgb8()?
            .save(&out)
            .map_err(|e| FaceDatasetError::ImageWrite {
                path: out.clone(),
                source: e,
            })?;
    }
    tracing::info!("Successfully processed all images.");

    Ok(ProcessSummary {
        labels_path,
        labels_written,
        images_dir,
        images_processed: total,
    })
}
