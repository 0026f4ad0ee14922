//! Core types, error definitions, and data structures for face_dataset.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub type DatasetResult<T> = Result<T, FaceDatasetError>;

/// Number of images in the full CelebA release.
pub const MAX_DATASET_LENGTH: usize = 202_599;
/// Publisher-recommended split boundaries for the full dataset.
pub const CANONICAL_TRAIN_END: usize = 162_770;
pub const CANONICAL_VAL_END: usize = 182_637;
/// Default prefix length kept per split in light mode.
pub const LIGHT_WEIGHT_AMOUNT: usize = 5;
pub const DEFAULT_BATCH_SIZE: usize = 64;
/// Images processed when `process_raw_data(reduced = true)`.
pub const REDUCED_IMAGE_COUNT: usize = 5000;

#[derive(Debug, Error)]
pub enum FaceDatasetError {
    #[error("not found: {path}: {msg}")]
    NotFound { path: PathBuf, msg: String },
    #[error("label parse error at {path}:{line}: {msg}")]
    Parse {
        path: PathBuf,
        line: usize,
        msg: String,
    },
    #[error("csv error at {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("image load error at {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("image write error at {path}: {source}")]
    ImageWrite {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{split} split requested before setup()")]
    NotInitialized { split: SplitKind },
    #[error("index {index} out of range for dataset of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("label/image count mismatch: {images} images, {labels} label rows")]
    Misaligned { images: usize, labels: usize },
    #[error("{0}")]
    Other(String),
}

impl FaceDatasetError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            return FaceDatasetError::NotFound {
                path: path.to_path_buf(),
                msg: source.to_string(),
            };
        }
        FaceDatasetError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// One row of the processed label file (one value per column).
pub type LabelRow = Vec<f32>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitKind {
    Train,
    Val,
    Test,
}

impl SplitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SplitKind::Train => "train",
            SplitKind::Val => "val",
            SplitKind::Test => "test",
        }
    }
}

impl std::fmt::Display for SplitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Preprocessed image in CHW layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PixelValues {
    pub data: Vec<f32>,
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

impl PixelValues {
    pub fn shape(&self) -> [usize; 3] {
        [self.channels, self.height, self.width]
    }

    /// Convert back to 8-bit RGB the way tensor image writers do:
    /// `v * 255 + 0.5`, clamped to `[0, 255]`. Values are not denormalized.
    pub fn to_rgb8(&self) -> DatasetResult<image::RgbImage> {
        if self.channels != 3 {
            return Err(FaceDatasetError::InvalidConfig(format!(
                "expected 3 channels to write an RGB image, got {}",
                self.channels
            )));
        }
        let plane = self.height * self.width;
        if self.data.len() != plane * 3 {
            return Err(FaceDatasetError::InvalidConfig(format!(
                "pixel buffer has {} values, expected {}",
                self.data.len(),
                plane * 3
            )));
        }
        let to_u8 = |v: f32| (v * 255.0 + 0.5).clamp(0.0, 255.0) as u8;
        let img = image::RgbImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            let base = y as usize * self.width + x as usize;
            image::Rgb([
                to_u8(self.data[base]),
                to_u8(self.data[plane + base]),
                to_u8(self.data[2 * plane + base]),
            ])
        });
        Ok(img)
    }
}

/// Materialized unit returned by dataset access.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub pixel_values: PixelValues,
    pub labels: LabelRow,
}

/// Train/val/test fractions; they need not sum to exactly 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitRatios {
    pub train: f64,
    pub val: f64,
    pub test: f64,
}

impl Default for SplitRatios {
    fn default() -> Self {
        Self {
            train: 0.6,
            val: 0.2,
            test: 0.2,
        }
    }
}

impl From<[f64; 3]> for SplitRatios {
    fn from(r: [f64; 3]) -> Self {
        Self {
            train: r[0],
            val: r[1],
            test: r[2],
        }
    }
}

/// What `setup` does when the label file and image listing disagree in length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentPolicy {
    /// Slice both sequences at the split boundaries and ignore the surplus.
    #[default]
    Truncate,
    /// Fail with `Misaligned` unless label rows and images are equal in number.
    Strict,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SetupOptions {
    /// Portion of the listed images to use, in (0, 1].
    pub usage_fraction: f64,
    pub split: SplitRatios,
    /// Keep only the first `light_weight_amount` samples of every split.
    pub light_weight: bool,
    pub light_weight_amount: usize,
    pub alignment: AlignmentPolicy,
}

impl Default for SetupOptions {
    fn default() -> Self {
        Self {
            usage_fraction: 1.0,
            split: SplitRatios::default(),
            light_weight: false,
            light_weight_amount: LIGHT_WEIGHT_AMOUNT,
            alignment: AlignmentPolicy::default(),
        }
    }
}

impl SetupOptions {
    pub fn from_json_path(path: &Path) -> DatasetResult<Self> {
        let raw = std::fs::read(path).map_err(|e| FaceDatasetError::io(path, e))?;
        serde_json::from_slice(&raw).map_err(|e| {
            FaceDatasetError::InvalidConfig(format!("{}: {e}", path.display()))
        })
    }
}

/// Batching policy for the split loaders.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Shuffle indices before batching. Sequential order when false.
    pub shuffle: bool,
    /// Seed for reproducible shuffling.
    pub seed: Option<u64>,
    /// Drop the trailing partial batch.
    pub drop_last: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlignmentOutcome {
    Aligned,
    ExtraLabels,
    MissingLabels,
}

impl AlignmentOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlignmentOutcome::Aligned => "aligned",
            AlignmentOutcome::ExtraLabels => "extra_labels",
            AlignmentOutcome::MissingLabels => "missing_labels",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignmentReport {
    pub images: usize,
    pub labels: usize,
    pub outcome: AlignmentOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_options_json_fills_missing_fields_with_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("setup.json");
        std::fs::write(
            &path,
            r#"{"usage_fraction": 0.5, "split": {"train": 0.8, "val": 0.1, "test": 0.1}, "alignment": "strict"}"#,
        )
        .unwrap();
        let opts = SetupOptions::from_json_path(&path).unwrap();
        assert_eq!(opts.usage_fraction, 0.5);
        assert_eq!(opts.split, SplitRatios::from([0.8, 0.1, 0.1]));
        assert_eq!(opts.alignment, AlignmentPolicy::Strict);
        assert!(!opts.light_weight);
        assert_eq!(opts.light_weight_amount, LIGHT_WEIGHT_AMOUNT);
    }

    #[test]
    fn setup_options_json_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("setup.json");
        std::fs::write(&path, "{\"usage_fraction\": \"all\"}").unwrap();
        assert!(matches!(
            SetupOptions::from_json_path(&path),
            Err(FaceDatasetError::InvalidConfig(_))
        ));
        assert!(matches!(
            SetupOptions::from_json_path(&tmp.path().join("missing.json")),
            Err(FaceDatasetError::NotFound { .. })
        ));
    }
}
