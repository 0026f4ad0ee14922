//! Listing processed images and reading the label file.
//!
//! Image row `i` is paired with label row `i` purely by position: the image
//! listing is sorted lexicographically by path and the label file is read in
//! file order. Nothing checks that the pairing is meaningful. Note that
//! lexicographic order puts `image_10.jpg` before `image_2.jpg`; callers that
//! add or rename images without rewriting the label file misalign every row
//! after the change.

use crate::types::{DatasetResult, FaceDatasetError, LabelRow};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const LABELS_FILE: &str = "labels.csv";
pub const IMAGES_SUBDIR: &str = "images";
const IMAGE_EXTENSION: &str = "jpg";

/// List `*.jpg` files under `dir`, sorted ascending by path.
pub fn list_images(dir: &Path) -> DatasetResult<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| FaceDatasetError::io(dir, e))?;
    let mut images = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| FaceDatasetError::io(dir, e))?.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some(IMAGE_EXTENSION) {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

/// Like [`list_images`], but an empty listing is an error.
pub fn list_images_required(dir: &Path) -> DatasetResult<Vec<PathBuf>> {
    let images = list_images(dir)?;
    if images.is_empty() {
        return Err(FaceDatasetError::NotFound {
            path: dir.to_path_buf(),
            msg: format!("no .{IMAGE_EXTENSION} images detected"),
        });
    }
    Ok(images)
}

/// Parse a header-less, comma-separated numeric label file.
pub fn read_labels(path: &Path) -> DatasetResult<Vec<LabelRow>> {
    let file = fs::File::open(path).map_err(|e| FaceDatasetError::io(path, e))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let mut rows: Vec<LabelRow> = Vec::new();
    let mut width: Option<usize> = None;
    for record in reader.records() {
        let record = record.map_err(|e| FaceDatasetError::Csv {
            path: path.to_path_buf(),
            source: e,
        })?;
        let line = record.position().map(|p| p.line() as usize).unwrap_or(0);
        if record.iter().all(|f| f.is_empty()) {
            continue;
        }
        let row = record
            .iter()
            .enumerate()
            .map(|(col, field)| {
                field.parse::<f32>().map_err(|_| FaceDatasetError::Parse {
                    path: path.to_path_buf(),
                    line,
                    msg: format!("column {col}: {field:?} is not a number"),
                })
            })
            .collect::<DatasetResult<LabelRow>>()?;
        match width {
            None => width = Some(row.len()),
            Some(w) if w != row.len() => {
                return Err(FaceDatasetError::Parse {
                    path: path.to_path_buf(),
                    line,
                    msg: format!("expected {w} columns, found {}", row.len()),
                });
            }
            _ => {}
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Index-aligned image references and label rows, shared read-only.
#[derive(Debug, Clone)]
pub struct LabeledImageSet {
    pub images: Arc<[PathBuf]>,
    pub labels: Arc<[LabelRow]>,
}

impl LabeledImageSet {
    pub fn new(images: Vec<PathBuf>, labels: Vec<LabelRow>) -> Self {
        Self {
            images: images.into(),
            labels: labels.into(),
        }
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn label_count(&self) -> usize {
        self.labels.len()
    }
}

/// Reader for a processed dataset directory (`labels.csv` + `images/*.jpg`).
#[derive(Debug, Clone)]
pub struct ImageLabelStore {
    root: PathBuf,
}

impl ImageLabelStore {
    pub fn new(processed_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: processed_dir.into(),
        }
    }

    pub fn labels_path(&self) -> PathBuf {
        self.root.join(LABELS_FILE)
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root.join(IMAGES_SUBDIR)
    }

    pub fn load(&self) -> DatasetResult<LabeledImageSet> {
        let labels = read_labels(&self.labels_path())?;
        let images = list_images(&self.images_dir())?;
        Ok(LabeledImageSet::new(images, labels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn images_sorted_lexicographically_and_filtered() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["image_2.jpg", "image_10.jpg", "image_1.jpg", "notes.txt", "x.png"] {
            fs::write(tmp.path().join(name), b"").unwrap();
        }
        fs::create_dir(tmp.path().join("dir.jpg")).unwrap();
        let names: Vec<String> = list_images(tmp.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["image_1.jpg", "image_10.jpg", "image_2.jpg"]);
    }

    #[test]
    fn missing_directory_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let err = list_images(&tmp.path().join("nope")).unwrap_err();
        assert!(matches!(err, FaceDatasetError::NotFound { .. }));
    }

    #[test]
    fn listing_a_file_is_an_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("labels.csv");
        fs::write(&file, "1\n").unwrap();
        match list_images(&file).unwrap_err() {
            FaceDatasetError::Io { path, .. } => assert_eq!(path, file),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn empty_listing_rejected_when_required() {
        let tmp = tempfile::tempdir().unwrap();
        let err = list_images_required(tmp.path()).unwrap_err();
        assert!(matches!(err, FaceDatasetError::NotFound { .. }));
    }

    #[test]
    fn labels_parse_rows_and_skip_blank_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("labels.csv");
        fs::write(&path, "1\n0\n\n1\n").unwrap();
        let rows = read_labels(&path).unwrap();
        assert_eq!(rows, vec![vec![1.0], vec![0.0], vec![1.0]]);
    }

    #[test]
    fn malformed_label_is_parse_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("labels.csv");
        fs::write(&path, "1,0\n0,abc\n").unwrap();
        match read_labels(&path).unwrap_err() {
            FaceDatasetError::Parse { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn ragged_label_rows_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("labels.csv");
        fs::write(&path, "1,0\n1\n").unwrap();
        assert!(matches!(
            read_labels(&path),
            Err(FaceDatasetError::Parse { .. })
        ));
    }
}
