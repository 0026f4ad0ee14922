//! Per-split dataset view with lazy, per-index sample loading.

use crate::preprocess::{open_image, ImagePreprocessor};
use crate::store::LabeledImageSet;
use crate::types::{DatasetResult, FaceDatasetError, LabelRow, Sample};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Read-only window over a contiguous range of a [`LabeledImageSet`].
///
/// `get` only reads shared immutable data and returns a fresh [`Sample`], so
/// it can be called from any number of loader threads in any order.
#[derive(Clone)]
pub struct SampleDataset {
    images: Arc<[PathBuf]>,
    labels: Arc<[LabelRow]>,
    range: Range<usize>,
    preprocessor: Arc<dyn ImagePreprocessor>,
}

impl std::fmt::Debug for SampleDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleDataset")
            .field("range", &self.range)
            .field("preprocessor", &self.preprocessor.describe())
            .finish()
    }
}

impl SampleDataset {
    /// Build a view over `range`. With `light_weight`, only the first
    /// `light_weight_amount` pairs of the range are kept.
    ///
    /// The range is clipped to the number of images and label rows available,
    /// so surplus rows on either side are never reachable.
    pub fn new(
        set: &LabeledImageSet,
        range: Range<usize>,
        light_weight: Option<usize>,
        preprocessor: Arc<dyn ImagePreprocessor>,
    ) -> Self {
        let limit = set.image_count().min(set.label_count());
        let start = range.start.min(limit);
        let mut end = range.end.clamp(start, limit);
        if let Some(amount) = light_weight {
            end = end.min(start + amount);
        }
        Self {
            images: Arc::clone(&set.images),
            labels: Arc::clone(&set.labels),
            range: start..end,
            preprocessor,
        }
    }

    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    /// Image path of the `index`-th pair.
    pub fn image_path(&self, index: usize) -> DatasetResult<&Path> {
        self.check(index)?;
        Ok(&self.images[self.range.start + index])
    }

    pub fn label(&self, index: usize) -> DatasetResult<&LabelRow> {
        self.check(index)?;
        Ok(&self.labels[self.range.start + index])
    }

    /// Load, preprocess and pair the `index`-th image with its label.
    pub fn get(&self, index: usize) -> DatasetResult<Sample> {
        self.check(index)?;
        let abs = self.range.start + index;
        let img = open_image(&self.images[abs])?;
        let pixel_values = self.preprocessor.preprocess(&img)?;
        Ok(Sample {
            pixel_values,
            labels: self.labels[abs].clone(),
        })
    }

    fn check(&self, index: usize) -> DatasetResult<()> {
        if index >= self.len() {
            return Err(FaceDatasetError::IndexOutOfRange {
                index,
                len: self.len(),
            });
        }
        Ok(())
    }
}

/// Items are `DatasetResult<Sample>` so a bad image reaches the caller as an
/// `Err` item; `None` only marks an index past the end of the view.
#[cfg(feature = "burn-runtime")]
impl burn::data::dataset::Dataset<DatasetResult<Sample>> for SampleDataset {
    fn get(&self, index: usize) -> Option<DatasetResult<Sample>> {
        match SampleDataset::get(self, index) {
            Err(FaceDatasetError::IndexOutOfRange { .. }) => None,
            res => Some(res),
        }
    }

    fn len(&self) -> usize {
        SampleDataset::len(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::VitPreprocessorBuilder;
    use image::{Rgb, RgbImage};

    fn fixture(dir: &Path, n: usize) -> LabeledImageSet {
        let mut images = Vec::new();
        let mut labels = Vec::new();
        for i in 0..n {
            let path = dir.join(format!("img_{i:02}.jpg"));
            RgbImage::from_pixel(4, 4, Rgb([i as u8 * 20, 0, 0]))
                .save(&path)
                .unwrap();
            images.push(path);
            labels.push(vec![(i % 2) as f32]);
        }
        LabeledImageSet::new(images, labels)
    }

    fn pre() -> Arc<dyn ImagePreprocessor> {
        Arc::new(VitPreprocessorBuilder::new().size(None).build())
    }

    #[test]
    fn view_offsets_into_shared_set() {
        let tmp = tempfile::tempdir().unwrap();
        let set = fixture(tmp.path(), 6);
        let ds = SampleDataset::new(&set, 2..5, None, pre());
        assert_eq!(ds.len(), 3);
        assert!(ds.image_path(0).unwrap().ends_with("img_02.jpg"));
        let sample = ds.get(1).unwrap();
        assert_eq!(sample.labels, vec![1.0]);
        assert_eq!(sample.pixel_values.shape(), [3, 4, 4]);
        assert!(matches!(
            ds.get(3),
            Err(FaceDatasetError::IndexOutOfRange { index: 3, len: 3 })
        ));
    }

    #[test]
    fn light_weight_keeps_prefix() {
        let tmp = tempfile::tempdir().unwrap();
        let set = fixture(tmp.path(), 6);
        assert_eq!(SampleDataset::new(&set, 1..6, Some(2), pre()).len(), 2);
        assert_eq!(SampleDataset::new(&set, 4..6, Some(5), pre()).len(), 2);
    }

    #[test]
    fn range_clipped_to_shorter_side() {
        let tmp = tempfile::tempdir().unwrap();
        let mut set = fixture(tmp.path(), 4);
        set.labels = vec![vec![0.0]; 3].into();
        let ds = SampleDataset::new(&set, 2..4, None, pre());
        assert_eq!(ds.len(), 1);
    }

    #[test]
    fn unreadable_image_is_load_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("broken.jpg");
        std::fs::write(&path, b"not a jpeg").unwrap();
        let set = LabeledImageSet::new(vec![path], vec![vec![1.0]]);
        let ds = SampleDataset::new(&set, 0..1, None, pre());
        assert!(matches!(ds.get(0), Err(FaceDatasetError::Load { .. })));
    }

    #[cfg(feature = "burn-runtime")]
    #[test]
    fn burn_iteration_yields_load_errors_as_items() {
        use burn::data::dataset::Dataset;

        let tmp = tempfile::tempdir().unwrap();
        let set = fixture(tmp.path(), 4);
        std::fs::write(&set.images[1], b"corrupt").unwrap();
        let ds = SampleDataset::new(&set, 0..4, None, pre());

        let items: Vec<DatasetResult<Sample>> =
            <SampleDataset as Dataset<DatasetResult<Sample>>>::iter(&ds).collect();
        assert_eq!(items.len(), 4);
        assert!(items[0].is_ok());
        assert!(matches!(items[1], Err(FaceDatasetError::Load { .. })));
        assert!(items[2].is_ok() && items[3].is_ok());
        assert!(<SampleDataset as Dataset<DatasetResult<Sample>>>::get(&ds, 4).is_none());
    }

    #[test]
    fn dataset_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SampleDataset>();
    }
}
