//! Data module: owns the labeled set, the split views and the loader policy.

use crate::batch::BatchIter;
use crate::config::DataPaths;
use crate::dataset::SampleDataset;
use crate::preprocess::{ImagePreprocessor, VitPreprocessor};
use crate::process::{process_raw_data, ProcessSummary};
use crate::splits::{compute_splits, SplitBoundaries};
use crate::store::{ImageLabelStore, LabeledImageSet};
use crate::types::{
    DatasetResult, FaceDatasetError, LoaderConfig, Sample, SetupOptions, SplitKind,
    DEFAULT_BATCH_SIZE,
};
use crate::validation::check_alignment;
use std::path::PathBuf;
use std::sync::Arc;

/// Everything `setup` produces. Replaced wholesale on every call.
#[derive(Debug, Clone)]
pub struct DataModuleState {
    pub set: LabeledImageSet,
    pub boundaries: SplitBoundaries,
    pub train: SampleDataset,
    pub val: SampleDataset,
    pub test: SampleDataset,
}

pub struct DataModule {
    paths: DataPaths,
    batch_size: usize,
    loader: LoaderConfig,
    preprocessor: Arc<dyn ImagePreprocessor>,
    state: Option<DataModuleState>,
}

impl DataModule {
    pub fn new(processed_data_dir: impl Into<PathBuf>, batch_size: usize) -> Self {
        let paths = DataPaths {
            processed_data_dir: processed_data_dir.into(),
            ..DataPaths::default()
        };
        Self::from_paths(paths, batch_size)
    }

    pub fn from_paths(paths: DataPaths, batch_size: usize) -> Self {
        Self {
            paths,
            batch_size: batch_size.max(1),
            loader: LoaderConfig::default(),
            preprocessor: Arc::new(VitPreprocessor::default()),
            state: None,
        }
    }

    pub fn with_preprocessor(mut self, preprocessor: Arc<dyn ImagePreprocessor>) -> Self {
        self.preprocessor = preprocessor;
        self
    }

    pub fn with_raw_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.paths.raw_data_dir = dir.into();
        self
    }

    pub fn with_loader_config(mut self, loader: LoaderConfig) -> Self {
        self.loader = loader;
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn paths(&self) -> &DataPaths {
        &self.paths
    }

    /// Load labels and images, compute splits and build the three split views.
    ///
    /// Any previous state is dropped first, so a failed call leaves the module
    /// uninitialized rather than serving the old splits.
    ///
    /// With a usage fraction of 1.0 and the full 202 599-image listing, the
    /// publisher's partition is used instead of `opts.split`.
    pub fn setup(&mut self, opts: &SetupOptions) -> DatasetResult<&DataModuleState> {
        self.state = None;
        let store = ImageLabelStore::new(&self.paths.processed_data_dir);
        let set = store.load()?;
        check_alignment(&set, opts.alignment)?;

        let boundaries = compute_splits(set.image_count(), opts.usage_fraction, &opts.split)?;
        let light = opts.light_weight.then_some(opts.light_weight_amount);
        let view = |range| SampleDataset::new(&set, range, light, Arc::clone(&self.preprocessor));
        let train = view(boundaries.train());
        let val = view(boundaries.val());
        let test = view(boundaries.test());

        tracing::debug!(
            train = train.len(),
            val = val.len(),
            test = test.len(),
            preprocessor = %self.preprocessor.describe(),
            "data module ready"
        );
        Ok(&*self.state.insert(DataModuleState {
            set,
            boundaries,
            train,
            val,
            test,
        }))
    }

    pub fn state(&self) -> Option<&DataModuleState> {
        self.state.as_ref()
    }

    pub fn dataset(&self, split: SplitKind) -> DatasetResult<&SampleDataset> {
        let state = self
            .state
            .as_ref()
            .ok_or(FaceDatasetError::NotInitialized { split })?;
        Ok(match split {
            SplitKind::Train => &state.train,
            SplitKind::Val => &state.val,
            SplitKind::Test => &state.test,
        })
    }

    pub fn train_dataset(&self) -> DatasetResult<&SampleDataset> {
        self.dataset(SplitKind::Train)
    }

    pub fn val_dataset(&self) -> DatasetResult<&SampleDataset> {
        self.dataset(SplitKind::Val)
    }

    pub fn test_dataset(&self) -> DatasetResult<&SampleDataset> {
        self.dataset(SplitKind::Test)
    }

    pub fn dataloader(&self, split: SplitKind) -> DatasetResult<BatchIter> {
        let dataset = self.dataset(split)?.clone();
        Ok(BatchIter::new(dataset, self.batch_size, &self.loader))
    }

    pub fn train_dataloader(&self) -> DatasetResult<BatchIter> {
        self.dataloader(SplitKind::Train)
    }

    pub fn val_dataloader(&self) -> DatasetResult<BatchIter> {
        self.dataloader(SplitKind::Val)
    }

    pub fn test_dataloader(&self) -> DatasetResult<BatchIter> {
        self.dataloader(SplitKind::Test)
    }

    /// Convert the raw dataset into the processed layout read by `setup`.
    pub fn process_raw_data(&self, reduced: bool) -> DatasetResult<ProcessSummary> {
        process_raw_data(&self.paths, self.preprocessor.as_ref(), reduced)
    }

    /// First training sample, for eyeballing the pipeline output.
    pub fn show_example(&self) -> DatasetResult<Sample> {
        let example = self.train_dataset()?.get(0)?;
        tracing::info!(
            shape = ?example.pixel_values.shape(),
            labels = ?example.labels,
            "example training sample"
        );
        Ok(example)
    }
}

/// Directories come from [`DataPaths::from_env`].
impl Default for DataModule {
    fn default() -> Self {
        Self::from_paths(DataPaths::from_env(), DEFAULT_BATCH_SIZE)
    }
}
