//! Processed face-image dataset: label store, splits, per-sample datasets and batch loaders.
//!
//! This crate provides utilities for:
//! - Converting the raw CelebA layout into processed images + `labels.csv`
//! - Listing processed images and reading their label rows
//! - Train/val/test splitting (with the publisher partition for the full set)
//! - Lazy per-sample loading through an injectable image preprocessor
//! - Batch iteration, optionally into Burn tensors

pub mod batch;
pub mod config;
pub mod dataset;
pub mod module;
pub mod preprocess;
pub mod process;
pub mod splits;
pub mod store;
pub mod types;
pub mod validation;

pub use batch::{Batch, BatchIter};
pub use config::DataPaths;
pub use dataset::SampleDataset;
pub use module::{DataModule, DataModuleState};
pub use preprocess::{open_image, ImagePreprocessor, VitPreprocessor, VitPreprocessorBuilder};
pub use process::{
    convert_raw_labels, process_raw_data, process_raw_data_with_limit, remap_attribute,
    ProcessSummary,
};
pub use splits::{compute_splits, SplitBoundaries};
pub use store::{list_images, list_images_required, read_labels, ImageLabelStore, LabeledImageSet};
pub use types::*;
pub use validation::{check_alignment, summarize_alignment};

#[cfg(feature = "burn-runtime")]
pub use batch::BurnBatch;
