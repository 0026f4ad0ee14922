//! Dataset directory layout.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const RAW_DATA_DIR: &str = "data/raw";
pub const TESTING_DATA_DIR: &str = "data/testing";

pub const RAW_DIR_ENV: &str = "FACE_DATASET_RAW_DIR";
pub const PROCESSED_DIR_ENV: &str = "FACE_DATASET_PROCESSED_DIR";

/// Raw label file name under the raw data directory.
pub const RAW_LABELS_FILE: &str = "list_attr_celeba.csv";
/// Raw image directory name under the raw data directory.
pub const RAW_IMAGES_SUBDIR: &str = "images_celeba";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPaths {
    pub raw_data_dir: PathBuf,
    pub processed_data_dir: PathBuf,
}

impl Default for DataPaths {
    fn default() -> Self {
        Self {
            raw_data_dir: RAW_DATA_DIR.into(),
            processed_data_dir: TESTING_DATA_DIR.into(),
        }
    }
}

impl DataPaths {
    /// Defaults overridden by `FACE_DATASET_RAW_DIR` / `FACE_DATASET_PROCESSED_DIR`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var_os(key).map(PathBuf::from))
    }

    /// Defaults overridden by whatever `lookup` returns for the two env keys.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<PathBuf>) -> Self {
        let defaults = Self::default();
        Self {
            raw_data_dir: lookup(RAW_DIR_ENV).unwrap_or(defaults.raw_data_dir),
            processed_data_dir: lookup(PROCESSED_DIR_ENV).unwrap_or(defaults.processed_data_dir),
        }
    }

    pub fn raw_labels_path(&self) -> PathBuf {
        self.raw_data_dir.join(RAW_LABELS_FILE)
    }

    pub fn raw_images_dir(&self) -> PathBuf {
        self.raw_data_dir.join(RAW_IMAGES_SUBDIR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_overrides_each_dir_independently() {
        let paths = DataPaths::from_lookup(|key| (key == PROCESSED_DIR_ENV).then(|| "/srv/faces".into()));
        assert_eq!(paths.raw_data_dir, PathBuf::from("data/raw"));
        assert_eq!(paths.processed_data_dir, PathBuf::from("/srv/faces"));
        assert_eq!(paths.raw_images_dir(), PathBuf::from("data/raw/images_celeba"));
        assert_eq!(
            paths.raw_labels_path(),
            PathBuf::from("data/raw/list_attr_celeba.csv")
        );
        assert_eq!(DataPaths::from_lookup(|_| None), DataPaths::default());
    }
}
