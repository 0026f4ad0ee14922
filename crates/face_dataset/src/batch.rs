//! Batch iteration over a split.

use crate::dataset::SampleDataset;
use crate::types::{DatasetResult, FaceDatasetError, LoaderConfig, Sample};
use rand::{seq::SliceRandom, SeedableRng};
use rayon::prelude::*;
use std::time::{Duration, Instant};

pub(crate) const DEFAULT_LOG_EVERY_SAMPLES: usize = 1000;

/// Collated samples: `pixel_values` is `[batch, C, H, W]`, `labels` is `[batch, L]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub pixel_values: Vec<f32>,
    pub pixel_shape: [usize; 4],
    pub labels: Vec<f32>,
    pub label_shape: [usize; 2],
}

impl Batch {
    pub fn len(&self) -> usize {
        self.pixel_shape[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn collate(samples: &[Sample]) -> DatasetResult<Self> {
        let Some(first) = samples.first() else {
            return Err(FaceDatasetError::Other(
                "cannot collate empty batch".to_string(),
            ));
        };
        let [c, h, w] = first.pixel_values.shape();
        let label_width = first.labels.len();
        let mut pixel_values = Vec::with_capacity(samples.len() * c * h * w);
        let mut labels = Vec::with_capacity(samples.len() * label_width);
        for sample in samples {
            if sample.pixel_values.shape() != [c, h, w] {
                return Err(FaceDatasetError::InvalidConfig(format!(
                    "batch contains varying image shapes ({:?} vs {:?}); use a preprocessor with a fixed size",
                    sample.pixel_values.shape(),
                    [c, h, w]
                )));
            }
            if sample.labels.len() != label_width {
                return Err(FaceDatasetError::InvalidConfig(format!(
                    "batch contains varying label widths ({} vs {label_width})",
                    sample.labels.len()
                )));
            }
            pixel_values.extend_from_slice(&sample.pixel_values.data);
            labels.extend_from_slice(&sample.labels);
        }
        Ok(Self {
            pixel_values,
            pixel_shape: [samples.len(), c, h, w],
            labels,
            label_shape: [samples.len(), label_width],
        })
    }
}

#[cfg(feature = "burn-runtime")]
pub struct BurnBatch<B: burn::tensor::backend::Backend> {
    pub pixel_values: burn::tensor::Tensor<B, 4>,
    pub labels: burn::tensor::Tensor<B, 2>,
}

#[cfg(feature = "burn-runtime")]
impl Batch {
    pub fn to_burn<B: burn::tensor::backend::Backend>(&self, device: &B::Device) -> BurnBatch<B> {
        use burn::tensor::{Tensor, TensorData};
        let pixel_values = Tensor::<B, 4>::from_data(
            TensorData::new(self.pixel_values.clone(), self.pixel_shape),
            device,
        );
        let labels = Tensor::<B, 2>::from_data(
            TensorData::new(self.labels.clone(), self.label_shape),
            device,
        );
        BurnBatch {
            pixel_values,
            labels,
        }
    }
}

/// Lazy, finite batch sequence over a [`SampleDataset`].
///
/// Each loader call on the data module builds a fresh iterator, so a split
/// can be iterated once per epoch. The first load error ends iteration.
pub struct BatchIter {
    dataset: SampleDataset,
    order: Vec<usize>,
    cursor: usize,
    batch_size: usize,
    drop_last: bool,
    processed_samples: usize,
    processed_batches: usize,
    started: Instant,
    total_load_time: Duration,
    last_logged_samples: usize,
    log_every_samples: Option<usize>,
}

impl BatchIter {
    pub fn new(dataset: SampleDataset, batch_size: usize, cfg: &LoaderConfig) -> Self {
        let mut order: Vec<usize> = (0..dataset.len()).collect();
        if cfg.shuffle {
            let mut rng = match cfg.seed {
                Some(seed) => rand::rngs::StdRng::seed_from_u64(seed),
                None => rand::rngs::StdRng::from_rng(&mut rand::rng()),
            };
            order.shuffle(&mut rng);
        }
        let log_every_samples = match std::env::var("FACE_DATASET_LOG_EVERY") {
            Ok(val) => {
                if val.eq_ignore_ascii_case("off") || val.trim() == "0" {
                    None
                } else {
                    val.trim().parse::<usize>().ok().filter(|v| *v > 0)
                }
            }
            Err(_) => Some(DEFAULT_LOG_EVERY_SAMPLES),
        };
        Self {
            dataset,
            order,
            cursor: 0,
            batch_size: batch_size.max(1),
            drop_last: cfg.drop_last,
            processed_samples: 0,
            processed_batches: 0,
            started: Instant::now(),
            total_load_time: Duration::ZERO,
            last_logged_samples: 0,
            log_every_samples,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Sample indices in iteration order.
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Batches per full pass.
    pub fn num_batches(&self) -> usize {
        if self.drop_last {
            self.order.len() / self.batch_size
        } else {
            self.order.len().div_ceil(self.batch_size)
        }
    }

    fn load_batch(&mut self, indices: &[usize]) -> DatasetResult<Batch> {
        let t_load = Instant::now();
        let dataset = &self.dataset;
        let mut loaded: Vec<(usize, DatasetResult<Sample>)> = indices
            .par_iter()
            .enumerate()
            .map(|(i, idx)| (i, dataset.get(*idx)))
            .collect();
        loaded.sort_by_key(|(i, _)| *i);
        let samples = loaded
            .into_iter()
            .map(|(_, res)| res)
            .collect::<DatasetResult<Vec<Sample>>>()?;
        self.total_load_time += t_load.elapsed();
        Batch::collate(&samples)
    }

    fn maybe_log_progress(&mut self) {
        let Some(threshold) = self.log_every_samples else {
            return;
        };
        if self.processed_samples - self.last_logged_samples < threshold {
            return;
        }
        let secs = self.started.elapsed().as_secs_f32().max(0.001);
        let avg_load_ms =
            (self.total_load_time.as_secs_f64() * 1000.0) / self.processed_batches.max(1) as f64;
        tracing::info!(
            "[dataset] batches={} samples={} elapsed={:.1}s rate={:.1} img/s avg_load_ms={:.2}",
            self.processed_batches,
            self.processed_samples,
            secs,
            self.processed_samples as f32 / secs,
            avg_load_ms
        );
        self.last_logged_samples = self.processed_samples;
    }
}

impl Iterator for BatchIter {
    type Item = DatasetResult<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.order.len() {
            return None;
        }
        let end = (self.cursor + self.batch_size).min(self.order.len());
        if self.drop_last && end - self.cursor < self.batch_size {
            self.cursor = self.order.len();
            return None;
        }
        let indices = self.order[self.cursor..end].to_vec();
        self.cursor = end;
        match self.load_batch(&indices) {
            Ok(batch) => {
                self.processed_samples += batch.len();
                self.processed_batches += 1;
                self.maybe_log_progress();
                Some(Ok(batch))
            }
            Err(e) => {
                self.cursor = self.order.len();
                Some(Err(e))
            }
        }
    }
}
