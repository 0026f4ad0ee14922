//! Train/val/test boundary calculation.

use crate::types::{
    DatasetResult, FaceDatasetError, SplitRatios, CANONICAL_TRAIN_END, CANONICAL_VAL_END,
    MAX_DATASET_LENGTH,
};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Half-open ranges `[0, train_end)`, `[train_end, val_end)`, `[val_end, available)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitBoundaries {
    pub train_end: usize,
    pub val_end: usize,
    /// `floor(N * usage_fraction)`.
    pub available: usize,
}

impl SplitBoundaries {
    pub fn train(&self) -> Range<usize> {
        0..self.train_end
    }

    pub fn val(&self) -> Range<usize> {
        self.train_end..self.val_end
    }

    pub fn test(&self) -> Range<usize> {
        self.val_end..self.available
    }

    /// `[train, val, test]` sizes.
    pub fn sizes(&self) -> [usize; 3] {
        [
            self.train_end,
            self.val_end - self.train_end,
            self.available - self.val_end,
        ]
    }
}

fn validate(usage_fraction: f64, ratios: &SplitRatios) -> DatasetResult<()> {
    if !(usage_fraction > 0.0 && usage_fraction <= 1.0) {
        return Err(FaceDatasetError::InvalidConfig(format!(
            "usage_fraction must be in (0, 1], got {usage_fraction}"
        )));
    }
    for (name, r) in [
        ("train", ratios.train),
        ("val", ratios.val),
        ("test", ratios.test),
    ] {
        if !r.is_finite() || r < 0.0 {
            return Err(FaceDatasetError::InvalidConfig(format!(
                "{name} ratio must be a non-negative number, got {r}"
            )));
        }
    }
    Ok(())
}

/// Compute split boundaries for `total` items.
///
/// The full CelebA listing used at fraction 1.0 always gets the publisher's
/// partition, whatever `ratios` say.
pub fn compute_splits(
    total: usize,
    usage_fraction: f64,
    ratios: &SplitRatios,
) -> DatasetResult<SplitBoundaries> {
    validate(usage_fraction, ratios)?;
    let available = ((total as f64 * usage_fraction).floor() as usize).min(total);

    let bounds = if usage_fraction == 1.0 && total == MAX_DATASET_LENGTH {
        SplitBoundaries {
            train_end: CANONICAL_TRAIN_END,
            val_end: CANONICAL_VAL_END,
            available,
        }
    } else {
        let train_end = ((available as f64 * ratios.train).floor() as usize).min(available);
        let val_end = ((available as f64 * (ratios.train + ratios.val)).floor() as usize)
            .clamp(train_end, available);
        SplitBoundaries {
            train_end,
            val_end,
            available,
        }
    };

    let [train, val, test] = bounds.sizes();
    tracing::info!("Splitting train/val/test as: [{train}, {val}, {test}]");
    Ok(bounds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ten_items_default_ratios() {
        let b = compute_splits(10, 1.0, &SplitRatios::default()).unwrap();
        assert_eq!((b.train_end, b.val_end, b.available), (6, 8, 10));
        assert_eq!(b.sizes(), [6, 2, 2]);
    }

    #[test]
    fn canonical_partition_ignores_ratios() {
        let b = compute_splits(MAX_DATASET_LENGTH, 1.0, &SplitRatios::from([0.1, 0.1, 0.8]))
            .unwrap();
        assert_eq!(b.train_end, 162_770);
        assert_eq!(b.val_end, 182_637);
        assert_eq!(b.available, MAX_DATASET_LENGTH);
        assert_eq!(b.sizes(), [162_770, 19_867, 19_962]);
    }

    #[test]
    fn canonical_partition_only_at_full_fraction() {
        let b = compute_splits(MAX_DATASET_LENGTH, 0.5, &SplitRatios::default()).unwrap();
        assert_eq!(b.available, 101_299);
        assert_eq!(b.train_end, 60_779);
    }

    #[test]
    fn ordering_holds_across_inputs() {
        let ratios = [
            [0.0, 0.0, 1.0],
            [0.6, 0.2, 0.2],
            [0.33, 0.33, 0.33],
            [1.0, 0.0, 0.0],
            [0.7, 0.3, 0.0],
            [0.8, 0.5, 0.0],
        ];
        for n in [0usize, 1, 2, 7, 10, 99, 1000, 5001] {
            for f in [0.01, 0.1, 0.25, 0.5, 0.9, 1.0] {
                for r in ratios {
                    let b = compute_splits(n, f, &SplitRatios::from(r)).unwrap();
                    assert!(b.train_end <= b.val_end, "n={n} f={f} r={r:?}");
                    assert!(b.val_end <= b.available, "n={n} f={f} r={r:?}");
                    assert!(b.available <= n);
                    assert_eq!(b.available, (n as f64 * f).floor() as usize);
                    assert_eq!(b.sizes().iter().sum::<usize>(), b.available);
                }
            }
        }
    }

    #[test]
    fn rejects_bad_inputs() {
        assert!(compute_splits(10, 0.0, &SplitRatios::default()).is_err());
        assert!(compute_splits(10, 1.5, &SplitRatios::default()).is_err());
        assert!(compute_splits(10, 1.0, &SplitRatios::from([-0.1, 0.5, 0.5])).is_err());
        assert!(compute_splits(10, 1.0, &SplitRatios::from([f64::NAN, 0.5, 0.5])).is_err());
    }
}
