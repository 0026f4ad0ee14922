//! Label/image count checks run before splitting.

use crate::store::LabeledImageSet;
use crate::types::{
    AlignmentOutcome, AlignmentPolicy, AlignmentReport, DatasetResult, FaceDatasetError,
};

pub fn summarize_alignment(set: &LabeledImageSet) -> AlignmentReport {
    let images = set.image_count();
    let labels = set.label_count();
    let outcome = match labels.cmp(&images) {
        std::cmp::Ordering::Equal => AlignmentOutcome::Aligned,
        std::cmp::Ordering::Greater => AlignmentOutcome::ExtraLabels,
        std::cmp::Ordering::Less => AlignmentOutcome::MissingLabels,
    };
    AlignmentReport {
        images,
        labels,
        outcome,
    }
}

/// Apply `policy` to the set's counts. `Truncate` only warns.
pub fn check_alignment(
    set: &LabeledImageSet,
    policy: AlignmentPolicy,
) -> DatasetResult<AlignmentReport> {
    let report = summarize_alignment(set);
    if report.outcome == AlignmentOutcome::Aligned {
        return Ok(report);
    }
    match policy {
        AlignmentPolicy::Strict => Err(FaceDatasetError::Misaligned {
            images: report.images,
            labels: report.labels,
        }),
        AlignmentPolicy::Truncate => {
            tracing::warn!(
                images = report.images,
                labels = report.labels,
                outcome = report.outcome.as_str(),
                "label rows and images differ in number; surplus entries are ignored"
            );
            Ok(report)
        }
    }
}
