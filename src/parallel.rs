//! Parallel metric computation.
//!
//! With the `rayon` feature, [`Comparator::compare`](crate::Comparator::compare)
//! computes frame metrics across rayon's thread pool. Results come back in
//! frame order, so logging and averaging are unchanged.

use rayon::iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator};

use crate::comparison::{Comparator, FrameMetrics};
use crate::error::CompareError;
use crate::frame::Frame;

/// Compute metrics for every frame pair, preserving order.
pub(crate) fn compute_all(
    comparator: &Comparator,
    frames: &[Frame],
    references: &[Frame],
) -> Vec<Result<FrameMetrics, CompareError>> {
    frames
        .par_iter()
        .zip(references.par_iter())
        .enumerate()
        .map(|(position, (frame, reference))| {
            comparator.frame_metrics(position, frame, reference)
        })
        .collect()
}
