use geo_types::MultiPolygon;
use tracing::debug;

use crate::error::PostprocessError;
use crate::geometry::{make_valid, region_iou};
use crate::types::Boundary;

/// Greedy non-maximum suppression over polygon boundaries.
///
/// Candidates are sorted by ascending score (stable, so among equal scores
/// the later one wins) and the highest remaining candidate is kept on each
/// round. Every other candidate whose IoU with it exceeds `iou_threshold`
/// is dropped. Zero-area comparisons count as full overlap.
///
/// The output lists kept boundaries in the order they were selected.
pub fn polygon_nms(
    boundaries: &[Boundary],
    iou_threshold: f64,
) -> Result<Vec<Boundary>, PostprocessError> {
    if !(0.0..=1.0).contains(&iou_threshold) {
        return Err(PostprocessError::invalid(format!(
            "iou_threshold must lie in [0, 1], got {iou_threshold}"
        )));
    }

    let mut order: Vec<&Boundary> = boundaries.iter().collect();
    order.sort_by(|a, b| a.score().total_cmp(&b.score()));

    let regions: Vec<MultiPolygon<f64>> = order.iter().map(|b| make_valid(&b.polygon())).collect();

    let mut remaining: Vec<usize> = (0..order.len()).collect();
    let mut keep = Vec::new();
    while let Some(current) = remaining.pop() {
        keep.push(order[current].clone());
        remaining.retain(|&i| region_iou(&regions[current], &regions[i], 1.0) <= iou_threshold);
    }

    debug!(kept = keep.len(), total = boundaries.len(), iou_threshold, "polygon nms");
    Ok(keep)
}
