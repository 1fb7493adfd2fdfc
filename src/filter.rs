use serde_json::Value;

use crate::error::PostprocessError;
use crate::types::Boundary;

/// Keeps the entries whose score is strictly above `threshold`.
///
/// `results` and `scores` are index-aligned; order is preserved.
pub fn filter_by_score<T: Clone>(
    results: &[T],
    scores: &[f64],
    threshold: f64,
) -> Result<(Vec<T>, Vec<f64>), PostprocessError> {
    if results.len() != scores.len() {
        return Err(PostprocessError::invalid(format!(
            "results ({}) and scores ({}) differ in length",
            results.len(),
            scores.len()
        )));
    }
    if !(0.0..=1.0).contains(&threshold) {
        return Err(PostprocessError::invalid(format!(
            "score threshold must lie in [0, 1], got {threshold}"
        )));
    }

    Ok(results
        .iter()
        .zip(scores)
        .filter(|&(_, &score)| score > threshold)
        .map(|(result, &score)| (result.clone(), score))
        .unzip())
}

/// Per-image selection with an inclusive threshold (`score >= threshold`).
///
/// An image whose score list is empty passes through unfiltered.
pub fn select_top_per_image<T: Clone>(
    boundaries_per_image: &[Vec<T>],
    scores_per_image: &[Vec<f64>],
    threshold: f64,
) -> Result<Vec<Vec<T>>, PostprocessError> {
    if boundaries_per_image.len() != scores_per_image.len() {
        return Err(PostprocessError::invalid(format!(
            "{} boundary lists but {} score lists",
            boundaries_per_image.len(),
            scores_per_image.len()
        )));
    }

    boundaries_per_image
        .iter()
        .zip(scores_per_image)
        .enumerate()
        .map(|(idx, (boundaries, scores))| {
            if scores.is_empty() {
                return Ok(boundaries.clone());
            }
            if boundaries.len() != scores.len() {
                return Err(PostprocessError::invalid(format!(
                    "image {idx}: {} boundaries but {} scores",
                    boundaries.len(),
                    scores.len()
                )));
            }
            Ok(boundaries
                .iter()
                .zip(scores)
                .filter(|&(_, &score)| score >= threshold)
                .map(|(b, _)| b.clone())
                .collect())
        })
        .collect()
}

/// Entries of one image's `boundary_result`, with and without their scores.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundarySplit {
    pub boundaries_with_scores: Vec<Vec<f64>>,
    pub boundaries: Vec<Vec<f64>>,
    pub scores: Vec<f64>,
}

/// Splits the `boundary_result` field of a per-image result record into
/// score-stripped boundaries and their trailing scores.
pub fn split_boundary_and_score(result: &Value) -> Result<BoundarySplit, PostprocessError> {
    let record = result
        .as_object()
        .ok_or_else(|| PostprocessError::invalid("result record must be a JSON object"))?;
    let entries = record
        .get("boundary_result")
        .ok_or_else(|| PostprocessError::invalid("result record has no `boundary_result` field"))?
        .as_array()
        .ok_or_else(|| PostprocessError::invalid("`boundary_result` must be an array"))?;

    let mut split = BoundarySplit {
        boundaries_with_scores: Vec::with_capacity(entries.len()),
        boundaries: Vec::with_capacity(entries.len()),
        scores: Vec::with_capacity(entries.len()),
    };

    for (idx, entry) in entries.iter().enumerate() {
        let values = entry
            .as_array()
            .and_then(|items| items.iter().map(Value::as_f64).collect::<Option<Vec<f64>>>())
            .ok_or_else(|| {
                PostprocessError::invalid(format!("boundary_result[{idx}] is not a numeric sequence"))
            })?;
        let Some((&score, points)) = values.split_last() else {
            return Err(PostprocessError::invalid(format!("boundary_result[{idx}] is empty")));
        };

        split.boundaries.push(points.to_vec());
        split.scores.push(score);
        split.boundaries_with_scores.push(values);
    }

    Ok(split)
}

/// Boundaries scoring strictly above `score_thr`, paired with their labels,
/// as `(points, score, label)` triples in input order.
pub fn filter_labeled_boundaries<L: Clone>(
    boundaries_with_scores: &[Boundary],
    labels: &[L],
    score_thr: f64,
) -> Result<Vec<(Vec<f64>, f64, L)>, PostprocessError> {
    if boundaries_with_scores.len() != labels.len() {
        return Err(PostprocessError::invalid(format!(
            "{} boundaries but {} labels",
            boundaries_with_scores.len(),
            labels.len()
        )));
    }

    Ok(boundaries_with_scores
        .iter()
        .zip(labels)
        .filter(|(b, _)| b.score() > score_thr)
        .map(|(b, label)| (b.points().to_vec(), b.score(), label.clone()))
        .collect())
}
