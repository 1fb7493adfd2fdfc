use geo_types::{Coord, LineString, Polygon};
use serde::{Deserialize, Serialize};

use crate::error::PostprocessError;

/// Smallest coordinate count accepted for a polygon (four points).
pub const MIN_POLYGON_COORDS: usize = 8;

/// How area computations treat polygons that are not valid.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum InvalidPolicy {
    /// Repair both inputs with `make_valid` before measuring.
    #[default]
    Repair,
    /// Skip repair; return this value when either input is invalid.
    Fallback(f64),
}

impl From<Option<f64>> for InvalidPolicy {
    fn from(fallback: Option<f64>) -> Self {
        match fallback {
            Some(v) => InvalidPolicy::Fallback(v),
            None => InvalidPolicy::Repair,
        }
    }
}

/// A polygon with a trailing confidence score.
///
/// On the wire a boundary is the flat sequence `[x1, y1, ..., xk, yk, score]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct Boundary {
    points: Vec<f64>,
    score: f64,
}

impl Boundary {
    pub fn new(points: Vec<f64>, score: f64) -> Result<Self, PostprocessError> {
        check_points(&points)?;
        if !score.is_finite() {
            return Err(PostprocessError::invalid(format!(
                "boundary score must be finite, got {score}"
            )));
        }
        Ok(Self { points, score })
    }

    pub fn from_flat(mut flat: Vec<f64>) -> Result<Self, PostprocessError> {
        if flat.len() % 2 == 0 || flat.len() < MIN_POLYGON_COORDS + 1 {
            return Err(PostprocessError::invalid(format!(
                "boundary needs an odd length >= {}, got {}",
                MIN_POLYGON_COORDS + 1,
                flat.len()
            )));
        }
        let score = flat.pop().unwrap_or_default();
        Self::new(flat, score)
    }

    pub fn points(&self) -> &[f64] {
        &self.points
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn polygon(&self) -> Polygon<f64> {
        polygon_from_pairs(&self.points)
    }

    pub fn to_flat(&self) -> Vec<f64> {
        let mut flat = Vec::with_capacity(self.points.len() + 1);
        flat.extend_from_slice(&self.points);
        flat.push(self.score);
        flat
    }

    pub fn into_parts(self) -> (Vec<f64>, f64) {
        (self.points, self.score)
    }
}

impl TryFrom<Vec<f64>> for Boundary {
    type Error = PostprocessError;

    fn try_from(flat: Vec<f64>) -> Result<Self, Self::Error> {
        Boundary::from_flat(flat)
    }
}

impl From<Boundary> for Vec<f64> {
    fn from(boundary: Boundary) -> Self {
        let mut flat = boundary.points;
        flat.push(boundary.score);
        flat
    }
}

pub(crate) fn check_points(points: &[f64]) -> Result<(), PostprocessError> {
    if points.len() % 2 != 0 || points.len() < MIN_POLYGON_COORDS {
        return Err(PostprocessError::invalid(format!(
            "polygon needs an even number of coordinates >= {MIN_POLYGON_COORDS}, got {}",
            points.len()
        )));
    }
    if let Some(bad) = points.iter().find(|v| !v.is_finite()) {
        return Err(PostprocessError::invalid(format!(
            "polygon coordinates must be finite, got {bad}"
        )));
    }
    Ok(())
}

/// Builds the implicitly closed ring from interleaved x/y pairs.
pub(crate) fn polygon_from_pairs(points: &[f64]) -> Polygon<f64> {
    let mut ring: Vec<Coord<f64>> = points
        .chunks_exact(2)
        .map(|p| Coord { x: p[0], y: p[1] })
        .collect();
    if let Some(&first) = ring.first() {
        ring.push(first);
    }
    Polygon::new(LineString(ring), vec![])
}

/// Decoding parameters for one FCENet feature level.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FceConfig {
    pub fourier_degree: usize,
    pub num_reconstr_points: usize,
    /// Stride of the feature level relative to the input image.
    pub scale: f64,
    pub alpha: f64,
    pub beta: f64,
    pub score_thr: f64,
    pub nms_thr: f64,
}

impl Default for FceConfig {
    fn default() -> Self {
        Self {
            fourier_degree: 5,
            num_reconstr_points: 50,
            scale: 1.0,
            alpha: 1.0,
            beta: 2.0,
            score_thr: 0.3,
            nms_thr: 0.1,
        }
    }
}

impl FceConfig {
    pub fn for_level(scale: f64) -> Self {
        Self {
            scale,
            ..Self::default()
        }
    }

    pub fn from_json_str(s: &str) -> Result<Self, PostprocessError> {
        let cfg: FceConfig = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), PostprocessError> {
        if !(0.0..=1.0).contains(&self.score_thr) {
            return Err(PostprocessError::invalid(format!(
                "score_thr must lie in [0, 1], got {}",
                self.score_thr
            )));
        }
        if !(0.0..=1.0).contains(&self.nms_thr) {
            return Err(PostprocessError::invalid(format!(
                "nms_thr must lie in [0, 1], got {}",
                self.nms_thr
            )));
        }
        if self.scale.is_nan() || self.scale <= 0.0 {
            return Err(PostprocessError::invalid(format!(
                "scale must be positive, got {}",
                self.scale
            )));
        }
        let min_points = self.num_coeffs().max(MIN_POLYGON_COORDS / 2);
        if self.num_reconstr_points < min_points {
            return Err(PostprocessError::invalid(format!(
                "num_reconstr_points must be at least {min_points} for fourier degree {}, got {}",
                self.fourier_degree, self.num_reconstr_points
            )));
        }
        Ok(())
    }

    /// Number of complex coefficients per candidate, `2k + 1`.
    pub fn num_coeffs(&self) -> usize {
        2 * self.fourier_degree + 1
    }
}
