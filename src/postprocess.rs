use ndarray::{Array2, ArrayView3, Zip};
use num_complex::Complex64;
use tracing::{debug, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::contours::{connected_regions, fill_holes, PixelRegion};
use crate::error::PostprocessError;
use crate::fourier::fourier_to_polygons;
use crate::nms::polygon_nms;
use crate::types::{Boundary, FceConfig};

/// Raw head outputs for one feature level.
///
/// `cls_pred` is `4 × h × w` logits (text region pair, then text center line
/// pair). `reg_pred` is `2(2k + 1) × h × w`: real parts of the Fourier
/// coefficients followed by imaginary parts.
#[derive(Clone, Copy, Debug)]
pub struct FceLevel<'a> {
    pub cls_pred: ArrayView3<'a, f32>,
    pub reg_pred: ArrayView3<'a, f32>,
    /// Stride of this level relative to the input image.
    pub scale: f64,
}

pub struct FcePostProcess {
    pub cfg: FceConfig,
}

impl FcePostProcess {
    pub fn new(cfg: FceConfig) -> Result<Self, PostprocessError> {
        cfg.validate()?;
        Ok(Self { cfg })
    }

    /// Decodes a single level at the configured scale.
    pub fn process(
        &self,
        cls_pred: ArrayView3<'_, f32>,
        reg_pred: ArrayView3<'_, f32>,
    ) -> Result<Vec<Boundary>, PostprocessError> {
        self.process_level(cls_pred, reg_pred, self.cfg.scale)
    }

    /// Decodes every level of one image and suppresses across levels.
    pub fn process_image(&self, levels: &[FceLevel<'_>]) -> Result<Vec<Boundary>, PostprocessError> {
        let mut boundaries = Vec::new();
        for level in levels {
            boundaries.extend(self.process_level(level.cls_pred, level.reg_pred, level.scale)?);
        }
        polygon_nms(&boundaries, self.cfg.nms_thr)
    }

    /// Runs `process_image` for each image independently.
    pub fn process_batch(
        &self,
        images: &[Vec<FceLevel<'_>>],
    ) -> Result<Vec<Vec<Boundary>>, PostprocessError> {
        #[cfg(feature = "parallel")]
        let results = images.par_iter().map(|levels| self.process_image(levels)).collect();

        #[cfg(not(feature = "parallel"))]
        let results = images.iter().map(|levels| self.process_image(levels)).collect();

        results
    }

    pub fn process_level(
        &self,
        cls_pred: ArrayView3<'_, f32>,
        reg_pred: ArrayView3<'_, f32>,
        scale: f64,
    ) -> Result<Vec<Boundary>, PostprocessError> {
        let num_coeffs = self.cfg.num_coeffs();
        let (cls_c, h, w) = cls_pred.dim();
        let (reg_c, reg_h, reg_w) = reg_pred.dim();
        if cls_c != 4 {
            return Err(PostprocessError::invalid(format!(
                "cls_pred needs 4 channels, got {cls_c}"
            )));
        }
        if reg_c != 2 * num_coeffs {
            return Err(PostprocessError::invalid(format!(
                "reg_pred needs {} channels for fourier degree {}, got {reg_c}",
                2 * num_coeffs,
                self.cfg.fourier_degree
            )));
        }
        if (reg_h, reg_w) != (h, w) {
            return Err(PostprocessError::invalid(format!(
                "cls_pred is {h}x{w} but reg_pred is {reg_h}x{reg_w}"
            )));
        }
        if h == 0 || w == 0 {
            return Ok(Vec::new());
        }

        let score = self.score_map(cls_pred);
        let text_mask = score.mapv(|s| s > self.cfg.score_thr);
        let text_mask = fill_holes(text_mask.view());

        let mut boundaries = Vec::new();
        for region in connected_regions(text_mask.view()) {
            let candidates = self.region_candidates(&region, &score, reg_pred, scale)?;
            if candidates.is_empty() {
                warn!(pixels = region.len(), "text region produced no candidates");
                continue;
            }
            let kept = polygon_nms(&candidates, self.cfg.nms_thr)?;
            debug!(
                pixels = region.len(),
                candidates = candidates.len(),
                kept = kept.len(),
                "decoded text region"
            );
            boundaries.extend(kept);
        }

        polygon_nms(&boundaries, self.cfg.nms_thr)
    }

    /// `softmax(tr)[1]^alpha * softmax(tcl)[1]^beta` per pixel.
    fn score_map(&self, cls_pred: ArrayView3<'_, f32>) -> Array2<f64> {
        let (_, h, w) = cls_pred.dim();
        let mut score = Array2::<f64>::zeros((h, w));
        Zip::indexed(&mut score).for_each(|(y, x), s| {
            let tr = positive_prob(cls_pred[[0, y, x]], cls_pred[[1, y, x]]);
            let tcl = positive_prob(cls_pred[[2, y, x]], cls_pred[[3, y, x]]);
            *s = tr.powf(self.cfg.alpha) * tcl.powf(self.cfg.beta);
        });
        score
    }

    fn region_candidates(
        &self,
        region: &PixelRegion,
        score: &Array2<f64>,
        reg_pred: ArrayView3<'_, f32>,
        scale: f64,
    ) -> Result<Vec<Boundary>, PostprocessError> {
        let k = self.cfg.fourier_degree;
        let num_coeffs = self.cfg.num_coeffs();

        let pixels: Vec<(usize, usize)> = region
            .pixels
            .iter()
            .copied()
            .filter(|&(y, x)| score[[y, x]] > 0.0)
            .collect();

        let mut coeffs = Array2::<Complex64>::zeros((pixels.len(), num_coeffs));
        for (mut row, &(y, x)) in coeffs.outer_iter_mut().zip(&pixels) {
            for j in 0..num_coeffs {
                row[j] = Complex64::new(
                    f64::from(reg_pred[[j, y, x]]),
                    f64::from(reg_pred[[num_coeffs + j, y, x]]),
                );
            }
            row[k] += Complex64::new(x as f64, y as f64);
            row.mapv_inplace(|c| c * scale);
        }

        let polygons = fourier_to_polygons(coeffs.view(), self.cfg.num_reconstr_points)?;
        polygons
            .outer_iter()
            .zip(&pixels)
            .map(|(poly, &(y, x))| {
                let points = poly.iter().map(|&v| f64::from(v)).collect();
                Boundary::new(points, score[[y, x]])
            })
            .collect()
    }
}

/// Probability of the second class of a two-way softmax.
fn positive_prob(neg: f32, pos: f32) -> f64 {
    1.0 / (1.0 + (f64::from(neg) - f64::from(pos)).exp())
}
