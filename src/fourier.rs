use std::f64::consts::TAU;

use ndarray::{Array2, ArrayView2};
use num_complex::Complex64;

use crate::error::PostprocessError;

/// Reconstructs polygons from Fourier contour descriptors.
///
/// `coeffs` is `n × (2k + 1)` with each row ordered `[c_-k, ..., c_0, ..., c_k]`.
/// Each row is laid out in an unshifted spectrum of width `num_points`:
/// frequencies `0..=k` fill the first `k + 1` slots, `-k..-1` the last `k`,
/// and everything in between is zero. The inverse DFT of that spectrum,
/// scaled by `num_points`, gives x in the real part and y in the imaginary
/// part; coordinates are truncated toward zero.
///
/// Output is `n × 2·num_points` with interleaved x/y per row. Choosing
/// `num_points` large enough to avoid aliasing is up to the caller: below
/// `2k + 1` the negative frequencies overwrite the top positive ones in
/// the shared slots. Only layouts that cannot be built at all (even width,
/// `num_points < k + 1`) are rejected.
pub fn fourier_to_polygons(
    coeffs: ArrayView2<'_, Complex64>,
    num_points: usize,
) -> Result<Array2<i32>, PostprocessError> {
    let (n, width) = coeffs.dim();
    if width % 2 == 0 {
        return Err(PostprocessError::invalid(format!(
            "descriptor width must be odd (2k + 1), got {width}"
        )));
    }
    let k = (width - 1) / 2;
    if num_points < k + 1 {
        return Err(PostprocessError::invalid(format!(
            "num_points ({num_points}) must cover the {} non-negative frequencies",
            k + 1
        )));
    }

    // e^{2πi·m/N} for every residue m, so index (slot·t) mod N is exact.
    let twiddles: Vec<Complex64> = (0..num_points)
        .map(|m| Complex64::from_polar(1.0, TAU * m as f64 / num_points as f64))
        .collect();

    // Aliased layouts populate every slot.
    let slots: Vec<usize> = if num_points >= width {
        (0..=k).chain(num_points - k..num_points).collect()
    } else {
        (0..num_points).collect()
    };
    let mut spectrum = vec![Complex64::new(0.0, 0.0); num_points];
    let mut polygons = Array2::<i32>::zeros((n, 2 * num_points));

    for (row, mut out) in coeffs.outer_iter().zip(polygons.outer_iter_mut()) {
        for f in 0..=k {
            spectrum[f] = row[k + f];
        }
        for f in 0..k {
            spectrum[num_points - k + f] = row[f];
        }

        for t in 0..num_points {
            let point: Complex64 = slots
                .iter()
                .map(|&slot| spectrum[slot] * twiddles[(slot * t) % num_points])
                .sum();
            out[2 * t] = point.re as i32;
            out[2 * t + 1] = point.im as i32;
        }
    }

    Ok(polygons)
}
