// Binary mask utilities: hole filling and connected region labelling.

use ndarray::{s, Array2, ArrayView2, Zip};

/// A connected group of foreground pixels, as `(row, col)` pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PixelRegion {
    pub pixels: Vec<(usize, usize)>,
}

impl PixelRegion {
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }
}

const NEIGHBORS_4: [(isize, isize); 4] = [(0, 1), (1, 0), (0, -1), (-1, 0)];

const NEIGHBORS_8: [(isize, isize); 8] = [
    (0, 1),
    (1, 1),
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
];

/// Closes every background region not reachable from the mask border.
///
/// The mask is padded with one background pixel on each side so the
/// exterior is connected, background reachable from the corner is flooded
/// (4-connected), and the result is `!reached | mask`.
pub fn fill_holes(mask: ArrayView2<'_, bool>) -> Array2<bool> {
    let (h, w) = mask.dim();

    let mut canvas = Array2::from_elem((h + 2, w + 2), false);
    canvas.slice_mut(s![1..h + 1, 1..w + 1]).assign(&mask);
    flood_background(&mut canvas, (0, 0));

    let mut filled = mask.to_owned();
    Zip::from(&mut filled)
        .and(canvas.slice(s![1..h + 1, 1..w + 1]))
        .for_each(|out, &reached| *out = *out || !reached);
    filled
}

/// Marks every background pixel 4-connected to `seed` as set.
fn flood_background(canvas: &mut Array2<bool>, seed: (usize, usize)) {
    let (h, w) = canvas.dim();
    let mut stack = vec![seed];

    while let Some((y, x)) = stack.pop() {
        if canvas[[y, x]] {
            continue;
        }
        canvas[[y, x]] = true;

        for (dy, dx) in NEIGHBORS_4 {
            if let Some(next) = offset((y, x), (dy, dx), h, w) {
                if !canvas[next] {
                    stack.push((next[0], next[1]));
                }
            }
        }
    }
}

/// Splits the foreground into 8-connected regions, ordered by the
/// row-major position of each region's first pixel.
pub fn connected_regions(mask: ArrayView2<'_, bool>) -> Vec<PixelRegion> {
    let (h, w) = mask.dim();
    let mut visited = Array2::from_elem((h, w), false);
    let mut regions = Vec::new();

    for y in 0..h {
        for x in 0..w {
            if mask[[y, x]] && !visited[[y, x]] {
                regions.push(flood_fill_region(mask, &mut visited, (y, x)));
            }
        }
    }

    regions
}

fn flood_fill_region(
    mask: ArrayView2<'_, bool>,
    visited: &mut Array2<bool>,
    start: (usize, usize),
) -> PixelRegion {
    let (h, w) = mask.dim();
    let mut region = PixelRegion::default();
    let mut stack = vec![start];
    visited[[start.0, start.1]] = true;

    while let Some((y, x)) = stack.pop() {
        region.pixels.push((y, x));

        for (dy, dx) in NEIGHBORS_8 {
            if let Some(next) = offset((y, x), (dy, dx), h, w) {
                if mask[next] && !visited[next] {
                    visited[next] = true;
                    stack.push((next[0], next[1]));
                }
            }
        }
    }

    region.pixels.sort_unstable();
    region
}

fn offset(
    (y, x): (usize, usize),
    (dy, dx): (isize, isize),
    h: usize,
    w: usize,
) -> Option<[usize; 2]> {
    let ny = y.checked_add_signed(dy)?;
    let nx = x.checked_add_signed(dx)?;
    (ny < h && nx < w).then_some([ny, nx])
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn to_bool(m: Array2<u8>) -> Array2<bool> {
        m.mapv(|v| v != 0)
    }

    #[test]
    fn test_fill_single_enclosed_pixel() {
        let ring = to_bool(array![[1, 1, 1], [1, 0, 1], [1, 1, 1]]);
        let filled = fill_holes(ring.view());
        assert!(filled.iter().all(|&v| v));
    }

    #[test]
    fn test_all_background_unchanged() {
        let empty = Array2::from_elem((4, 5), false);
        assert_eq!(fill_holes(empty.view()), empty);
    }

    #[test]
    fn test_border_connected_background_kept() {
        // The notch at the top edge is open to the outside.
        let cup = to_bool(array![
            [1, 0, 1, 0],
            [1, 0, 1, 0],
            [1, 1, 1, 0],
        ]);
        assert_eq!(fill_holes(cup.view()), cup);
    }

    #[test]
    fn test_fill_larger_hole_off_center() {
        let mask = to_bool(array![
            [0, 0, 0, 0, 0, 0],
            [0, 1, 1, 1, 1, 0],
            [0, 1, 0, 0, 1, 0],
            [0, 1, 0, 0, 1, 0],
            [0, 1, 1, 1, 1, 0],
            [0, 0, 0, 0, 0, 0],
        ]);
        let filled = fill_holes(mask.view());
        let expected = to_bool(array![
            [0, 0, 0, 0, 0, 0],
            [0, 1, 1, 1, 1, 0],
            [0, 1, 1, 1, 1, 0],
            [0, 1, 1, 1, 1, 0],
            [0, 1, 1, 1, 1, 0],
            [0, 0, 0, 0, 0, 0],
        ]);
        assert_eq!(filled, expected);
    }

    #[test]
    fn test_diagonal_gap_does_not_leak() {
        // Background flood is 4-connected, so a diagonal gap still encloses.
        let mask = to_bool(array![
            [0, 1, 0],
            [1, 0, 1],
            [0, 1, 0],
        ]);
        let filled = fill_holes(mask.view());
        assert!(filled[[1, 1]]);
        assert!(!filled[[0, 0]]);
    }

    #[test]
    fn test_connected_regions_eight_connectivity() {
        let mask = to_bool(array![
            [1, 0, 0, 1],
            [0, 1, 0, 1],
            [0, 0, 0, 0],
            [1, 1, 0, 0],
        ]);
        let regions = connected_regions(mask.view());
        assert_eq!(regions.len(), 3);
        assert_eq!(regions[0].pixels, vec![(0, 0), (1, 1)]);
        assert_eq!(regions[1].pixels, vec![(0, 3), (1, 3)]);
        assert_eq!(regions[2].pixels, vec![(3, 0), (3, 1)]);
    }

    #[test]
    fn test_connected_regions_empty_mask() {
        let mask = Array2::from_elem((3, 3), false);
        assert!(connected_regions(mask.view()).is_empty());
    }
}
