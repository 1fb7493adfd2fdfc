use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::{Area, Contains, CoordsIter, InteriorPoint};
use geo_clipper::{Clipper, EndType, JoinType};
use geo_types::{Coord, Line, LineString, MultiPolygon, Polygon};
use tracing::{trace, warn};

use crate::error::PostprocessError;
use crate::types::{check_points, polygon_from_pairs, InvalidPolicy};

/// Fixed-point scale handed to Clipper. A power of two keeps the
/// integer round trip exact for coordinates on a 1/1024 pixel grid.
const CLIPPER_FACTOR: f64 = 1024.0;

/// Reshapes a flat `[x1, y1, ..., xk, yk]` sequence into a polygon.
pub fn points_to_polygon(points: &[f64]) -> Result<Polygon<f64>, PostprocessError> {
    check_points(points)?;
    Ok(polygon_from_pairs(points))
}

/// Geometric validity in the simple-features sense, restricted to what
/// detector output can get wrong: rings that cross or touch themselves,
/// collapse to a line, or have fewer than three distinct vertices.
pub trait Validity {
    fn is_valid(&self) -> bool;

    fn to_multi_polygon(&self) -> MultiPolygon<f64>;
}

impl Validity for Polygon<f64> {
    fn is_valid(&self) -> bool {
        ring_is_simple(self.exterior()) && self.interiors().iter().all(ring_is_simple)
    }

    fn to_multi_polygon(&self) -> MultiPolygon<f64> {
        MultiPolygon(vec![self.clone()])
    }
}

/// Parts are checked individually; Clipper never emits overlapping parts.
impl Validity for MultiPolygon<f64> {
    fn is_valid(&self) -> bool {
        self.0.iter().all(Validity::is_valid)
    }

    fn to_multi_polygon(&self) -> MultiPolygon<f64> {
        self.clone()
    }
}

fn ring_is_simple(ring: &LineString<f64>) -> bool {
    let mut pts: Vec<Coord<f64>> = Vec::with_capacity(ring.0.len());
    for &c in &ring.0 {
        if !c.x.is_finite() || !c.y.is_finite() {
            return false;
        }
        if pts.last() != Some(&c) {
            pts.push(c);
        }
    }
    if pts.len() > 1 && pts.first() == pts.last() {
        pts.pop();
    }

    let n = pts.len();
    if n < 3 {
        return false;
    }

    let edges: Vec<Line<f64>> = (0..n).map(|i| Line::new(pts[i], pts[(i + 1) % n])).collect();
    for i in 0..n {
        for j in (i + 1)..n {
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            match line_intersection(edges[i], edges[j]) {
                None => {}
                // Neighbouring edges meet at their shared vertex.
                Some(LineIntersection::SinglePoint { .. }) if adjacent => {}
                Some(_) => return false,
            }
        }
    }

    ring_signed_area(&LineString(pts)) != 0.0
}

/// Returns the geometry unchanged when it is valid; otherwise resolves
/// self-crossing and self-touching loops with a zero-distance Clipper
/// offset, the analogue of a zero-width buffer.
///
/// The repair is lossy. Crossing loops come back as separate parts (a
/// bow-tie keeps both lobes), and loops that only touch at a vertex are
/// split apart at that vertex. The result is always valid; geometry that
/// cannot be repaired, such as rings with non-finite coordinates, comes
/// back empty.
pub fn make_valid<G: Validity + ?Sized>(geom: &G) -> MultiPolygon<f64> {
    repair(geom).unwrap_or_else(|| {
        warn!("polygon could not be repaired, treating it as empty");
        MultiPolygon(vec![])
    })
}

/// `None` when no valid geometry could be recovered.
fn repair<G: Validity + ?Sized>(geom: &G) -> Option<MultiPolygon<f64>> {
    let multi = geom.to_multi_polygon();
    if geom.is_valid() {
        return Some(multi);
    }
    if !multi.coords_iter().all(|c| c.x.is_finite() && c.y.is_finite()) {
        return None;
    }

    let offset = multi.offset(0.0, JoinType::Miter(2.0), EndType::ClosedPolygon, CLIPPER_FACTOR);
    let repaired = split_touching_rings(&offset);
    let valid = repaired.is_valid();
    trace!(
        parts_before = multi.0.len(),
        parts_after = repaired.0.len(),
        valid,
        "repaired invalid polygon"
    );
    valid.then_some(repaired)
}

/// Clipper may emit rings that pass through the same vertex twice. Each
/// such ring is cut into simple loops: loops wound like their source ring
/// keep its role, the others swap between shell and hole. Holes are then
/// attached to the smallest shell containing them.
fn split_touching_rings(multi: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    let mut shells = Vec::new();
    let mut holes = Vec::new();

    for poly in multi {
        let sign = ring_signed_area(poly.exterior()).signum();
        for ring in split_loops(poly.exterior()) {
            if ring_signed_area(&ring).signum() == sign {
                shells.push(ring);
            } else {
                holes.push(ring);
            }
        }
        for interior in poly.interiors() {
            let sign = ring_signed_area(interior).signum();
            for ring in split_loops(interior) {
                if ring_signed_area(&ring).signum() == sign {
                    holes.push(ring);
                } else {
                    shells.push(ring);
                }
            }
        }
    }

    let mut parts: Vec<(Polygon<f64>, f64)> = shells
        .into_iter()
        .map(|ring| {
            let shell = Polygon::new(ring, vec![]);
            let size = shell.unsigned_area();
            (shell, size)
        })
        .collect();

    for hole in holes {
        let Some(inside) = Polygon::new(hole.clone(), vec![]).interior_point() else {
            continue;
        };
        let owner = parts
            .iter_mut()
            .filter(|(shell, _)| shell.contains(&inside))
            .min_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((shell, _)) = owner {
            shell.interiors_push(hole);
        }
    }

    MultiPolygon(parts.into_iter().map(|(shell, _)| shell).collect())
}

/// Cuts a ring at every revisited vertex. Loops that enclose no area are
/// dropped.
fn split_loops(ring: &LineString<f64>) -> Vec<LineString<f64>> {
    let mut pts: &[Coord<f64>] = &ring.0;
    if pts.len() > 1 && pts.first() == pts.last() {
        pts = &pts[..pts.len() - 1];
    }

    let mut loops = Vec::new();
    let mut path: Vec<Coord<f64>> = Vec::with_capacity(pts.len());
    for &c in pts {
        if let Some(start) = path.iter().position(|&p| p == c) {
            loops.push(path.split_off(start));
        }
        path.push(c);
    }
    loops.push(path);

    loops
        .into_iter()
        .filter(|pts| pts.len() >= 3)
        .map(|mut pts| {
            pts.push(pts[0]);
            LineString(pts)
        })
        .filter(|ring| ring_signed_area(ring) != 0.0)
        .collect()
}

fn ring_signed_area(ring: &LineString<f64>) -> f64 {
    Polygon::new(ring.clone(), vec![]).signed_area()
}

/// Unsigned area of a polygon or multi-polygon.
pub fn area<G: Area<f64>>(geom: &G) -> f64 {
    geom.unsigned_area()
}

/// Repaired or checked inputs, or the value to report instead of an area.
fn prepare(
    a: &Polygon<f64>,
    b: &Polygon<f64>,
    policy: InvalidPolicy,
) -> Result<(MultiPolygon<f64>, MultiPolygon<f64>), Option<f64>> {
    match policy {
        InvalidPolicy::Repair => match (repair(a), repair(b)) {
            (Some(a), Some(b)) => Ok((a, b)),
            _ => Err(None),
        },
        InvalidPolicy::Fallback(value) => {
            if a.is_valid() && b.is_valid() {
                Ok((a.to_multi_polygon(), b.to_multi_polygon()))
            } else {
                Err(Some(value))
            }
        }
    }
}

/// Area of `a ∩ b` together with the intersection geometry.
///
/// The area is `None` when repair left an input invalid, and the fallback
/// value under [`InvalidPolicy::Fallback`]. The geometry is `None` exactly
/// when no area was measured.
pub fn intersection_area_and_geometry(
    a: &Polygon<f64>,
    b: &Polygon<f64>,
    policy: InvalidPolicy,
) -> (Option<f64>, Option<MultiPolygon<f64>>) {
    match prepare(a, b, policy) {
        Ok((a, b)) => {
            let region = a.intersection(&b, CLIPPER_FACTOR);
            (Some(region.unsigned_area()), Some(region))
        }
        Err(fallback) => (fallback, None),
    }
}

/// Area of `a ∪ b` together with the union geometry.
///
/// Fallback behaviour matches [`intersection_area_and_geometry`].
pub fn union_area_and_geometry(
    a: &Polygon<f64>,
    b: &Polygon<f64>,
    policy: InvalidPolicy,
) -> (Option<f64>, Option<MultiPolygon<f64>>) {
    match prepare(a, b, policy) {
        Ok((a, b)) => {
            let region = a.union(&b, CLIPPER_FACTOR);
            (Some(region.unsigned_area()), Some(region))
        }
        Err(fallback) => (fallback, None),
    }
}

pub fn intersection_area(a: &Polygon<f64>, b: &Polygon<f64>, policy: InvalidPolicy) -> Option<f64> {
    intersection_area_and_geometry(a, b, policy).0
}

pub fn union_area(a: &Polygon<f64>, b: &Polygon<f64>, policy: InvalidPolicy) -> Option<f64> {
    union_area_and_geometry(a, b, policy).0
}

/// Intersection over union of two polygons, repairing invalid inputs first.
/// An input that cannot be repaired counts as empty.
///
/// Returns `zero_division` when the union area is exactly zero.
pub fn iou(a: &Polygon<f64>, b: &Polygon<f64>, zero_division: f64) -> f64 {
    region_iou(&make_valid(a), &make_valid(b), zero_division)
}

/// IoU of two already repaired regions.
pub(crate) fn region_iou(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>, zero_division: f64) -> f64 {
    let union = a.union(b, CLIPPER_FACTOR).unsigned_area();
    if union == 0.0 {
        return zero_division;
    }
    a.intersection(b, CLIPPER_FACTOR).unsigned_area() / union
}

/// IoU between two flat point sequences `[x1, y1, ..., xk, yk]`.
pub fn boundary_iou(src: &[f64], target: &[f64], zero_division: f64) -> Result<f64, PostprocessError> {
    let src = points_to_polygon(src)?;
    let target = points_to_polygon(target)?;
    Ok(iou(&src, &target, zero_division))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon<f64> {
        points_to_polygon(&[x0, y0, x1, y0, x1, y1, x0, y1]).unwrap()
    }

    fn bowtie() -> Polygon<f64> {
        points_to_polygon(&[0.0, 0.0, 10.0, 10.0, 10.0, 0.0, 0.0, 10.0]).unwrap()
    }

    #[test]
    fn test_points_to_polygon_rejects_bad_lengths() {
        assert!(points_to_polygon(&[0.0, 0.0, 1.0, 0.0, 1.0, 1.0]).is_err());
        assert!(points_to_polygon(&[0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.5]).is_err());
        let poly = points_to_polygon(&[0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0]).unwrap();
        assert_eq!(poly.exterior().0.len(), 5);
    }

    #[test]
    fn test_non_finite_coordinates_are_rejected() {
        let square = [0.0, 0.0, 10.0, 0.0, 10.0, 10.0, 0.0, 10.0];
        let broken = [0.0, 0.0, f64::INFINITY, 0.0, 10.0, 10.0, 0.0, 10.0];
        assert!(points_to_polygon(&broken).is_err());
        assert!(boundary_iou(&square, &broken, 0.0).is_err());
    }

    #[test]
    fn test_validity() {
        assert!(rect(0.0, 0.0, 4.0, 3.0).is_valid());
        assert!(!bowtie().is_valid());

        // Collinear points enclose no area.
        let flat = points_to_polygon(&[0.0, 0.0, 1.0, 0.0, 2.0, 0.0, 3.0, 0.0]).unwrap();
        assert!(!flat.is_valid());

        // Repeated consecutive vertices are tolerated.
        let dup = points_to_polygon(&[0.0, 0.0, 0.0, 0.0, 4.0, 0.0, 4.0, 4.0, 0.0, 4.0]).unwrap();
        assert!(dup.is_valid());

        // A vertex touching a non-adjacent edge.
        let touching =
            points_to_polygon(&[0.0, 0.0, 4.0, 0.0, 4.0, 4.0, 2.0, 0.0, 0.0, 4.0]).unwrap();
        assert!(!touching.is_valid());
    }

    #[test]
    fn test_make_valid_keeps_valid_polygon() {
        let poly = rect(0.0, 0.0, 4.0, 3.0);
        let fixed = make_valid(&poly);
        assert_eq!(fixed.0.len(), 1);
        assert_eq!(fixed.0[0], poly);
    }

    #[test]
    fn test_make_valid_repairs_bowtie() {
        let fixed = make_valid(&bowtie());
        assert!(fixed.is_valid());
        // Both lobes survive as separate parts.
        assert_eq!(fixed.0.len(), 2);
        assert_relative_eq!(area(&fixed), 50.0, epsilon = 1e-6);
    }

    #[test]
    fn test_make_valid_repairs_bowtie_in_any_vertex_order() {
        let reordered = points_to_polygon(&[0.0, 0.0, 10.0, 10.0, 0.0, 10.0, 10.0, 0.0]).unwrap();
        assert!(!reordered.is_valid());
        let fixed = make_valid(&reordered);
        assert!(fixed.is_valid());
        assert_eq!(fixed.0.len(), 2);
        assert_relative_eq!(area(&fixed), 50.0, epsilon = 1e-6);
    }

    #[test]
    fn test_make_valid_splits_self_touching_ring() {
        // Two triangles meeting at (2, 2).
        let pinched =
            points_to_polygon(&[0.0, 0.0, 4.0, 0.0, 2.0, 2.0, 4.0, 4.0, 0.0, 4.0, 2.0, 2.0])
                .unwrap();
        assert!(!pinched.is_valid());
        let fixed = make_valid(&pinched);
        assert!(fixed.is_valid());
        assert_eq!(fixed.0.len(), 2);
        assert_relative_eq!(area(&fixed), 8.0, epsilon = 1e-6);
    }

    #[test]
    fn test_split_loops_cuts_at_revisited_vertex() {
        let ring = LineString::from(vec![
            (5.0, 5.0),
            (10.0, 10.0),
            (0.0, 10.0),
            (5.0, 5.0),
            (0.0, 0.0),
            (10.0, 0.0),
            (5.0, 5.0),
        ]);
        let loops = split_loops(&ring);
        assert_eq!(loops.len(), 2);
        for l in &loops {
            assert!(ring_is_simple(l));
            assert_relative_eq!(ring_signed_area(l), 25.0, epsilon = 1e-12);
        }

        let pinched = MultiPolygon(vec![Polygon::new(ring, vec![])]);
        let split = split_touching_rings(&pinched);
        assert_eq!(split.0.len(), 2);
        assert!(split.is_valid());
    }

    #[test]
    fn test_split_touching_rings_keeps_inner_loop_as_hole() {
        // A square shell with a triangular notch pinched in at (0, 0).
        let ring = LineString::from(vec![
            (0.0, 0.0),
            (10.0, 0.0),
            (10.0, 10.0),
            (0.0, 10.0),
            (0.0, 0.0),
            (2.0, 6.0),
            (6.0, 2.0),
            (0.0, 0.0),
        ]);
        let split = split_touching_rings(&MultiPolygon(vec![Polygon::new(ring, vec![])]));
        assert_eq!(split.0.len(), 1);
        assert_eq!(split.0[0].interiors().len(), 1);
        assert_relative_eq!(area(&split), 100.0 - 16.0, epsilon = 1e-9);
    }

    #[test]
    fn test_make_valid_empties_non_finite_geometry() {
        let poly = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (f64::INFINITY, 0.0), (10.0, 10.0), (0.0, 10.0)]),
            vec![],
        );
        assert!(!poly.is_valid());
        assert!(make_valid(&poly).0.is_empty());

        let square = rect(0.0, 0.0, 10.0, 10.0);
        assert_eq!(iou(&square, &poly, 0.0), 0.0);
        assert_eq!(intersection_area(&square, &poly, InvalidPolicy::Repair), None);
        assert_eq!(union_area_and_geometry(&square, &poly, InvalidPolicy::Repair), (None, None));
        assert_eq!(union_area(&square, &poly, InvalidPolicy::Fallback(-1.0)), Some(-1.0));
    }

    #[test]
    fn test_make_valid_is_idempotent() {
        let once = make_valid(&bowtie());
        let twice = make_valid(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_iou_identity_and_disjoint() {
        let a = rect(0.0, 0.0, 10.0, 10.0);
        let b = rect(20.0, 20.0, 30.0, 25.0);
        assert_relative_eq!(iou(&a, &a, 0.0), 1.0, epsilon = 1e-12);
        assert_relative_eq!(iou(&b, &b, 0.0), 1.0, epsilon = 1e-12);
        assert_eq!(iou(&a, &b, 0.0), 0.0);
    }

    #[test]
    fn test_iou_partial_overlap_is_symmetric() {
        let a = rect(0.0, 0.0, 10.0, 10.0);
        let b = rect(5.0, 0.0, 15.0, 10.0);
        // 50 / 150
        assert_relative_eq!(iou(&a, &b, 0.0), 1.0 / 3.0, epsilon = 1e-9);
        assert_relative_eq!(iou(&a, &b, 0.0), iou(&b, &a, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_iou_zero_division() {
        let line = points_to_polygon(&[0.0, 0.0, 1.0, 0.0, 2.0, 0.0, 3.0, 0.0]).unwrap();
        assert_eq!(iou(&line, &line, 0.0), 0.0);
        assert_eq!(iou(&line, &line, 1.0), 1.0);
    }

    #[test]
    fn test_union_matches_inclusion_exclusion() {
        let a = rect(0.0, 0.0, 10.0, 10.0);
        let b = rect(5.0, 5.0, 12.0, 20.0);
        let inter = intersection_area(&a, &b, InvalidPolicy::Repair).unwrap();
        let union = union_area(&a, &b, InvalidPolicy::Repair).unwrap();
        assert_relative_eq!(inter, 25.0, epsilon = 1e-9);
        assert_relative_eq!(union, area(&a) + area(&b) - inter, epsilon = 1e-9);
    }

    #[test]
    fn test_fallback_policy_skips_repair() {
        let a = rect(0.0, 0.0, 10.0, 10.0);
        let (value, geom) = intersection_area_and_geometry(&a, &bowtie(), InvalidPolicy::Fallback(-1.0));
        assert_eq!(value, Some(-1.0));
        assert!(geom.is_none());
        assert_eq!(union_area(&bowtie(), &a, InvalidPolicy::Fallback(0.0)), Some(0.0));

        // Valid inputs are measured normally.
        let b = rect(0.0, 0.0, 5.0, 10.0);
        let (value, geom) = union_area_and_geometry(&a, &b, InvalidPolicy::Fallback(-1.0));
        assert_relative_eq!(value.unwrap(), 100.0, epsilon = 1e-9);
        assert!(geom.is_some());
    }

    #[test]
    fn test_repair_policy_measures_invalid_input() {
        let a = rect(0.0, 0.0, 10.0, 10.0);
        let (inter, geom) = intersection_area_and_geometry(&a, &bowtie(), InvalidPolicy::Repair);
        assert_relative_eq!(inter.unwrap(), 50.0, epsilon = 1e-6);
        assert!(geom.unwrap().is_valid());
    }

    #[test]
    fn test_boundary_iou_validates_lengths() {
        let a = [0.0, 0.0, 10.0, 0.0, 10.0, 10.0, 0.0, 10.0];
        assert_relative_eq!(boundary_iou(&a, &a, 0.0).unwrap(), 1.0, epsilon = 1e-12);
        assert!(boundary_iou(&a, &a[..6], 0.0).is_err());
    }
}
