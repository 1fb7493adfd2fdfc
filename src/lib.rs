//! # fcepost - Scene-text contour postprocessing
//!
//! Geometric postprocessing for Fourier-contour text detectors (FCENet style):
//! turns per-candidate Fourier descriptors into polygons, repairs
//! self-intersecting output, suppresses overlapping detections with
//! polygon IoU and filters results by confidence.
//!
//! ## Features
//!
//! - **Polygon geometry**: validity checks, repair of self-crossing rings, intersection
//!   and union areas and IoU on top of Clipper (`geo-clipper`)
//! - **Fourier decoding**: inverse transform of `2k + 1` coefficients into a
//!   fixed-resolution integer polygon
//! - **Mask hole filling** for binary segmentation masks
//! - **Greedy polygon NMS** and score filtering utilities
//! - **FCE head decoding**: score maps and coefficient maps to boundaries,
//!   per image or as a parallel batch
//!
//! ## Quick Start
//!
//! ```rust
//! use fcepost::{polygon_nms, Boundary};
//!
//! let boundaries = vec![
//!     Boundary::from_flat(vec![0.0, 0.0, 10.0, 0.0, 10.0, 10.0, 0.0, 10.0, 0.9])?,
//!     Boundary::from_flat(vec![1.0, 0.0, 11.0, 0.0, 11.0, 10.0, 1.0, 10.0, 0.6])?,
//! ];
//!
//! let kept = polygon_nms(&boundaries, 0.5)?;
//! assert_eq!(kept.len(), 1);
//! assert_eq!(kept[0].score(), 0.9);
//! # Ok::<(), fcepost::PostprocessError>(())
//! ```

mod contours;
mod error;
mod filter;
mod fourier;
mod geometry;
mod nms;
mod postprocess;
mod types;

// Public API exports
pub use crate::contours::{connected_regions, fill_holes, PixelRegion};
pub use crate::error::PostprocessError;
pub use crate::filter::{
    filter_by_score, filter_labeled_boundaries, select_top_per_image, split_boundary_and_score,
    BoundarySplit,
};
pub use crate::fourier::fourier_to_polygons;
pub use crate::geometry::{
    area, boundary_iou, intersection_area, intersection_area_and_geometry, iou, make_valid,
    points_to_polygon, union_area, union_area_and_geometry, Validity,
};
pub use crate::nms::polygon_nms;
pub use crate::postprocess::{FceLevel, FcePostProcess};
pub use crate::types::{Boundary, FceConfig, InvalidPolicy, MIN_POLYGON_COORDS};

// Geometry and complex types used in the public signatures
pub use geo_types::{MultiPolygon, Polygon};
pub use num_complex::Complex64;
