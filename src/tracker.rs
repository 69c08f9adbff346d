//! Capability surface of the external blob tracker.

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::config::TrackingConfig;
use crate::geometry::Point2D;

/// One tracked silhouette for the current frame.
///
/// Labels are persistent for the lifetime of a blob; the tracker owns that
/// bookkeeping. Only the contour and centroid are consumed here, in warped
/// camera space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedBlob {
    pub label: u64,
    pub contour: Vec<Point2D>,
    pub centroid: Point2D,
}

/// Contour detection plus persistent-ID tracking over warped camera frames.
pub trait BlobTracker {
    fn track(&mut self, frame: &RgbaImage, config: &TrackingConfig) -> Vec<TrackedBlob>;
}
