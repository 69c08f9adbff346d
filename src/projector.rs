//! Projector-bounds calibration.
//!
//! The user marks the four projector-visible corners on the display; the
//! fourth corner finalizes a quad that yields the second homography in the
//! transform chain, the scale ratios used for force targets, and the ground
//! anchors for the static boundary. Nothing else in the pipeline knows the
//! projector's pixel dimensions, so the quad's bounding box stands in for
//! them.

use tracing::{info, warn};

use crate::config::StageConfig;
use crate::error::CalibrationError;
use crate::geometry::Point2D;
use crate::store::{CalibrationStore, GROUP_PROJECTOR};
use crate::transform::Homography;

/// A finalized projector quad and everything derived from it.
///
/// Corners are ordered top-left, top-right, bottom-right, bottom-left by
/// convention. Immutable once built; re-entering marking mode replaces the
/// whole value.
#[derive(Debug, Clone)]
pub struct ProjectorQuad {
    corners: [Point2D; 4],
    width: f64,
    height: f64,
    homography: Homography,
}

impl ProjectorQuad {
    /// Build the quad from four display-space corners.
    ///
    /// The homography maps the camera rectangle onto the marked quad
    /// expressed in a camera-scaled frame: each corner is shifted by the
    /// display offset and scaled by cameraWidth / quadWidth, so the result
    /// composes with the per-axis scale stage of the transform chain.
    pub fn from_corners(
        corners: [Point2D; 4],
        camera_size: (f64, f64),
        display_offset: f64,
    ) -> Result<Self, CalibrationError> {
        let min_x = corners.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
        let max_x = corners.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
        let min_y = corners.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
        let max_y = corners.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);
        let width = max_x - min_x;
        let height = max_y - min_y;
        if !width.is_finite() || !height.is_finite() || width < 1.0 || height < 1.0 {
            return Err(CalibrationError::DegenerateTransform);
        }

        let (cam_w, cam_h) = camera_size;
        let ratio = cam_w / width;
        let destination: Vec<Point2D> = corners
            .iter()
            .map(|p| Point2D::new((p.x - display_offset) * ratio, p.y * ratio))
            .collect();
        let source = [
            Point2D::new(0.0, 0.0),
            Point2D::new(cam_w, 0.0),
            Point2D::new(cam_w, cam_h),
            Point2D::new(0.0, cam_h),
        ];
        let homography = Homography::estimate(&source, &destination)?;

        Ok(Self {
            corners,
            width,
            height,
            homography,
        })
    }

    pub fn corners(&self) -> &[Point2D; 4] {
        &self.corners
    }

    /// Bounding-box size of the quad, standing in for projector dimensions
    pub fn size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    pub fn homography(&self) -> &Homography {
        &self.homography
    }

    /// First marked corner; force targets are offset from here
    pub fn origin(&self) -> Point2D {
        self.corners[0]
    }

    /// Ground anchors, the bottom edge of the quad (bottom-left to
    /// bottom-right)
    pub fn ground_anchors(&self) -> (Point2D, Point2D) {
        (self.corners[3], self.corners[2])
    }

    /// Per-axis scale from camera space into the quad's display-space size
    pub fn scale_from_camera(&self, camera_size: (f64, f64)) -> (f64, f64) {
        (self.width / camera_size.0, self.height / camera_size.1)
    }

    /// Closed five-point outline for the view layer
    pub fn outline(&self) -> [Point2D; 5] {
        [
            self.corners[0],
            self.corners[1],
            self.corners[2],
            self.corners[3],
            self.corners[0],
        ]
    }
}

/// Collects the four marked corners and produces a [`ProjectorQuad`].
///
/// There is no incremental recalibration: entering marking mode always
/// drops the previous quad, and all four corners must be re-marked.
#[derive(Debug, Clone)]
pub struct ProjectorCalibrator {
    camera_size: (f64, f64),
    display_offset: f64,
    marking: bool,
    pending: Vec<Point2D>,
    quad: Option<ProjectorQuad>,
}

impl ProjectorCalibrator {
    pub fn new(stage: &StageConfig) -> Self {
        Self {
            camera_size: stage.camera_size(),
            display_offset: stage.display_offset,
            marking: false,
            pending: Vec::with_capacity(4),
            quad: None,
        }
    }

    pub fn is_marking(&self) -> bool {
        self.marking
    }

    pub fn is_ready(&self) -> bool {
        self.quad.is_some()
    }

    pub fn quad(&self) -> Option<&ProjectorQuad> {
        self.quad.as_ref()
    }

    /// Corners marked so far in the current marking session
    pub fn pending(&self) -> &[Point2D] {
        &self.pending
    }

    /// Enter marking mode, dropping the previous quad
    pub fn begin_marking(&mut self) {
        if self.quad.take().is_some() {
            info!("Projector quad dropped, remarking");
        }
        self.marking = true;
        self.pending.clear();
    }

    /// Record one display-space corner; the fourth finalizes the quad.
    /// Corners are expected in top-left, top-right, bottom-right,
    /// bottom-left order.
    pub fn mark_corner(&mut self, p: Point2D) {
        if !self.marking {
            warn!("Ignoring projector corner outside marking mode");
            return;
        }
        self.pending.push(p);
        if self.pending.len() < 4 {
            return;
        }

        let corners = [
            self.pending[0],
            self.pending[1],
            self.pending[2],
            self.pending[3],
        ];
        match ProjectorQuad::from_corners(corners, self.camera_size, self.display_offset) {
            Ok(quad) => {
                info!(
                    "Projector quad finalized: {:.0}x{:.0} at ({:.0}, {:.0})",
                    quad.width, quad.height, quad.corners[0].x, quad.corners[0].y
                );
                self.quad = Some(quad);
            }
            Err(err) => {
                warn!("Projector quad rejected ({}), re-mark all corners", err);
            }
        }
        self.marking = false;
        self.pending.clear();
    }

    /// Persist the finalized corners, if any
    pub fn save(&self, store: &CalibrationStore) -> Result<(), CalibrationError> {
        if let Some(quad) = &self.quad {
            store.save_points(GROUP_PROJECTOR, quad.corners())?;
        }
        Ok(())
    }

    /// Restore corners saved by an earlier run; four of them finalize the
    /// quad immediately.
    pub fn load(&mut self, store: &CalibrationStore) -> Result<bool, CalibrationError> {
        let points = store.load_points(GROUP_PROJECTOR)?;
        if points.len() < 4 {
            return Ok(false);
        }
        let corners = [points[0], points[1], points[2], points[3]];
        match ProjectorQuad::from_corners(corners, self.camera_size, self.display_offset) {
            Ok(quad) => {
                info!("Restored projector quad");
                self.quad = Some(quad);
                Ok(true)
            }
            Err(err) => {
                warn!("Saved projector quad is unusable ({})", err);
                Ok(false)
            }
        }
    }
}
