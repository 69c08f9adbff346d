//! Attraction coupling between tracked centroids and dynamic bodies.

use crate::geometry::Point2D;
use crate::physics::{BodyHandle, PhysicsWorld};
use crate::projector::ProjectorQuad;

/// Per-tick force application toward re-projected blob centroids.
///
/// The target conversion is deliberately simpler than the polygon chain:
/// camera-space centroids scale by the quad-to-camera ratios and offset by
/// the quad's first corner. Requiring a [`ProjectorQuad`] is the readiness
/// gate; without one, centroids are computed but never applied.
#[derive(Debug, Clone, Copy)]
pub struct ForceCoupler {
    pub strength: f64,
    pub damping: f64,
}

impl ForceCoupler {
    pub fn new(strength: f64, damping: f64) -> Self {
        Self { strength, damping }
    }

    /// Attraction target for a camera-space centroid
    pub fn target(&self, quad: &ProjectorQuad, camera_size: (f64, f64), centroid: Point2D) -> Point2D {
        let (ratio_w, ratio_h) = quad.scale_from_camera(camera_size);
        let origin = quad.origin();
        Point2D::new(
            centroid.x * ratio_w + origin.x,
            centroid.y * ratio_h + origin.y,
        )
    }

    /// Pull every handle toward every centroid and keep damping applied.
    /// O(centroids x handles), fine at installation scale.
    pub fn apply<W: PhysicsWorld + ?Sized>(
        &self,
        world: &mut W,
        quad: &ProjectorQuad,
        camera_size: (f64, f64),
        centroids: &[Point2D],
        handles: &[BodyHandle],
    ) {
        for &centroid in centroids {
            let target = self.target(quad, camera_size, centroid);
            for &handle in handles {
                world.attract(handle, target, self.strength);
                world.set_damping(handle, self.damping);
            }
        }
    }
}
