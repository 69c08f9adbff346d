//! Silhouette contours into physics-ready collision polygons.
//!
//! The physics engine caps polygon fixtures at a small vertex count, so
//! every tracked contour is resampled to exactly that budget by walking its
//! perimeter at even arc-length steps, then pushed through the coordinate
//! chain into final simulation space.

use crate::error::CalibrationError;
use crate::geometry::Point2D;
use crate::projector::ProjectorQuad;
use crate::transform::Homography;

/// Edges shorter than this collapse during resampling
const MIN_EDGE: f64 = 1e-9;

/// Coordinate chain from camera space into final simulation space.
///
/// One value covers both calibration generations: with a marked projector
/// quad the points go through the quad homography, then the per-axis scale,
/// then slide right of the operator display; without one they just stretch
/// from camera to screen.
#[derive(Debug, Clone)]
pub struct TransformChain {
    homography: Option<Homography>,
    scale: (f64, f64),
    x_offset: f64,
}

impl TransformChain {
    pub fn new(homography: Option<Homography>, scale: (f64, f64), x_offset: f64) -> Self {
        Self {
            homography,
            scale,
            x_offset,
        }
    }

    /// Chain for a finalized projector quad
    pub fn for_quad(quad: &ProjectorQuad, camera_size: (f64, f64), display_offset: f64) -> Self {
        Self {
            homography: Some(*quad.homography()),
            scale: quad.scale_from_camera(camera_size),
            x_offset: display_offset,
        }
    }

    /// Fallback before any quad exists: camera stretched straight to screen
    pub fn direct(camera_size: (f64, f64), screen_size: (f64, f64)) -> Self {
        Self {
            homography: None,
            scale: (screen_size.0 / camera_size.0, screen_size.1 / camera_size.1),
            x_offset: 0.0,
        }
    }

    /// Map one camera-space point to simulation space
    pub fn apply(&self, p: Point2D) -> Point2D {
        let p = match &self.homography {
            Some(h) => h.apply(p),
            None => p,
        };
        Point2D::new(p.x * self.scale.0 + self.x_offset, p.y * self.scale.1)
    }

    pub fn apply_all(&self, points: &[Point2D]) -> Vec<Point2D> {
        points.iter().map(|&p| self.apply(p)).collect()
    }
}

/// One contour resampled to the vertex budget, in simulation space.
/// Transient: produced each tick, handed to the physics world, discarded.
#[derive(Debug, Clone)]
pub struct TrackedShape {
    pub label: u64,
    pub vertices: Vec<Point2D>,
}

/// Turns tracker contours into fixed-size collision polygons.
#[derive(Debug, Clone, Copy)]
pub struct ShapeSynthesizer {
    max_vertices: usize,
}

impl ShapeSynthesizer {
    pub fn new(max_vertices: usize) -> Self {
        Self { max_vertices }
    }

    pub fn max_vertices(&self) -> usize {
        self.max_vertices
    }

    /// Resample `contour` to exactly the vertex budget and transform it
    /// into simulation space.
    ///
    /// Degenerate contours (under three distinct vertices, or a perimeter
    /// of roughly zero) fail, and the caller drops the shape for the tick.
    /// Non-finite coordinates coming out of a degenerate chain homography
    /// are not filtered here; the physics world is the boundary that
    /// rejects those bodies.
    pub fn synthesize(
        &self,
        label: u64,
        contour: &[Point2D],
        chain: &TransformChain,
    ) -> Result<TrackedShape, CalibrationError> {
        let resampled = resample_closed(contour, self.max_vertices)?;
        Ok(TrackedShape {
            label,
            vertices: chain.apply_all(&resampled),
        })
    }
}

/// Resample a closed contour to exactly `count` points spaced evenly by
/// arc length along its perimeter.
fn resample_closed(contour: &[Point2D], count: usize) -> Result<Vec<Point2D>, CalibrationError> {
    // Collapse consecutive duplicates, including a closing vertex that
    // repeats the first.
    let mut distinct: Vec<Point2D> = Vec::with_capacity(contour.len());
    for &p in contour {
        if distinct.last().map_or(true, |&prev| p.distance_to(prev) > MIN_EDGE) {
            distinct.push(p);
        }
    }
    if distinct.len() > 1 && distinct[0].distance_to(distinct[distinct.len() - 1]) <= MIN_EDGE {
        distinct.pop();
    }
    if distinct.len() < 3 {
        return Err(CalibrationError::VertexBudget {
            vertices: distinct.len(),
        });
    }

    let mut lengths = Vec::with_capacity(distinct.len());
    let mut perimeter = 0.0;
    for i in 0..distinct.len() {
        let len = distinct[i].distance_to(distinct[(i + 1) % distinct.len()]);
        lengths.push(len);
        perimeter += len;
    }
    if perimeter <= MIN_EDGE {
        return Err(CalibrationError::VertexBudget {
            vertices: distinct.len(),
        });
    }

    let step = perimeter / count as f64;
    let mut out = Vec::with_capacity(count);
    let mut segment = 0;
    let mut walked = 0.0;
    for k in 0..count {
        let target = k as f64 * step;
        while walked + lengths[segment] < target && segment + 1 < lengths.len() {
            walked += lengths[segment];
            segment += 1;
        }
        let t = if lengths[segment] > MIN_EDGE {
            ((target - walked) / lengths[segment]).min(1.0)
        } else {
            0.0
        };
        let from = distinct[segment];
        let to = distinct[(segment + 1) % distinct.len()];
        out.push(from.lerp(to, t));
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn identity_chain() -> TransformChain {
        TransformChain::new(None, (1.0, 1.0), 0.0)
    }

    #[test]
    fn test_resample_square_is_even() {
        let square = vec![
            Point2D::new(0.0, 0.0),
            Point2D::new(8.0, 0.0),
            Point2D::new(8.0, 8.0),
            Point2D::new(0.0, 8.0),
        ];
        let out = resample_closed(&square, 8).unwrap();
        let expected = [
            (0.0, 0.0),
            (4.0, 0.0),
            (8.0, 0.0),
            (8.0, 4.0),
            (8.0, 8.0),
            (4.0, 8.0),
            (0.0, 8.0),
            (0.0, 4.0),
        ];
        assert_eq!(out.len(), 8);
        for (p, (x, y)) in out.iter().zip(expected) {
            assert!(p.distance_to(Point2D::new(x, y)) < 1e-9, "got {:?}", p);
        }
    }

    #[test]
    fn test_exact_count_for_small_and_large_inputs() {
        let synthesizer = ShapeSynthesizer::new(8);
        let chain = identity_chain();

        let triangle = vec![
            Point2D::new(0.0, 0.0),
            Point2D::new(40.0, 0.0),
            Point2D::new(0.0, 30.0),
        ];
        assert_eq!(
            synthesizer.synthesize(1, &triangle, &chain).unwrap().vertices.len(),
            8
        );

        let octagon: Vec<Point2D> = (0..8)
            .map(|i| {
                let a = i as f64 / 8.0 * std::f64::consts::TAU;
                Point2D::new(50.0 + 20.0 * a.cos(), 50.0 + 20.0 * a.sin())
            })
            .collect();
        assert_eq!(
            synthesizer.synthesize(2, &octagon, &chain).unwrap().vertices.len(),
            8
        );

        let blob: Vec<Point2D> = (0..24)
            .map(|i| {
                let a = i as f64 / 24.0 * std::f64::consts::TAU;
                let r = 20.0 + 4.0 * (3.0 * a).sin();
                Point2D::new(50.0 + r * a.cos(), 50.0 + r * a.sin())
            })
            .collect();
        assert_eq!(
            synthesizer.synthesize(3, &blob, &chain).unwrap().vertices.len(),
            8
        );
    }

    #[test]
    fn test_closed_ring_input_accepted() {
        // Trackers often repeat the first vertex at the end
        let ring = vec![
            Point2D::new(0.0, 0.0),
            Point2D::new(8.0, 0.0),
            Point2D::new(8.0, 8.0),
            Point2D::new(0.0, 8.0),
            Point2D::new(0.0, 0.0),
        ];
        let out = resample_closed(&ring, 8).unwrap();
        assert_eq!(out.len(), 8);
        assert!(out[2].distance_to(Point2D::new(8.0, 0.0)) < 1e-9);
    }

    #[test]
    fn test_degenerate_contours_rejected() {
        let two = vec![Point2D::new(0.0, 0.0), Point2D::new(5.0, 5.0)];
        assert!(matches!(
            resample_closed(&two, 8),
            Err(CalibrationError::VertexBudget { vertices: 2 })
        ));

        let collapsed = vec![Point2D::new(3.0, 3.0); 10];
        assert!(matches!(
            resample_closed(&collapsed, 8),
            Err(CalibrationError::VertexBudget { vertices: 1 })
        ));
    }

    #[test]
    fn test_direct_chain_scales_to_screen() {
        let chain = TransformChain::direct((320.0, 240.0), (2464.0, 768.0));
        let p = chain.apply(Point2D::new(50.0, 50.0));
        assert!((p.x - 50.0 * 2464.0 / 320.0).abs() < 1e-9);
        assert!((p.y - 50.0 * 768.0 / 240.0).abs() < 1e-9);
    }

    #[test]
    fn test_quad_chain_lands_in_display_space() {
        // A quad with the camera's aspect ratio maps camera corners onto
        // the marked corners exactly.
        let corners = [
            Point2D::new(1540.0, 50.0),
            Point2D::new(1860.0, 50.0),
            Point2D::new(1860.0, 290.0),
            Point2D::new(1540.0, 290.0),
        ];
        let quad = ProjectorQuad::from_corners(corners, (320.0, 240.0), 1440.0).unwrap();
        let chain = TransformChain::for_quad(&quad, (320.0, 240.0), 1440.0);

        let tl = chain.apply(Point2D::new(0.0, 0.0));
        assert!(tl.distance_to(corners[0]) < 0.5, "got {:?}", tl);
        let br = chain.apply(Point2D::new(320.0, 240.0));
        assert!(br.distance_to(corners[2]) < 0.5, "got {:?}", br);
    }

    #[test]
    fn test_nonfinite_vertices_pass_through() {
        // Singular line at x = 1; the synthesizer must not filter or panic
        let h = Homography::from_array([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, -1.0, 0.0, 1.0]);
        let chain = TransformChain::new(Some(h), (1.0, 1.0), 0.0);
        let triangle = vec![
            Point2D::new(1.0, 0.0),
            Point2D::new(4.0, 0.0),
            Point2D::new(1.0, 3.0),
        ];
        let shape = ShapeSynthesizer::new(8).synthesize(9, &triangle, &chain).unwrap();
        assert_eq!(shape.vertices.len(), 8);
        assert!(shape.vertices.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()));
    }

    proptest! {
        #[test]
        fn prop_resample_count_is_exact(
            n in 3usize..40,
            radius in 10.0f64..100.0,
            budget in 3usize..16,
        ) {
            let contour: Vec<Point2D> = (0..n)
                .map(|i| {
                    let a = i as f64 / n as f64 * std::f64::consts::TAU;
                    Point2D::new(radius * a.cos(), radius * a.sin())
                })
                .collect();
            let out = resample_closed(&contour, budget).unwrap();
            prop_assert_eq!(out.len(), budget);
        }
    }
}
