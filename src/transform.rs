//! Homographies and projective image warping.
//!
//! A homography is a 3x3 matrix mapping one planar coordinate frame onto
//! another, estimated from marked point correspondences. Estimation uses
//! the normalized direct linear transform (DLT), so four pairs give an
//! exact fit and more give a least-squares one. Image warping inverse-maps
//! every destination pixel into the source; forward mapping would leave
//! holes.

use image::{Rgba, RgbaImage};
use nalgebra::{DMatrix, Matrix3};
use serde::{Deserialize, Serialize};

use crate::error::CalibrationError;
use crate::geometry::Point2D;

/// Threshold below which determinants and pivots count as zero
const EPS: f64 = 1e-10;

/// A 3x3 planar projective transform, stored in row-major order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Homography {
    m: [f64; 9],
}

impl Homography {
    pub const IDENTITY: Self = Self {
        m: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
    };

    pub const fn from_array(m: [f64; 9]) -> Self {
        Self { m }
    }

    pub const fn as_array(&self) -> &[f64; 9] {
        &self.m
    }

    /// Estimate the homography mapping `src[i]` onto `dst[i]`.
    ///
    /// Needs at least four pairs; with more the result is the least-squares
    /// fit. Point sets that cannot be normalized (all coincident) or that
    /// produce an unusable matrix fail with `DegenerateTransform` so the
    /// caller can keep its readiness flag down.
    pub fn estimate(src: &[Point2D], dst: &[Point2D]) -> Result<Self, CalibrationError> {
        let n = src.len().min(dst.len());
        if n < 4 {
            return Err(CalibrationError::InsufficientPoints { got: n });
        }

        let (t_src, src_n) =
            normalize(&src[..n]).ok_or(CalibrationError::DegenerateTransform)?;
        let (t_dst, dst_n) =
            normalize(&dst[..n]).ok_or(CalibrationError::DegenerateTransform)?;

        // Two rows per correspondence; pad with zero rows below nine so the
        // SVD always exposes the full right singular basis.
        let mut a = DMatrix::<f64>::zeros((2 * n).max(9), 9);
        for (i, (s, d)) in src_n.iter().zip(dst_n.iter()).enumerate() {
            let (x, y) = (s.x, s.y);
            let (u, v) = (d.x, d.y);
            let r = 2 * i;
            a[(r, 0)] = -x;
            a[(r, 1)] = -y;
            a[(r, 2)] = -1.0;
            a[(r, 6)] = u * x;
            a[(r, 7)] = u * y;
            a[(r, 8)] = u;
            a[(r + 1, 3)] = -x;
            a[(r + 1, 4)] = -y;
            a[(r + 1, 5)] = -1.0;
            a[(r + 1, 6)] = v * x;
            a[(r + 1, 7)] = v * y;
            a[(r + 1, 8)] = v;
        }

        // Null-space vector = right singular vector of the smallest
        // singular value; nalgebra sorts them in descending order.
        let svd = a.svd(false, true);
        let v_t = svd.v_t.ok_or(CalibrationError::DegenerateTransform)?;
        let h = v_t.row(v_t.nrows() - 1);
        let hn = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]);

        // Undo the normalization: H = T_dst^-1 * Hn * T_src
        let t_dst_inv = t_dst
            .try_inverse()
            .ok_or(CalibrationError::DegenerateTransform)?;
        let mut m = t_dst_inv * hn * t_src;

        let scale = m[(2, 2)];
        if scale.abs() < EPS {
            return Err(CalibrationError::DegenerateTransform);
        }
        m /= scale;

        let result = Self {
            m: [
                m[(0, 0)],
                m[(0, 1)],
                m[(0, 2)],
                m[(1, 0)],
                m[(1, 1)],
                m[(1, 2)],
                m[(2, 0)],
                m[(2, 1)],
                m[(2, 2)],
            ],
        };
        if !result.is_usable() {
            return Err(CalibrationError::DegenerateTransform);
        }
        Ok(result)
    }

    /// Apply the forward projective mapping to one point.
    ///
    /// The arithmetic is honest: a point near the transform's singular line
    /// divides by roughly zero and comes back non-finite. Consumers gate on
    /// readiness flags, never on output values.
    pub fn apply(&self, p: Point2D) -> Point2D {
        let m = &self.m;
        let w = m[6] * p.x + m[7] * p.y + m[8];
        Point2D::new(
            (m[0] * p.x + m[1] * p.y + m[2]) / w,
            (m[3] * p.x + m[4] * p.y + m[5]) / w,
        )
    }

    /// Inverse transform via the adjugate, `None` when singular
    pub fn inverse(&self) -> Option<Self> {
        let m = &self.m;
        let det = m[0] * (m[4] * m[8] - m[5] * m[7]) - m[1] * (m[3] * m[8] - m[5] * m[6])
            + m[2] * (m[3] * m[7] - m[4] * m[6]);
        if !det.is_finite() || det.abs() < EPS {
            return None;
        }
        let adj = [
            m[4] * m[8] - m[5] * m[7],
            m[2] * m[7] - m[1] * m[8],
            m[1] * m[5] - m[2] * m[4],
            m[5] * m[6] - m[3] * m[8],
            m[0] * m[8] - m[2] * m[6],
            m[2] * m[3] - m[0] * m[5],
            m[3] * m[7] - m[4] * m[6],
            m[1] * m[6] - m[0] * m[7],
            m[0] * m[4] - m[1] * m[3],
        ];
        let mut out = [0.0; 9];
        for (o, a) in out.iter_mut().zip(adj) {
            *o = a / det;
        }
        Some(Self { m: out })
    }

    /// Finiteness and invertibility sanity check.
    ///
    /// A degenerate estimate may still hand back a matrix; readiness flags
    /// must gate on this rather than on matrix presence.
    pub fn is_usable(&self) -> bool {
        self.m.iter().all(|v| v.is_finite()) && self.inverse().is_some()
    }
}

/// Hartley normalization: translate the centroid to the origin and scale
/// the mean distance to sqrt(2). Returns the normalizing matrix and the
/// transformed points, or `None` when the points all coincide.
fn normalize(points: &[Point2D]) -> Option<(Matrix3<f64>, Vec<Point2D>)> {
    let n = points.len() as f64;
    let cx = points.iter().map(|p| p.x).sum::<f64>() / n;
    let cy = points.iter().map(|p| p.y).sum::<f64>() / n;
    let mean_dist = points
        .iter()
        .map(|p| ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    if mean_dist < EPS {
        return None;
    }
    let s = std::f64::consts::SQRT_2 / mean_dist;
    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);
    let transformed = points
        .iter()
        .map(|p| Point2D::new(s * (p.x - cx), s * (p.y - cy)))
        .collect();
    Some((t, transformed))
}

/// Sampling mode for image warping.
///
/// Nearest is noticeably faster on CPU; bilinear is smoother under strong
/// distortion. Both are exposed so the shell can trade quality for frame
/// rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    Nearest,
    #[default]
    Bilinear,
}

/// Warp `src` through `h`, producing an image with the same dimensions.
///
/// Each destination pixel is sampled from its inverse-mapped source
/// location; pixels that map outside the frame stay transparent black.
pub fn warp_image(
    src: &RgbaImage,
    h: &Homography,
    interpolation: Interpolation,
) -> Result<RgbaImage, CalibrationError> {
    let inv = h.inverse().ok_or(CalibrationError::DegenerateTransform)?;
    let (width, height) = src.dimensions();
    let mut out = RgbaImage::new(width, height);

    for y in 0..height {
        for x in 0..width {
            let p = inv.apply(Point2D::new(x as f64, y as f64));
            if !p.x.is_finite() || !p.y.is_finite() {
                continue;
            }
            let sampled = match interpolation {
                Interpolation::Nearest => nearest_sample(src, p.x, p.y),
                Interpolation::Bilinear => bilinear_sample(src, p.x, p.y),
            };
            if let Some(pixel) = sampled {
                out.put_pixel(x, y, pixel);
            }
        }
    }

    Ok(out)
}

/// Apply the forward mapping to a point list.
///
/// Pure in its homography argument. Non-finite outputs from a degenerate
/// matrix pass through unfiltered.
pub fn warp_points(points: &[Point2D], h: &Homography) -> Vec<Point2D> {
    points.iter().map(|&p| h.apply(p)).collect()
}

#[inline]
fn nearest_sample(src: &RgbaImage, x: f64, y: f64) -> Option<Rgba<u8>> {
    let (width, height) = src.dimensions();
    let xi = x.round();
    let yi = y.round();
    if xi < 0.0 || yi < 0.0 || xi >= width as f64 || yi >= height as f64 {
        return None;
    }
    Some(*src.get_pixel(xi as u32, yi as u32))
}

#[inline]
fn bilinear_sample(src: &RgbaImage, x: f64, y: f64) -> Option<Rgba<u8>> {
    let (width, height) = src.dimensions();
    if x < 0.0 || y < 0.0 || x > width as f64 - 1.0 || y > height as f64 - 1.0 {
        return None;
    }

    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let p00 = src.get_pixel(x0, y0).0;
    let p10 = src.get_pixel(x1, y0).0;
    let p01 = src.get_pixel(x0, y1).0;
    let p11 = src.get_pixel(x1, y1).0;

    let mut out = [0u8; 4];
    for c in 0..4 {
        let value = p00[c] as f64 * (1.0 - fx) * (1.0 - fy)
            + p10[c] as f64 * fx * (1.0 - fy)
            + p01[c] as f64 * (1.0 - fx) * fy
            + p11[c] as f64 * fx * fy;
        out[c] = value.round().clamp(0.0, 255.0) as u8;
    }
    Some(Rgba(out))
}

/// Horizontal/vertical flips applied after warping.
///
/// Mirroring is deliberately not folded into the homography: the flips can
/// be toggled live without invalidating calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Mirror {
    #[serde(default)]
    pub horizontal: bool,
    #[serde(default)]
    pub vertical: bool,
}

impl Mirror {
    pub fn is_noop(&self) -> bool {
        !self.horizontal && !self.vertical
    }

    pub fn apply(&self, image: &mut RgbaImage) {
        if self.horizontal {
            image::imageops::flip_horizontal_in_place(image);
        }
        if self.vertical {
            image::imageops::flip_vertical_in_place(image);
        }
    }
}
