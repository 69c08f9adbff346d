//! User-marked point correspondences feeding homography estimation.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::geometry::Point2D;

/// Which half of a correspondence pair a point belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Source,
    Destination,
}

/// Index-based handle to one marked point.
///
/// A handle is only a position into the current sequences. Clearing the set
/// makes outstanding handles stale; mutation through a stale handle is
/// ignored, never resolved against whatever now occupies the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointRef {
    pub side: Side,
    pub index: usize,
}

/// Ordered pairs of source and destination calibration points.
///
/// Both sequences always have the same length, and mutating a point never
/// moves its pair partner: insertion order is the calibration index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorrespondencePointSet {
    source: Vec<Point2D>,
    destination: Vec<Point2D>,
}

impl CorrespondencePointSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from two persisted sequences. Sequences of unequal length
    /// (e.g. a hand-edited points file) are truncated to the shorter one.
    pub fn from_parts(source: Vec<Point2D>, destination: Vec<Point2D>) -> Self {
        let mut set = Self {
            source,
            destination,
        };
        let len = set.source.len().min(set.destination.len());
        if set.source.len() != set.destination.len() {
            warn!(
                "correspondence sides disagree ({} source, {} destination), truncating to {}",
                set.source.len(),
                set.destination.len(),
                len
            );
            set.source.truncate(len);
            set.destination.truncate(len);
        }
        set
    }

    pub fn len(&self) -> usize {
        self.source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    pub fn source(&self) -> &[Point2D] {
        &self.source
    }

    pub fn destination(&self) -> &[Point2D] {
        &self.destination
    }

    /// Append one pair; both sides grow together
    pub fn push_pair(&mut self, source: Point2D, destination: Point2D) {
        self.source.push(source);
        self.destination.push(destination);
    }

    /// Find the point closest to `query` on one side, within `max_dist`.
    /// Used to grab an existing point for dragging.
    pub fn nearest(&self, side: Side, query: Point2D, max_dist: f64) -> Option<PointRef> {
        let mut best: Option<(usize, f64)> = None;
        for (index, p) in self.points(side).iter().enumerate() {
            let dist = p.distance_to(query);
            if dist <= max_dist && best.map_or(true, |(_, d)| dist < d) {
                best = Some((index, dist));
            }
        }
        best.map(|(index, _)| PointRef { side, index })
    }

    /// Read one point through its handle
    pub fn point(&self, handle: PointRef) -> Option<Point2D> {
        self.points(handle.side).get(handle.index).copied()
    }

    /// Move the point behind `handle`. A stale handle is logged and
    /// ignored; the interaction layer may still hold one across a clear.
    pub fn set_point(&mut self, handle: PointRef, position: Point2D) {
        let points = self.points_mut(handle.side);
        if handle.index >= points.len() {
            warn!(
                "ignoring stale point handle {:?} (set has {} pairs)",
                handle,
                points.len()
            );
            return;
        }
        points[handle.index] = position;
    }

    /// Drop every pair. Outstanding handles become stale.
    pub fn clear(&mut self) {
        self.source.clear();
        self.destination.clear();
    }

    fn points(&self, side: Side) -> &[Point2D] {
        match side {
            Side::Source => &self.source,
            Side::Destination => &self.destination,
        }
    }

    fn points_mut(&mut self, side: Side) -> &mut Vec<Point2D> {
        match side {
            Side::Source => &mut self.source,
            Side::Destination => &mut self.destination,
        }
    }
}
