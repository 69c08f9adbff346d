//! In-memory physics world used by the unit tests.

use std::collections::HashMap;

use crate::geometry::{Point2D, Rect};
use crate::physics::{BodyHandle, Material, PhysicsWorld};

/// Records every call so tests can assert on pipeline behavior.
#[derive(Debug, Default)]
pub struct FakeWorld {
    next: u64,
    pub positions: HashMap<u64, Point2D>,
    pub materials: HashMap<u64, Material>,
    pub polygons: HashMap<u64, Vec<Point2D>>,
    pub statics: Vec<u64>,
    pub attractions: Vec<(u64, Point2D, f64)>,
    pub damping: Vec<(u64, f64)>,
    pub gravity: (f64, f64),
    pub steps: u32,
}

impl FakeWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dynamic bodies currently alive
    pub fn body_count(&self) -> usize {
        self.positions.len()
    }

    /// Teleport a body, e.g. to drive cull tests
    pub fn set_position(&mut self, handle: BodyHandle, p: Point2D) {
        self.positions.insert(handle.0, p);
    }

    fn mint_dynamic(&mut self, p: Point2D, material: Material) -> BodyHandle {
        let id = self.next;
        self.next += 1;
        self.positions.insert(id, p);
        self.materials.insert(id, material);
        BodyHandle(id)
    }

    fn mint_static(&mut self) -> BodyHandle {
        let id = self.next;
        self.next += 1;
        self.statics.push(id);
        BodyHandle(id)
    }
}

impl PhysicsWorld for FakeWorld {
    fn spawn_circle(&mut self, center: Point2D, _radius: f64, material: Material) -> BodyHandle {
        self.mint_dynamic(center, material)
    }

    fn spawn_polygon(&mut self, vertices: &[Point2D], material: Material) -> BodyHandle {
        let n = vertices.len().max(1) as f64;
        let centroid = vertices.iter().fold(Point2D::new(0.0, 0.0), |acc, p| {
            Point2D::new(acc.x + p.x / n, acc.y + p.y / n)
        });
        let handle = self.mint_dynamic(centroid, material);
        self.polygons.insert(handle.0, vertices.to_vec());
        handle
    }

    fn add_static_rect(&mut self, _rect: Rect) -> BodyHandle {
        self.mint_static()
    }

    fn add_static_edge(&mut self, _a: Point2D, _b: Point2D) -> BodyHandle {
        self.mint_static()
    }

    fn remove_body(&mut self, handle: BodyHandle) {
        self.positions.remove(&handle.0);
        self.materials.remove(&handle.0);
        self.polygons.remove(&handle.0);
        self.statics.retain(|&id| id != handle.0);
    }

    fn position(&self, handle: BodyHandle) -> Option<Point2D> {
        self.positions.get(&handle.0).copied()
    }

    fn attract(&mut self, handle: BodyHandle, target: Point2D, strength: f64) {
        self.attractions.push((handle.0, target, strength));
    }

    fn set_damping(&mut self, handle: BodyHandle, damping: f64) {
        self.damping.push((handle.0, damping));
    }

    fn set_gravity(&mut self, gravity: (f64, f64)) {
        self.gravity = gravity;
    }

    fn step(&mut self, _dt: f64) {
        self.steps += 1;
    }
}
