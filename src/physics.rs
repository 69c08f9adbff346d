//! Capability surface of the rigid-body engine driving the installation.
//!
//! The engine itself is an external collaborator; the pipeline only needs
//! to mint bodies, push forces, and step the world. Implementations mint
//! opaque handles and own all integration details.

use crate::geometry::{Point2D, Rect};

/// Opaque body identifier minted by the world implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyHandle(pub u64);

/// Density, restitution, and friction for a body fixture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub density: f64,
    pub restitution: f64,
    pub friction: f64,
}

impl Material {
    pub const fn new(density: f64, restitution: f64, friction: f64) -> Self {
        Self {
            density,
            restitution,
            friction,
        }
    }

    /// Ambient circles raining into the projector area
    pub const CIRCLE: Self = Self::new(0.3, 0.5, 0.1);
    /// Circles spawned directly by the operator
    pub const HEAVY_CIRCLE: Self = Self::new(3.0, 0.53, 0.1);
    /// Colored particles
    pub const PARTICLE: Self = Self::new(0.4, 0.53, 0.31);
    /// Per-tick silhouette polygons
    pub const TRACKED: Self = Self::new(1.0, 0.3, 0.3);
}

/// What a dynamic body is, for lifecycle decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Circle,
    Particle,
    /// Transient silhouette polygon, rebuilt every tick
    Tracked,
}

/// The slice of a physics engine the pipeline needs.
///
/// Coordinates are final simulation/display space throughout. Removing an
/// unknown handle must be a no-op, and `position` returns `None` for
/// removed bodies.
pub trait PhysicsWorld {
    /// Mint a dynamic circle body
    fn spawn_circle(&mut self, center: Point2D, radius: f64, material: Material) -> BodyHandle;

    /// Mint a dynamic polygon body from pre-transformed vertices
    fn spawn_polygon(&mut self, vertices: &[Point2D], material: Material) -> BodyHandle;

    /// Static collision rectangle, used for the containment walls
    fn add_static_rect(&mut self, rect: Rect) -> BodyHandle;

    /// Static edge between two anchor points, used for the ground
    fn add_static_edge(&mut self, a: Point2D, b: Point2D) -> BodyHandle;

    fn remove_body(&mut self, handle: BodyHandle);

    /// Current position of a body, `None` once removed
    fn position(&self, handle: BodyHandle) -> Option<Point2D>;

    /// Pull a body toward `target` with the given strength
    fn attract(&mut self, handle: BodyHandle, target: Point2D, strength: f64);

    /// Isotropic velocity damping for one body
    fn set_damping(&mut self, handle: BodyHandle, damping: f64);

    fn set_gravity(&mut self, gravity: (f64, f64));

    /// Advance the simulation by `dt` seconds
    fn step(&mut self, dt: f64);
}
