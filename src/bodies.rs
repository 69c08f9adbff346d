//! Dynamic body bookkeeping: spawning, culling, and the static boundary.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use tracing::info;

use crate::config::{PhysicsConfig, StageConfig};
use crate::geometry::{Point2D, Rect};
use crate::physics::{BodyHandle, BodyKind, Material, PhysicsWorld};
use crate::shape::TrackedShape;

/// Wall thickness around the projector area
const WALL_SIZE: f64 = 30.0;
/// Inward nudge keeping the walls just inside the projected bounds
const WALL_BUFFER: f64 = 5.0;
/// How far above the top edge ambient circles drop in from
const SPAWN_DROP: f64 = 100.0;

/// RGB tint carried by particles for the view layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParticleColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// One live dynamic body and what it is.
#[derive(Debug, Clone, Copy)]
pub struct BodyRecord {
    pub handle: BodyHandle,
    pub kind: BodyKind,
    pub color: Option<ParticleColor>,
}

/// Owns every dynamic body plus the static boundary, and runs the per-tick
/// lifecycle: ambient spawning, off-screen culling, boundary rebuilds.
#[derive(Debug)]
pub struct BodyLifecycleManager {
    bodies: Vec<BodyRecord>,
    boundary: Vec<BodyHandle>,
    rng: Pcg32,
}

impl BodyLifecycleManager {
    pub fn new(seed: u64) -> Self {
        Self {
            bodies: Vec::new(),
            boundary: Vec::new(),
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    pub fn bodies(&self) -> &[BodyRecord] {
        &self.bodies
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn count_of(&self, kind: BodyKind) -> usize {
        self.bodies.iter().filter(|r| r.kind == kind).count()
    }

    /// Handles the attraction forces act on. Tracked polygons are terrain,
    /// not agents, so they are excluded.
    pub fn attractable(&self) -> Vec<BodyHandle> {
        self.bodies
            .iter()
            .filter(|r| r.kind != BodyKind::Tracked)
            .map(|r| r.handle)
            .collect()
    }

    /// Operator-spawned circle with a radius drawn from `radius_range`
    pub fn spawn_circle<W: PhysicsWorld + ?Sized>(
        &mut self,
        world: &mut W,
        position: Point2D,
        radius_range: (f64, f64),
    ) -> BodyHandle {
        let radius = self.sample_range(radius_range);
        let handle = world.spawn_circle(position, radius, Material::HEAVY_CIRCLE);
        self.bodies.push(BodyRecord {
            handle,
            kind: BodyKind::Circle,
            color: None,
        });
        handle
    }

    /// Colored particle with an explicit tint
    pub fn spawn_particle<W: PhysicsWorld + ?Sized>(
        &mut self,
        world: &mut W,
        position: Point2D,
        radius_range: (f64, f64),
        color: ParticleColor,
    ) -> BodyHandle {
        let radius = self.sample_range(radius_range);
        let handle = world.spawn_circle(position, radius, Material::PARTICLE);
        self.bodies.push(BodyRecord {
            handle,
            kind: BodyKind::Particle,
            color: Some(color),
        });
        handle
    }

    /// Particle tinted from the installation's palette, warm red over
    /// deep blue
    pub fn spawn_tinted_particle<W: PhysicsWorld + ?Sized>(
        &mut self,
        world: &mut W,
        position: Point2D,
        radius_range: (f64, f64),
    ) -> BodyHandle {
        let color = ParticleColor {
            r: self.rng.gen_range(20..=100),
            g: 0,
            b: self.rng.gen_range(150..=255),
        };
        self.spawn_particle(world, position, radius_range, color)
    }

    /// Collision polygon for one synthesized silhouette
    pub fn spawn_tracked<W: PhysicsWorld + ?Sized>(
        &mut self,
        world: &mut W,
        shape: &TrackedShape,
    ) -> BodyHandle {
        let handle = world.spawn_polygon(&shape.vertices, Material::TRACKED);
        self.bodies.push(BodyRecord {
            handle,
            kind: BodyKind::Tracked,
            color: None,
        });
        handle
    }

    /// Drop last tick's silhouette polygons; they are rebuilt from the
    /// fresh contours every tick.
    pub fn clear_tracked<W: PhysicsWorld + ?Sized>(&mut self, world: &mut W) {
        Self::remove_where(&mut self.bodies, world, |r| r.kind == BodyKind::Tracked);
    }

    /// Operator "clear shapes": despawn circles and particles. Tracked
    /// polygons are left for the normal per-tick rebuild.
    pub fn clear_dynamic<W: PhysicsWorld + ?Sized>(&mut self, world: &mut W) {
        Self::remove_where(&mut self.bodies, world, |r| r.kind != BodyKind::Tracked);
    }

    /// Ambient spawn roll: a 1-in-`circle_frequency` chance per tick drops
    /// a circle in from above the projector span.
    pub fn ambient_spawn<W: PhysicsWorld + ?Sized>(
        &mut self,
        world: &mut W,
        physics: &PhysicsConfig,
        stage: &StageConfig,
    ) -> Option<BodyHandle> {
        if physics.circle_frequency == 0 || self.rng.gen_range(0..physics.circle_frequency) != 0 {
            return None;
        }
        let span_end = stage.screen_width.max(stage.display_offset + 1.0);
        let position = Point2D::new(
            self.rng.gen_range(stage.display_offset..span_end),
            self.rng.gen_range(-SPAWN_DROP..0.0),
        );
        let radius = self.sample_range((physics.circle_min_radius, physics.circle_max_radius));
        let handle = world.spawn_circle(position, radius, Material::CIRCLE);
        self.bodies.push(BodyRecord {
            handle,
            kind: BodyKind::Circle,
            color: None,
        });
        Some(handle)
    }

    /// Remove every dynamic body whose position left `bound`. Runs every
    /// tick; this is the only automatic despawn path. Bodies the world no
    /// longer knows about are dropped from the roster too.
    pub fn cull<W: PhysicsWorld + ?Sized>(&mut self, world: &mut W, bound: Rect) -> usize {
        let before = self.bodies.len();
        let mut kept = Vec::with_capacity(before);
        for record in self.bodies.drain(..) {
            let inside = world
                .position(record.handle)
                .map_or(false, |p| bound.contains(p));
            if inside {
                kept.push(record);
            } else {
                world.remove_body(record.handle);
            }
        }
        self.bodies = kept;
        before - self.bodies.len()
    }

    /// Rebuild the static boundary wholesale: the ground edge between the
    /// quad's bottom corners plus, optionally, three containment walls.
    /// Idempotent; the previous boundary is removed first.
    pub fn rebuild_boundary<W: PhysicsWorld + ?Sized>(
        &mut self,
        world: &mut W,
        anchors: (Point2D, Point2D),
        quad_size: (f64, f64),
        display_offset: f64,
        walls_enabled: bool,
    ) {
        self.clear_boundary(world);
        self.boundary.push(world.add_static_edge(anchors.0, anchors.1));
        if walls_enabled {
            for rect in wall_rects(quad_size, display_offset) {
                self.boundary.push(world.add_static_rect(rect));
            }
        }
        info!(
            "Rebuilt stage boundary (ground + {} walls)",
            self.boundary.len() - 1
        );
    }

    /// Remove the ground and walls, e.g. when the quad is being re-marked
    pub fn clear_boundary<W: PhysicsWorld + ?Sized>(&mut self, world: &mut W) {
        for handle in self.boundary.drain(..) {
            world.remove_body(handle);
        }
    }

    pub fn boundary_active(&self) -> bool {
        !self.boundary.is_empty()
    }

    fn sample_range(&mut self, (min, max): (f64, f64)) -> f64 {
        if max > min {
            self.rng.gen_range(min..max)
        } else {
            min
        }
    }

    fn remove_where<W, F>(bodies: &mut Vec<BodyRecord>, world: &mut W, mut predicate: F) -> usize
    where
        W: PhysicsWorld + ?Sized,
        F: FnMut(&BodyRecord) -> bool,
    {
        let before = bodies.len();
        let mut kept = Vec::with_capacity(before);
        for record in bodies.drain(..) {
            if predicate(&record) {
                world.remove_body(record.handle);
            } else {
                kept.push(record);
            }
        }
        *bodies = kept;
        before - bodies.len()
    }
}

/// Containment walls hugging the projector area: one above and one down
/// each side, nudged inward by the buffer.
fn wall_rects((width, height): (f64, f64), offset: f64) -> [Rect; 3] {
    let top = Rect::new(
        offset - WALL_SIZE,
        WALL_BUFFER - WALL_SIZE,
        width + WALL_SIZE * 2.0,
        WALL_SIZE,
    );
    let right = Rect::new(
        offset + width,
        WALL_BUFFER - WALL_SIZE,
        WALL_SIZE,
        height + WALL_SIZE * 2.0,
    );
    let left = Rect::new(
        offset - WALL_SIZE + WALL_BUFFER,
        WALL_BUFFER - WALL_SIZE,
        WALL_SIZE,
        height + WALL_SIZE * 2.0,
    );
    [top, right, left]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testworld::FakeWorld;

    fn cull_bound() -> Rect {
        Rect::new(0.0, -400.0, 2464.0, 768.0 + 800.0)
    }

    #[test]
    fn test_cull_removes_far_offscreen_keeps_onscreen() {
        let mut world = FakeWorld::new();
        let mut manager = BodyLifecycleManager::new(1);
        let keep = manager.spawn_circle(&mut world, Point2D::new(100.0, 0.0), (5.0, 10.0));
        let gone = manager.spawn_circle(&mut world, Point2D::new(100.0, 0.0), (5.0, 10.0));
        world.set_position(gone, Point2D::new(100.0, 10000.0));

        let culled = manager.cull(&mut world, cull_bound());
        assert_eq!(culled, 1);
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.bodies()[0].handle, keep);
        assert!(world.position(gone).is_none());
        assert!(world.position(keep).is_some());
    }

    #[test]
    fn test_clear_tracked_leaves_other_bodies() {
        let mut world = FakeWorld::new();
        let mut manager = BodyLifecycleManager::new(1);
        manager.spawn_circle(&mut world, Point2D::new(0.0, 0.0), (5.0, 10.0));
        manager.spawn_tracked(
            &mut world,
            &TrackedShape {
                label: 1,
                vertices: vec![
                    Point2D::new(0.0, 0.0),
                    Point2D::new(10.0, 0.0),
                    Point2D::new(0.0, 10.0),
                ],
            },
        );
        assert_eq!(manager.len(), 2);

        manager.clear_tracked(&mut world);
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.count_of(BodyKind::Tracked), 0);
        assert_eq!(manager.count_of(BodyKind::Circle), 1);
    }

    #[test]
    fn test_clear_dynamic_leaves_tracked() {
        let mut world = FakeWorld::new();
        let mut manager = BodyLifecycleManager::new(1);
        manager.spawn_circle(&mut world, Point2D::new(0.0, 0.0), (5.0, 10.0));
        manager.spawn_tinted_particle(&mut world, Point2D::new(5.0, 5.0), (3.0, 20.0));
        manager.spawn_tracked(
            &mut world,
            &TrackedShape {
                label: 1,
                vertices: vec![
                    Point2D::new(0.0, 0.0),
                    Point2D::new(10.0, 0.0),
                    Point2D::new(0.0, 10.0),
                ],
            },
        );

        manager.clear_dynamic(&mut world);
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.count_of(BodyKind::Tracked), 1);
    }

    #[test]
    fn test_attractable_excludes_tracked() {
        let mut world = FakeWorld::new();
        let mut manager = BodyLifecycleManager::new(1);
        let circle = manager.spawn_circle(&mut world, Point2D::new(0.0, 0.0), (5.0, 10.0));
        manager.spawn_tracked(
            &mut world,
            &TrackedShape {
                label: 1,
                vertices: vec![
                    Point2D::new(0.0, 0.0),
                    Point2D::new(10.0, 0.0),
                    Point2D::new(0.0, 10.0),
                ],
            },
        );
        assert_eq!(manager.attractable(), vec![circle]);
    }

    #[test]
    fn test_boundary_rebuild_is_idempotent() {
        let mut world = FakeWorld::new();
        let mut manager = BodyLifecycleManager::new(1);
        let anchors = (Point2D::new(100.0, 350.0), Point2D::new(400.0, 350.0));

        manager.rebuild_boundary(&mut world, anchors, (300.0, 300.0), 0.0, true);
        assert_eq!(world.statics.len(), 4);
        assert!(manager.boundary_active());

        manager.rebuild_boundary(&mut world, anchors, (300.0, 300.0), 0.0, true);
        assert_eq!(world.statics.len(), 4);

        manager.rebuild_boundary(&mut world, anchors, (300.0, 300.0), 0.0, false);
        assert_eq!(world.statics.len(), 1);

        manager.clear_boundary(&mut world);
        assert!(world.statics.is_empty());
        assert!(!manager.boundary_active());
    }

    #[test]
    fn test_ambient_spawn_frequency_zero_disables() {
        let mut world = FakeWorld::new();
        let mut manager = BodyLifecycleManager::new(1);
        let physics = PhysicsConfig {
            circle_frequency: 0,
            ..PhysicsConfig::default()
        };
        let stage = StageConfig::default();
        for _ in 0..50 {
            assert!(manager.ambient_spawn(&mut world, &physics, &stage).is_none());
        }
        assert!(manager.is_empty());
    }

    #[test]
    fn test_ambient_spawn_lands_above_projector_span() {
        let mut world = FakeWorld::new();
        let mut manager = BodyLifecycleManager::new(42);
        let physics = PhysicsConfig {
            circle_frequency: 4,
            ..PhysicsConfig::default()
        };
        let stage = StageConfig::default();

        let mut spawned = 0;
        for _ in 0..200 {
            if let Some(handle) = manager.ambient_spawn(&mut world, &physics, &stage) {
                spawned += 1;
                let p = world.position(handle).unwrap();
                assert!(p.x >= stage.display_offset && p.x <= stage.screen_width);
                assert!(p.y >= -SPAWN_DROP && p.y < 0.0);
            }
        }
        assert!(spawned > 0, "a 1-in-4 roll over 200 ticks never fired");
        assert_eq!(manager.len(), spawned);
    }

    #[test]
    fn test_particle_color_recorded() {
        let mut world = FakeWorld::new();
        let mut manager = BodyLifecycleManager::new(3);
        let tint = ParticleColor { r: 50, g: 0, b: 200 };
        manager.spawn_particle(&mut world, Point2D::new(0.0, 0.0), (3.0, 20.0), tint);
        assert_eq!(manager.bodies()[0].color, Some(tint));

        manager.spawn_tinted_particle(&mut world, Point2D::new(0.0, 0.0), (3.0, 20.0));
        let sampled = manager.bodies()[1].color.unwrap();
        assert!((20..=100).contains(&sampled.r));
        assert_eq!(sampled.g, 0);
        assert!((150..=255).contains(&sampled.b));
    }

    #[test]
    fn test_material_presets_per_kind() {
        let mut world = FakeWorld::new();
        let mut manager = BodyLifecycleManager::new(3);
        let circle = manager.spawn_circle(&mut world, Point2D::new(0.0, 0.0), (5.0, 10.0));
        let particle = manager.spawn_particle(
            &mut world,
            Point2D::new(0.0, 0.0),
            (3.0, 20.0),
            ParticleColor { r: 50, g: 0, b: 200 },
        );
        assert_eq!(world.materials[&circle.0], Material::HEAVY_CIRCLE);
        assert_eq!(world.materials[&particle.0], Material::PARTICLE);
    }
}
