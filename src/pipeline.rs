//! The per-tick driver tying calibration, tracking, and physics together.
//!
//! Everything runs on one thread in a fixed order per tick: recompute the
//! homography if the marked points changed, warp and mirror the camera
//! frame, hand it to the tracker, rebuild the tracked collision polygons,
//! pull attractable bodies toward the tracked centroids, then run the body
//! lifecycle (boundary, ambient spawns, culling) and step the world. The
//! camera, tracker, and physics engine sit behind traits so the pipeline
//! never blocks on hardware.

use std::time::{Duration, Instant};

use image::RgbaImage;
use tracing::{debug, info, warn};

use crate::bodies::BodyLifecycleManager;
use crate::calibration::HomographyEstimator;
use crate::config::{Config, StageConfig};
use crate::correspondence::{CorrespondencePointSet, PointRef, Side};
use crate::error::CalibrationError;
use crate::forces::ForceCoupler;
use crate::geometry::{Point2D, Rect};
use crate::physics::{BodyHandle, PhysicsWorld};
use crate::projector::ProjectorCalibrator;
use crate::shape::{ShapeSynthesizer, TransformChain};
use crate::store::{CalibrationStore, GROUP_DESTINATION, GROUP_SOURCE};
use crate::tracker::BlobTracker;
use crate::transform::warp_image;

const STATS_INTERVAL: Duration = Duration::from_secs(10);

/// Source of camera frames, one per tick at most.
///
/// `None` means no new frame this tick; the simulation still advances.
pub trait FrameSource {
    fn poll(&mut self) -> Option<RgbaImage>;
}

/// Both calibrations plus their backing store.
///
/// The point set and the two calibrators are public: the interactive shell
/// edits points directly and the pipeline picks the changes up on its next
/// tick.
#[derive(Debug)]
pub struct CalibrationState {
    pub points: CorrespondencePointSet,
    pub estimator: HomographyEstimator,
    pub projector: ProjectorCalibrator,
    store: CalibrationStore,
}

impl CalibrationState {
    /// Restore whatever a previous run saved; missing files leave the
    /// corresponding piece in its cold-start state.
    pub fn load(store: CalibrationStore, stage: &StageConfig) -> Result<Self, CalibrationError> {
        let mut estimator = HomographyEstimator::new();
        estimator.load(&store)?;

        let mut projector = ProjectorCalibrator::new(stage);
        projector.load(&store)?;

        let source = store.load_points(GROUP_SOURCE)?;
        let destination = store.load_points(GROUP_DESTINATION)?;
        let points = CorrespondencePointSet::from_parts(source, destination);

        Ok(Self {
            points,
            estimator,
            projector,
            store,
        })
    }

    /// Persist the point pairs, the matrix, and the projector corners
    pub fn save(&self) -> Result<(), CalibrationError> {
        self.store.save_points(GROUP_SOURCE, self.points.source())?;
        self.store
            .save_points(GROUP_DESTINATION, self.points.destination())?;
        self.estimator.save(&self.store)?;
        self.projector.save(&self.store)
    }

    /// Drop the correspondence calibration, live and persisted, so a stale
    /// matrix cannot come back on restart. The projector quad is a separate
    /// calibration and stays.
    pub fn clear(&mut self) -> Result<(), CalibrationError> {
        self.points.clear();
        self.estimator.invalidate();
        self.store.clear_points(GROUP_SOURCE)?;
        self.store.clear_points(GROUP_DESTINATION)?;
        self.store.clear_matrix()?;
        info!("Cleared correspondence calibration");
        Ok(())
    }

    pub fn store(&self) -> &CalibrationStore {
        &self.store
    }
}

/// The simulation-side pieces the pipeline owns.
#[derive(Debug)]
pub struct SimulationState {
    pub bodies: BodyLifecycleManager,
    pub coupler: ForceCoupler,
    pub synthesizer: ShapeSynthesizer,
}

impl SimulationState {
    pub fn new(config: &Config, seed: u64) -> Self {
        Self {
            bodies: BodyLifecycleManager::new(seed),
            coupler: ForceCoupler::new(
                config.physics.attraction_strength,
                config.physics.damping,
            ),
            synthesizer: ShapeSynthesizer::new(config.physics.max_polygon_vertices),
        }
    }
}

/// What one tick did, for the shell's status line and the preview view.
#[derive(Debug, Default)]
pub struct TickReport {
    pub frame_seen: bool,
    pub warp_applied: bool,
    pub blobs: usize,
    pub shapes_spawned: usize,
    pub shapes_dropped: usize,
    pub ambient_spawned: bool,
    pub culled: usize,
    pub body_count: usize,
    /// The warped, mirrored frame the tracker saw, for the preview
    pub warped: Option<RgbaImage>,
}

/// Owns the whole calibration-and-coupling loop.
#[derive(Debug)]
pub struct Pipeline {
    pub config: Config,
    pub calibration: CalibrationState,
    pub simulation: SimulationState,
    tick: u64,
    boundary_stale: bool,
    last_report: Instant,
    ticks_since_report: u32,
}

impl Pipeline {
    pub fn new(config: Config, store: CalibrationStore, seed: u64) -> Result<Self, CalibrationError> {
        let calibration = CalibrationState::load(store, &config.stage)?;
        let simulation = SimulationState::new(&config, seed);
        Ok(Self {
            config,
            calibration,
            simulation,
            tick: 0,
            boundary_stale: true,
            last_report: Instant::now(),
            ticks_since_report: 0,
        })
    }

    pub fn ticks(&self) -> u64 {
        self.tick
    }

    /// Camera space to simulation space, through the projector quad when
    /// one is marked and straight to the screen otherwise.
    pub fn transform_chain(&self) -> TransformChain {
        let stage = &self.config.stage;
        match self.calibration.projector.quad() {
            Some(quad) => TransformChain::for_quad(quad, stage.camera_size(), stage.display_offset),
            None => TransformChain::direct(
                stage.camera_size(),
                (stage.screen_width, stage.screen_height),
            ),
        }
    }

    /// Advance the installation by one tick.
    pub fn tick<S, T, W>(&mut self, source: &mut S, tracker: &mut T, world: &mut W) -> TickReport
    where
        S: FrameSource + ?Sized,
        T: BlobTracker + ?Sized,
        W: PhysicsWorld + ?Sized,
    {
        self.tick += 1;
        if self.tick == 1 {
            world.set_gravity(self.config.physics.effective_gravity());
        }

        self.calibration.estimator.refresh(&self.calibration.points);

        let mut report = TickReport::default();
        if let Some(frame) = source.poll() {
            report.frame_seen = true;
            let mut working = frame;

            if self.calibration.estimator.is_ready() {
                match warp_image(
                    &working,
                    self.calibration.estimator.matrix(),
                    self.config.stage.interpolation,
                ) {
                    Ok(warped) => {
                        working = warped;
                        report.warp_applied = true;
                    }
                    Err(err) => warn!("Warp failed ({}), tracking the raw frame", err),
                }
            }
            self.config.stage.mirror.apply(&mut working);

            let blobs = tracker.track(&working, &self.config.tracking);
            report.blobs = blobs.len();
            report.warped = Some(working);

            // Tracked polygons are rebuilt from scratch every frame
            self.simulation.bodies.clear_tracked(world);
            let chain = self.transform_chain();
            let mut centroids = Vec::with_capacity(blobs.len());
            for blob in &blobs {
                centroids.push(blob.centroid);
                match self
                    .simulation
                    .synthesizer
                    .synthesize(blob.label, &blob.contour, &chain)
                {
                    Ok(shape) => {
                        self.simulation.bodies.spawn_tracked(world, &shape);
                        report.shapes_spawned += 1;
                    }
                    Err(err) => {
                        report.shapes_dropped += 1;
                        debug!("Dropping blob {} this frame ({})", blob.label, err);
                    }
                }
            }

            if let Some(quad) = self.calibration.projector.quad() {
                let handles = self.simulation.bodies.attractable();
                self.simulation.coupler.apply(
                    world,
                    quad,
                    self.config.stage.camera_size(),
                    &centroids,
                    &handles,
                );
            }
        }

        self.refresh_boundary(world);

        report.ambient_spawned = self
            .simulation
            .bodies
            .ambient_spawn(world, &self.config.physics, &self.config.stage)
            .is_some();

        report.culled = self.simulation.bodies.cull(world, self.cull_bound());

        world.step(self.config.physics.timestep);
        report.body_count = self.simulation.bodies.len();
        self.note_tick(report.body_count);
        report
    }

    /// Enter projector marking mode, dropping the current quad
    pub fn begin_projector_marking(&mut self) {
        self.calibration.projector.begin_marking();
        self.boundary_stale = true;
    }

    /// Record one projector corner; the fourth finalizes the quad and the
    /// static boundary moves onto it on the next tick.
    pub fn mark_projector_corner(&mut self, p: Point2D) {
        self.calibration.projector.mark_corner(p);
        if self.calibration.projector.is_ready() {
            self.boundary_stale = true;
        }
    }

    /// Nearest marked point within the configured grab radius
    pub fn grab_correspondence_point(&self, side: Side, query: Point2D) -> Option<PointRef> {
        self.calibration
            .points
            .nearest(side, query, self.config.stage.grab_radius)
    }

    pub fn save_calibration(&self) -> Result<(), CalibrationError> {
        self.calibration.save()
    }

    pub fn clear_correspondences(&mut self) -> Result<(), CalibrationError> {
        self.calibration.clear()
    }

    pub fn set_walls_enabled(&mut self, enabled: bool) {
        self.config.physics.walls_enabled = enabled;
        self.boundary_stale = true;
    }

    /// Gravity toggles take effect immediately, not on the next tick
    pub fn set_gravity_enabled<W: PhysicsWorld + ?Sized>(&mut self, world: &mut W, enabled: bool) {
        self.config.physics.gravity_enabled = enabled;
        world.set_gravity(self.config.physics.effective_gravity());
    }

    /// Operator-spawned circle at a simulation-space position
    pub fn spawn_circle_at<W: PhysicsWorld + ?Sized>(
        &mut self,
        world: &mut W,
        position: Point2D,
    ) -> BodyHandle {
        let range = self.circle_radius_range();
        self.simulation.bodies.spawn_circle(world, position, range)
    }

    /// Operator-spawned tinted particle at a simulation-space position
    pub fn spawn_particle_at<W: PhysicsWorld + ?Sized>(
        &mut self,
        world: &mut W,
        position: Point2D,
    ) -> BodyHandle {
        let range = self.circle_radius_range();
        self.simulation
            .bodies
            .spawn_tinted_particle(world, position, range)
    }

    /// Despawn every circle and particle, leaving tracked polygons alone
    pub fn clear_shapes<W: PhysicsWorld + ?Sized>(&mut self, world: &mut W) {
        self.simulation.bodies.clear_dynamic(world);
    }

    fn circle_radius_range(&self) -> (f64, f64) {
        (
            self.config.physics.circle_min_radius,
            self.config.physics.circle_max_radius,
        )
    }

    /// Keep the static boundary in sync with the quad and the walls flag.
    /// Rebuilds only when something changed; the check against
    /// `boundary_active` also covers a quad that was dropped or rejected.
    fn refresh_boundary<W: PhysicsWorld + ?Sized>(&mut self, world: &mut W) {
        let ready = self.calibration.projector.is_ready();
        if !self.boundary_stale && self.simulation.bodies.boundary_active() == ready {
            return;
        }
        match self.calibration.projector.quad() {
            Some(quad) => self.simulation.bodies.rebuild_boundary(
                world,
                quad.ground_anchors(),
                quad.size(),
                self.config.stage.display_offset,
                self.config.physics.walls_enabled,
            ),
            None => self.simulation.bodies.clear_boundary(world),
        }
        self.boundary_stale = false;
    }

    fn cull_bound(&self) -> Rect {
        let margin = self.config.physics.cull_margin;
        Rect::new(
            0.0,
            -margin,
            self.config.stage.screen_width,
            self.config.stage.screen_height + margin * 2.0,
        )
    }

    fn note_tick(&mut self, body_count: usize) {
        self.ticks_since_report += 1;
        if self.last_report.elapsed() >= STATS_INTERVAL {
            let elapsed = self.last_report.elapsed().as_secs_f64();
            let rate = self.ticks_since_report as f64 / elapsed;
            info!(
                "Performance: {:.1} ticks/s ({} ticks in {:.1}s, {} bodies)",
                rate, self.ticks_since_report, elapsed, body_count
            );
            self.ticks_since_report = 0;
            self.last_report = Instant::now();
        }
    }
}
