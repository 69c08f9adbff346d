//! Warpfield - projective calibration and coordinate coupling for a
//! projected-particle installation
//!
//! A camera watches the area a projector throws the simulation onto. This
//! crate owns the math and state that tie the two together:
//! - `transform`: homography estimation, image warping, mirroring
//! - `correspondence`: the marked camera/display point pairs
//! - `calibration`: homography lifecycle (recompute, lock, persist)
//! - `projector`: the marked projector quad and what it derives
//! - `shape`: contour resampling into fixed-size collision polygons
//! - `bodies` / `forces`: body lifecycle and centroid attraction
//! - `pipeline`: the single-threaded per-tick driver
//!
//! Camera capture, blob tracking, the physics engine, and the interactive
//! shell stay behind the `FrameSource`, `BlobTracker`, and `PhysicsWorld`
//! traits.

pub mod bodies;
pub mod calibration;
pub mod config;
pub mod correspondence;
pub mod error;
pub mod forces;
pub mod geometry;
pub mod physics;
pub mod pipeline;
pub mod projector;
pub mod shape;
pub mod store;
pub mod tracker;
pub mod transform;

#[cfg(test)]
pub(crate) mod testworld;

pub use config::Config;
pub use error::CalibrationError;
pub use geometry::{Point2D, Rect};
pub use pipeline::{Pipeline, TickReport};
pub use transform::Homography;
