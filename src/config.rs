//! Typed runtime configuration.
//!
//! Everything the installation tunes at runtime lives here as named fields
//! in one TOML file: stage geometry, tracker tunables, and physics
//! behavior. Widget-to-field mapping is the shell's concern; this module
//! only defines the fields and their persistence.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::CalibrationError;
use crate::transform::{Interpolation, Mirror};

/// Camera, display, and interaction geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    /// Camera frame width in pixels
    #[serde(default = "default_camera_width")]
    pub camera_width: u32,
    /// Camera frame height in pixels
    #[serde(default = "default_camera_height")]
    pub camera_height: u32,
    /// Width of the operator display; projector space starts at this x
    #[serde(default = "default_display_offset")]
    pub display_offset: f64,
    /// Full window width spanning operator display and projector area
    #[serde(default = "default_screen_width")]
    pub screen_width: f64,
    #[serde(default = "default_screen_height")]
    pub screen_height: f64,
    /// Radius within which a click grabs an existing marked point
    #[serde(default = "default_grab_radius")]
    pub grab_radius: f64,
    /// Post-warp mirroring of the camera frame
    #[serde(default)]
    pub mirror: Mirror,
    /// Sampling mode for the per-frame warp
    #[serde(default)]
    pub interpolation: Interpolation,
}

fn default_camera_width() -> u32 {
    320
}

fn default_camera_height() -> u32 {
    240
}

fn default_display_offset() -> f64 {
    1440.0
}

fn default_screen_width() -> f64 {
    2464.0
}

fn default_screen_height() -> f64 {
    768.0
}

fn default_grab_radius() -> f64 {
    20.0
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            camera_width: default_camera_width(),
            camera_height: default_camera_height(),
            display_offset: default_display_offset(),
            screen_width: default_screen_width(),
            screen_height: default_screen_height(),
            grab_radius: default_grab_radius(),
            mirror: Mirror::default(),
            interpolation: Interpolation::default(),
        }
    }
}

impl StageConfig {
    /// Camera dimensions as floats, the form the transform math wants
    pub fn camera_size(&self) -> (f64, f64) {
        (self.camera_width as f64, self.camera_height as f64)
    }
}

/// Tunables handed to the external blob tracker every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Binarization threshold, 0-255
    #[serde(default = "default_threshold")]
    pub threshold: u8,
    /// Smallest accepted blob radius in warped-frame pixels
    #[serde(default = "default_min_area_radius")]
    pub min_area_radius: f64,
    /// Largest accepted blob radius in warped-frame pixels
    #[serde(default = "default_max_area_radius")]
    pub max_area_radius: f64,
    /// Frames a blob survives unseen before its label is retired
    #[serde(default = "default_persistence")]
    pub persistence: u32,
    /// Maximum per-frame centroid travel for label matching, pixels
    #[serde(default = "default_max_distance")]
    pub max_distance: f64,
    /// Track dark silhouettes on a light background
    #[serde(default)]
    pub invert: bool,
}

fn default_threshold() -> u8 {
    128
}

fn default_min_area_radius() -> f64 {
    15.0
}

fn default_max_area_radius() -> f64 {
    100.0
}

fn default_persistence() -> u32 {
    15
}

fn default_max_distance() -> f64 {
    32.0
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            min_area_radius: default_min_area_radius(),
            max_area_radius: default_max_area_radius(),
            persistence: default_persistence(),
            max_distance: default_max_distance(),
            invert: false,
        }
    }
}

/// Physics world tuning and body spawn behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicsConfig {
    #[serde(default = "default_true")]
    pub gravity_enabled: bool,
    /// Gravity vector; the installation blows bodies sideways
    #[serde(default = "default_gravity")]
    pub gravity: (f64, f64),
    #[serde(default = "default_true")]
    pub walls_enabled: bool,
    /// Radius bounds for ambient circles
    #[serde(default = "default_circle_min_radius")]
    pub circle_min_radius: f64,
    #[serde(default = "default_circle_max_radius")]
    pub circle_max_radius: f64,
    /// Mean ticks between ambient circle spawns; 0 disables them
    #[serde(default = "default_circle_frequency")]
    pub circle_frequency: u32,
    /// Vertical pad beyond the stage before bodies are culled
    #[serde(default = "default_cull_margin")]
    pub cull_margin: f64,
    /// Attraction strength toward tracked centroids
    #[serde(default = "default_attraction_strength")]
    pub attraction_strength: f64,
    /// Isotropic damping applied alongside the attraction
    #[serde(default = "default_damping")]
    pub damping: f64,
    /// Collision polygon vertex budget imposed by the physics engine
    #[serde(default = "default_max_polygon_vertices")]
    pub max_polygon_vertices: usize,
    /// Fixed simulation step in seconds
    #[serde(default = "default_timestep")]
    pub timestep: f64,
}

fn default_true() -> bool {
    true
}

fn default_gravity() -> (f64, f64) {
    (20.0, 0.0)
}

fn default_circle_min_radius() -> f64 {
    2.0
}

fn default_circle_max_radius() -> f64 {
    20.0
}

fn default_circle_frequency() -> u32 {
    20
}

fn default_cull_margin() -> f64 {
    400.0
}

fn default_attraction_strength() -> f64 {
    8.0
}

fn default_damping() -> f64 {
    0.7
}

fn default_max_polygon_vertices() -> usize {
    8
}

fn default_timestep() -> f64 {
    1.0 / 30.0
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity_enabled: true,
            gravity: default_gravity(),
            walls_enabled: true,
            circle_min_radius: default_circle_min_radius(),
            circle_max_radius: default_circle_max_radius(),
            circle_frequency: default_circle_frequency(),
            cull_margin: default_cull_margin(),
            attraction_strength: default_attraction_strength(),
            damping: default_damping(),
            max_polygon_vertices: default_max_polygon_vertices(),
            timestep: default_timestep(),
        }
    }
}

impl PhysicsConfig {
    /// Gravity vector the world should run with right now
    pub fn effective_gravity(&self) -> (f64, f64) {
        if self.gravity_enabled {
            self.gravity
        } else {
            (0.0, 0.0)
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub stage: StageConfig,

    #[serde(default)]
    pub tracking: TrackingConfig,

    #[serde(default)]
    pub physics: PhysicsConfig,
}

impl Config {
    /// Load configuration from a file, or create default if it doesn't exist
    pub fn load_or_create(path: &Path) -> Result<Self, CalibrationError> {
        if path.exists() {
            let content = fs::read_to_string(path)
                .map_err(|e| CalibrationError::persistence(path, e))?;
            let config: Config =
                toml::from_str(&content).map_err(|e| CalibrationError::persistence(path, e))?;
            info!("Loaded configuration from {:?}", path);
            Ok(config)
        } else {
            let config = Config::default();
            config.save(path)?;
            info!("Created default configuration at {:?}", path);
            Ok(config)
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<(), CalibrationError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| CalibrationError::persistence(path, e))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| CalibrationError::persistence(parent, e))?;
        }

        fs::write(path, content).map_err(|e| CalibrationError::persistence(path, e))
    }
}
