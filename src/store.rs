//! File-backed persistence for calibration artifacts.
//!
//! Two TOML files under one directory: `homography.toml` holds the matrix
//! blob, `points.toml` holds named ordered point groups. A missing file is
//! the normal cold-start state, never an error.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::CalibrationError;
use crate::geometry::Point2D;
use crate::transform::Homography;

const MATRIX_FILE: &str = "homography.toml";
const POINTS_FILE: &str = "points.toml";

/// Point group holding the marked source-side correspondence points
pub const GROUP_SOURCE: &str = "camera_source";
/// Point group holding the marked destination-side correspondence points
pub const GROUP_DESTINATION: &str = "camera_destination";
/// Point group holding the projector quad corners in display space
pub const GROUP_PROJECTOR: &str = "projector";

#[derive(Debug, Serialize, Deserialize)]
struct MatrixFile {
    matrix: Homography,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PointsFile {
    #[serde(default)]
    groups: BTreeMap<String, Vec<Point2D>>,
}

/// Directory-rooted store for the homography matrix and point groups.
#[derive(Debug, Clone)]
pub struct CalibrationStore {
    dir: PathBuf,
}

impl CalibrationStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn matrix_path(&self) -> PathBuf {
        self.dir.join(MATRIX_FILE)
    }

    pub fn points_path(&self) -> PathBuf {
        self.dir.join(POINTS_FILE)
    }

    /// Load the saved matrix; `Ok(None)` when none was ever saved
    pub fn load_matrix(&self) -> Result<Option<Homography>, CalibrationError> {
        let path = self.matrix_path();
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)
            .map_err(|e| CalibrationError::persistence(&path, e))?;
        let file: MatrixFile =
            toml::from_str(&raw).map_err(|e| CalibrationError::persistence(&path, e))?;
        Ok(Some(file.matrix))
    }

    pub fn save_matrix(&self, matrix: &Homography) -> Result<(), CalibrationError> {
        let path = self.matrix_path();
        let body = toml::to_string_pretty(&MatrixFile { matrix: *matrix })
            .map_err(|e| CalibrationError::persistence(&path, e))?;
        self.write(&path, &body)?;
        info!("Saved homography to {:?}", path);
        Ok(())
    }

    /// Remove the saved matrix if present. Clearing the marked points goes
    /// through here too, so a stale matrix never resurrects on restart.
    pub fn clear_matrix(&self) -> Result<(), CalibrationError> {
        let path = self.matrix_path();
        match fs::remove_file(&path) {
            Ok(()) => {
                info!("Removed saved homography at {:?}", path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CalibrationError::persistence(&path, e)),
        }
    }

    /// Load one named point group; a missing file or group is just empty
    pub fn load_points(&self, group: &str) -> Result<Vec<Point2D>, CalibrationError> {
        let mut file = self.read_points_file()?;
        Ok(file.groups.remove(group).unwrap_or_default())
    }

    /// Replace one named point group, leaving the others untouched
    pub fn save_points(&self, group: &str, points: &[Point2D]) -> Result<(), CalibrationError> {
        let mut file = self.read_points_file()?;
        file.groups.insert(group.to_string(), points.to_vec());
        self.write_points_file(&file)
    }

    /// Drop one named point group
    pub fn clear_points(&self, group: &str) -> Result<(), CalibrationError> {
        let mut file = self.read_points_file()?;
        if file.groups.remove(group).is_none() {
            return Ok(());
        }
        self.write_points_file(&file)
    }

    fn read_points_file(&self) -> Result<PointsFile, CalibrationError> {
        let path = self.points_path();
        if !path.exists() {
            return Ok(PointsFile::default());
        }
        let raw = fs::read_to_string(&path)
            .map_err(|e| CalibrationError::persistence(&path, e))?;
        toml::from_str(&raw).map_err(|e| CalibrationError::persistence(&path, e))
    }

    fn write_points_file(&self, file: &PointsFile) -> Result<(), CalibrationError> {
        let path = self.points_path();
        let body =
            toml::to_string_pretty(file).map_err(|e| CalibrationError::persistence(&path, e))?;
        self.write(&path, &body)
    }

    fn write(&self, path: &Path, body: &str) -> Result<(), CalibrationError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| CalibrationError::persistence(parent, e))?;
        }
        fs::write(path, body).map_err(|e| CalibrationError::persistence(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn scratch_store(tag: &str) -> CalibrationStore {
        static COUNTER: AtomicU32 = AtomicU32::new(0);
        let dir = std::env::temp_dir().join(format!(
            "warpfield-store-{}-{}-{}",
            tag,
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        let _ = fs::remove_dir_all(&dir);
        CalibrationStore::new(dir)
    }

    #[test]
    fn test_matrix_roundtrip() {
        let store = scratch_store("matrix");
        let h = Homography::from_array([1.0, 0.0, 10.0, 0.0, 1.0, 10.0, 0.0, 0.0, 1.0]);
        store.save_matrix(&h).unwrap();
        let loaded = store.load_matrix().unwrap().unwrap();
        assert_eq!(loaded, h);
    }

    #[test]
    fn test_missing_matrix_is_none() {
        let store = scratch_store("missing");
        assert!(store.load_matrix().unwrap().is_none());
    }

    #[test]
    fn test_clear_matrix_deletes_file() {
        let store = scratch_store("clear");
        store.save_matrix(&Homography::IDENTITY).unwrap();
        assert!(store.matrix_path().exists());
        store.clear_matrix().unwrap();
        assert!(!store.matrix_path().exists());
        // Idempotent on an already-missing file
        store.clear_matrix().unwrap();
    }

    #[test]
    fn test_point_groups_are_independent() {
        let store = scratch_store("groups");
        let src = vec![Point2D::new(1.0, 2.0), Point2D::new(3.0, 4.0)];
        let quad = vec![Point2D::new(100.0, 50.0)];
        store.save_points(GROUP_SOURCE, &src).unwrap();
        store.save_points(GROUP_PROJECTOR, &quad).unwrap();

        assert_eq!(store.load_points(GROUP_SOURCE).unwrap(), src);
        assert_eq!(store.load_points(GROUP_PROJECTOR).unwrap(), quad);
        assert!(store.load_points(GROUP_DESTINATION).unwrap().is_empty());

        store.clear_points(GROUP_SOURCE).unwrap();
        assert!(store.load_points(GROUP_SOURCE).unwrap().is_empty());
        assert_eq!(store.load_points(GROUP_PROJECTOR).unwrap(), quad);
    }

    #[test]
    fn test_points_preserve_order() {
        let store = scratch_store("order");
        let pts: Vec<Point2D> = (0..8).map(|i| Point2D::new(i as f64, -(i as f64))).collect();
        store.save_points(GROUP_DESTINATION, &pts).unwrap();
        assert_eq!(store.load_points(GROUP_DESTINATION).unwrap(), pts);
    }

    #[test]
    fn test_malformed_file_is_persistence_error() {
        let store = scratch_store("malformed");
        fs::create_dir_all(store.matrix_path().parent().unwrap()).unwrap();
        fs::write(store.matrix_path(), "not toml {{{{").unwrap();
        assert!(matches!(
            store.load_matrix(),
            Err(CalibrationError::Persistence { .. })
        ));
    }
}
