//! Homography lifecycle: recompute policy, lock flag, readiness, and
//! persistence.

use tracing::{info, warn};

use crate::correspondence::CorrespondencePointSet;
use crate::error::CalibrationError;
use crate::store::CalibrationStore;
use crate::transform::Homography;

/// Owns the camera-to-display homography and decides when to recompute it.
///
/// The matrix and the readiness flag are deliberately separate: a failed
/// recompute keeps the previous matrix around for display while `is_ready`
/// tells the warp not to trust it.
#[derive(Debug, Clone)]
pub struct HomographyEstimator {
    matrix: Homography,
    ready: bool,
    locked: bool,
}

impl Default for HomographyEstimator {
    fn default() -> Self {
        Self {
            matrix: Homography::IDENTITY,
            ready: false,
            locked: false,
        }
    }
}

impl HomographyEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn matrix(&self) -> &Homography {
        &self.matrix
    }

    /// Whether the matrix can be trusted for warping
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Freeze or unfreeze recomputation. Point edits continue while locked;
    /// the matrix just stops following them.
    pub fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }

    /// Per-tick recompute. Fewer than four pairs is the normal state while
    /// marking is in progress, so it skips silently rather than logging
    /// every frame.
    pub fn refresh(&mut self, points: &CorrespondencePointSet) {
        if self.locked || points.len() < 4 {
            return;
        }
        match Homography::estimate(points.source(), points.destination()) {
            Ok(matrix) => {
                let was_ready = self.ready;
                self.matrix = matrix;
                self.ready = true;
                if !was_ready {
                    info!("Homography ready from {} point pairs", points.len());
                }
            }
            Err(err) => {
                if self.ready {
                    warn!("Homography recompute failed ({}), warp disabled", err);
                }
                self.ready = false;
            }
        }
    }

    /// Forget the matrix and readiness, e.g. after the points were cleared
    pub fn invalidate(&mut self) {
        self.matrix = Homography::IDENTITY;
        self.ready = false;
    }

    /// Persist the current matrix. Skipped with a warning when the
    /// calibration is not ready; there is nothing worth saving then.
    pub fn save(&self, store: &CalibrationStore) -> Result<(), CalibrationError> {
        if !self.ready {
            warn!("Not saving homography, calibration is not ready");
            return Ok(());
        }
        store.save_matrix(&self.matrix)
    }

    /// Restore a previously saved matrix. Readiness from storage does not
    /// require live points; the two stores are allowed to disagree.
    pub fn load(&mut self, store: &CalibrationStore) -> Result<bool, CalibrationError> {
        match store.load_matrix()? {
            Some(matrix) if matrix.is_usable() => {
                self.matrix = matrix;
                self.ready = true;
                info!("Restored saved homography");
                Ok(true)
            }
            Some(_) => {
                warn!("Saved homography is unusable, ignoring it");
                Ok(false)
            }
            None => Ok(false),
        }
    }
}
