//! Error taxonomy for the calibration and coupling pipeline.
//!
//! None of these are fatal: every failure is recovered within the tick it
//! happened in, and the pipeline degrades to "calibration not ready" or
//! "warp not applied" instead of halting.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CalibrationError {
    /// Homography estimation was attempted with fewer than 4 point pairs.
    #[error("homography needs at least 4 point pairs, got {got}")]
    InsufficientPoints { got: usize },

    /// The point configuration produced a matrix that cannot be trusted
    /// (non-finite entries or a vanishing determinant).
    #[error("degenerate point configuration, transform is unusable")]
    DegenerateTransform,

    /// A contour could not be resampled to the fixed vertex budget.
    #[error("contour with {vertices} distinct vertices cannot be resampled")]
    VertexBudget { vertices: usize },

    /// Reading or writing a calibration file failed. A missing file is not
    /// an error, it is the normal "no prior calibration" state.
    #[error("calibration store io at {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl CalibrationError {
    pub(crate) fn persistence(
        path: impl Into<PathBuf>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Persistence {
            path: path.into(),
            source: Box::new(source),
        }
    }
}
