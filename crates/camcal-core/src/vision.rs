use camcal_types::{CalibrationOutcome, Detection, GrayFrame, PatternGeometry, Point2};

use crate::error::VisionError;

/// Locates calibration pattern features in a frame
///
/// May block for seconds; only ever called from the analysis worker thread.
pub trait PatternDetector: Send + Sync {
    fn detect(
        &self,
        frame: &GrayFrame,
        geometry: &PatternGeometry,
    ) -> Result<Detection, VisionError>;
}

/// Sub-pixel refinement applied to a detection at capture time
pub trait CornerRefiner: Send + Sync {
    fn refine(&self, frame: &GrayFrame, corners: &[Point2]) -> Result<Vec<Point2>, VisionError>;
}

/// Camera model solve over the accumulated samples
pub trait CalibrationSolver: Send + Sync {
    fn solve(
        &self,
        samples: &[Vec<Point2>],
        geometry: &PatternGeometry,
        width: u32,
        height: u32,
    ) -> Result<CalibrationOutcome, VisionError>;
}
