use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use camcal_analysis::{AnalysisError, AnalysisPipeline, AnalysisSettings};
use camcal_core::{
    CalibrationSolver, CornerRefiner, LatestResult, PatternDetector, SampleSet, VisionError,
};
use camcal_types::{CalibrationOutcome, Point2};
use tokio_util::sync::CancellationToken;

use crate::error::FlowError;

/// External vision routines a session delegates to
#[derive(Clone)]
pub struct Collaborators {
    pub detector: Arc<dyn PatternDetector>,
    pub refiner: Arc<dyn CornerRefiner>,
    pub solver: Arc<dyn CalibrationSolver>,
}

/// One analysis pipeline plus the samples accepted from it
pub struct CalibrationSession {
    pipeline: AnalysisPipeline,
    samples: Mutex<SampleSet>,
    refiner: Arc<dyn CornerRefiner>,
    solver: Arc<dyn CalibrationSolver>,
}

impl CalibrationSession {
    pub fn start(
        collaborators: Collaborators,
        settings: AnalysisSettings,
        sample_count_max: usize,
        cancel: &CancellationToken,
    ) -> Result<Self, FlowError> {
        let pipeline = AnalysisPipeline::start(collaborators.detector, settings, cancel)?;

        Ok(Self {
            pipeline,
            samples: Mutex::new(SampleSet::new(sample_count_max.max(1))),
            refiner: collaborators.refiner,
            solver: collaborators.solver,
        })
    }

    fn samples_lock(&self) -> MutexGuard<'_, SampleSet> {
        self.samples.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Per-frame tick from the frame source
    pub fn process_frame(&self, pixels: &[u8]) -> Result<bool, AnalysisError> {
        self.pipeline.process_frame(pixels)
    }

    /// Accepts the latest successful detection as a sample
    ///
    /// Returns false if the set is full or there is no detection to take.
    pub fn capture(&self) -> bool {
        let count_max = {
            let samples = self.samples_lock();
            if samples.is_full() {
                tracing::debug!("Sample set full, capture ignored");
                return false;
            }
            samples.max()
        };

        let (corners, frame) = {
            let latest = self.pipeline.fetch_latest_result();
            if !latest.found() {
                tracing::debug!("No pattern in latest result, capture ignored");
                return false;
            }
            let Some(frame) = latest.frame_handle() else {
                return false;
            };
            (latest.corners().to_vec(), frame)
        };

        let corners = match self.refiner.refine(&frame, &corners) {
            Ok(refined) => refined,
            Err(e) => {
                tracing::warn!("Corner refinement failed, keeping unrefined corners: {e}");
                corners
            }
        };
        tracing::debug!("Captured corners: {:?}", corners);

        let mut samples = self.samples_lock();
        if !samples.push(corners) {
            return false;
        }
        tracing::info!("Captured image {}/{}", samples.len(), count_max);
        true
    }

    /// Drops the most recent sample
    pub fn uncapture(&self) -> bool {
        let removed = self.samples_lock().undo_last();
        if removed {
            tracing::info!("Uncaptured last image");
        }
        removed
    }

    pub fn uncapture_all(&self) -> bool {
        let removed = self.samples_lock().clear();
        if removed {
            tracing::info!("Uncaptured all images");
        }
        removed
    }

    /// Runs the solver over a copy of the current samples
    pub fn calibrate(&self) -> Result<CalibrationOutcome, VisionError> {
        let samples = self.samples();
        let settings = self.pipeline.settings();
        self.solver.solve(
            &samples,
            &settings.geometry,
            settings.width,
            settings.height,
        )
    }

    pub fn sample_count(&self) -> usize {
        self.samples_lock().len()
    }

    pub fn sample_count_max(&self) -> usize {
        self.samples_lock().max()
    }

    pub fn samples(&self) -> Vec<Vec<Point2>> {
        self.samples_lock().as_slice().to_vec()
    }

    pub fn latest_result(&self) -> LatestResult<'_> {
        self.pipeline.fetch_latest_result()
    }

    pub fn pipeline(&self) -> &AnalysisPipeline {
        &self.pipeline
    }

    pub fn stop(&self) {
        self.pipeline.stop();
    }
}
