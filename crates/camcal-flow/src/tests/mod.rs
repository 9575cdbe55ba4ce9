use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use camcal_analysis::AnalysisSettings;
use camcal_analysis::synthetic::{SyntheticDetector, SyntheticFrameSource, SyntheticSolver};
use camcal_config::flow::FlowConfig;
use camcal_core::{CalibrationSolver, CornerRefiner, VisionError};
use camcal_types::{
    CalibrationOutcome, Event, GrayFrame, PatternGeometry, PatternType, Point2,
};
use tokio_util::sync::CancellationToken;

use crate::{CalibrationSession, Collaborators, FlowController};


const WIDTH: u32 = 64;
const HEIGHT: u32 = 48;
const DEADLINE: Duration = Duration::from_secs(3);

pub(crate) fn wait_until(mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + DEADLINE;
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

/// Tags every refined sample with its capture index so order is observable
#[derive(Default)]
pub(crate) struct TaggingRefiner {
    next: AtomicUsize,
}

impl CornerRefiner for TaggingRefiner {
    fn refine(&self, _frame: &GrayFrame, _corners: &[Point2]) -> Result<Vec<Point2>, VisionError> {
        let tag = self.next.fetch_add(1, Ordering::SeqCst);
        Ok(vec![Point2::new(tag as f32, 0.0)])
    }
}

/// Counts solves and optionally stalls inside one
pub(crate) struct RecordingSolver {
    pub delay: Duration,
    pub calls: AtomicUsize,
    pub sample_counts: Mutex<Vec<usize>>,
}

impl RecordingSolver {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            calls: AtomicUsize::new(0),
            sample_counts: Mutex::new(Vec::new()),
        }
    }
}

impl CalibrationSolver for RecordingSolver {
    fn solve(
        &self,
        samples: &[Vec<Point2>],
        geometry: &PatternGeometry,
        width: u32,
        height: u32,
    ) -> Result<CalibrationOutcome, VisionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.sample_counts.lock().unwrap().push(samples.len());
        thread::sleep(self.delay);
        SyntheticSolver.solve(samples, geometry, width, height)
    }
}

pub(crate) struct Harness {
    pub cancel: CancellationToken,
    pub controller: FlowController,
    pub session: Arc<CalibrationSession>,
    pub solver: Arc<RecordingSolver>,
    pub completions: Arc<Mutex<Vec<CalibrationOutcome>>>,
}

impl Harness {
    pub fn new(sample_count_max: usize, solve_delay: Duration) -> Self {
        // Long enough that a prompt stop proves the interrupt path
        Self::with_poll_interval(sample_count_max, solve_delay, 5_000)
    }

    pub fn with_poll_interval(
        sample_count_max: usize,
        solve_delay: Duration,
        event_poll_interval_ms: u64,
    ) -> Self {
        let cancel = CancellationToken::new();
        let solver = Arc::new(RecordingSolver::new(solve_delay));
        let collaborators = Collaborators {
            detector: Arc::new(SyntheticDetector::new()),
            refiner: Arc::new(TaggingRefiner::default()),
            solver: solver.clone(),
        };
        let settings = AnalysisSettings {
            geometry: PatternGeometry::default_for(PatternType::Chessboard),
            width: WIDTH,
            height: HEIGHT,
            poll_interval: Duration::from_millis(10),
        };
        let session = Arc::new(
            CalibrationSession::start(collaborators, settings, sample_count_max, &cancel).unwrap(),
        );
        let config = FlowConfig {
            calib_image_count_max: sample_count_max as u32,
            event_poll_interval_ms,
        };
        let controller = FlowController::new(config, &cancel);

        Self {
            cancel,
            controller,
            session,
            solver,
            completions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn start(&self) {
        let completions = self.completions.clone();
        self.controller
            .start(self.session.clone(), move |outcome| {
                completions.lock().unwrap().push(outcome.clone());
            })
            .unwrap();
    }

    /// Feeds board frames until the pipeline publishes a detection
    pub fn prime_detection(&self) {
        let frame = SyntheticFrameSource::new(WIDTH, HEIGHT).next_frame();
        let found = wait_until(|| {
            self.session.process_frame(&frame.data).unwrap();
            self.session.latest_result().found()
        });
        assert!(found, "pipeline never published a detection");
    }

    /// Retries until the flow thread has opened its mask to `event`
    pub fn post(&self, event: Event) {
        assert!(
            wait_until(|| self.controller.post_event(event)),
            "{event:?} never accepted"
        );
    }

    pub fn capture_and_wait(&self) {
        let before = self.session.sample_count();
        self.post(Event::PrimaryAction);
        assert!(wait_until(|| self.session.sample_count() == before + 1));
    }

    pub fn sample_tags(&self) -> Vec<f32> {
        self.session
            .samples()
            .iter()
            .map(|corners| corners[0].x)
            .collect()
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.controller.stop();
        self.session.stop();
    }
}
