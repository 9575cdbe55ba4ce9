use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use camcal_core::{CoreError, LatestResult, PatternDetector, ResultPublisher};
use camcal_types::{AnalysisResult, GrayFrame, PatternGeometry};
use kanal::Sender;
use tokio_util::sync::CancellationToken;

use crate::error::AnalysisError;
use crate::worker::{WorkerContext, analysis_worker};

/// Fixed parameters of one pipeline instance
#[derive(Debug, Clone, Copy)]
pub struct AnalysisSettings {
    pub geometry: PatternGeometry,
    pub width: u32,
    pub height: u32,
    /// Bounded re-check interval of the worker's wait
    pub poll_interval: Duration,
}

/// State shared between the producer side and the worker thread
#[derive(Default)]
pub(crate) struct WorkerShared {
    /// Set on submission, cleared only when the result is collected
    pub busy: AtomicBool,
    pub completed: Mutex<Option<AnalysisResult>>,
}

/// Producer/consumer handoff between a frame source and a slow detector
///
/// At most one frame is in flight. Frames submitted while the worker is busy
/// are dropped.
pub struct AnalysisPipeline {
    settings: AnalysisSettings,
    frame_tx: Sender<GrayFrame>,
    shared: Arc<WorkerShared>,
    publisher: Arc<ResultPublisher>,
    cancel: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl AnalysisPipeline {
    pub fn start(
        detector: Arc<dyn PatternDetector>,
        settings: AnalysisSettings,
        cancel: &CancellationToken,
    ) -> Result<Self, AnalysisError> {
        let (frame_tx, frame_rx) = kanal::bounded(1);
        let shared = Arc::new(WorkerShared::default());
        let cancel = cancel.child_token();

        let ctx = WorkerContext {
            detector,
            geometry: settings.geometry,
            frames: frame_rx,
            shared: shared.clone(),
            cancel: cancel.clone(),
            poll_interval: settings.poll_interval,
        };
        let handle = std::thread::Builder::new()
            .name("camcal-analysis".into())
            .spawn(move || analysis_worker(ctx))
            .map_err(|source| CoreError::Spawn {
                name: "analysis",
                source,
            })?;

        tracing::debug!(
            "Analysis pipeline started for {}x{} frames, pattern {:?}",
            settings.width,
            settings.height,
            settings.geometry.pattern_type
        );

        Ok(Self {
            settings,
            frame_tx,
            shared,
            publisher: Arc::new(ResultPublisher::new()),
            cancel,
            handle: Mutex::new(Some(handle)),
        })
    }

    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    /// Hands a copy of `pixels` to the worker if it is idle
    ///
    /// Returns `Ok(false)` when the frame was dropped because a pass is still
    /// in flight or its result has not been collected yet.
    pub fn submit_frame(&self, pixels: &[u8]) -> Result<bool, AnalysisError> {
        if self.cancel.is_cancelled() {
            return Err(AnalysisError::Stopped);
        }

        let expected = GrayFrame::byte_len(self.settings.width, self.settings.height);
        if pixels.len() != expected {
            return Err(CoreError::FrameSize {
                expected,
                actual: pixels.len(),
            }
            .into());
        }

        if self
            .shared
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(false);
        }

        let frame = GrayFrame {
            width: self.settings.width,
            height: self.settings.height,
            data: pixels.to_vec(),
        };
        match self.frame_tx.try_send(frame) {
            Ok(true) => Ok(true),
            Ok(false) => {
                self.shared.busy.store(false, Ordering::Release);
                Ok(false)
            }
            Err(_) => {
                self.shared.busy.store(false, Ordering::Release);
                Err(AnalysisError::Stopped)
            }
        }
    }

    pub fn is_busy(&self) -> bool {
        self.shared.busy.load(Ordering::Acquire)
    }

    /// Moves a finished result into the publisher and frees the worker
    pub fn collect_if_done(&self) -> bool {
        let completed = self
            .shared
            .completed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match completed {
            Some(result) => {
                self.publisher.publish(result);
                self.shared.busy.store(false, Ordering::Release);
                true
            }
            None => false,
        }
    }

    /// One tick of the frame source: collect, then offer the new frame
    pub fn process_frame(&self, pixels: &[u8]) -> Result<bool, AnalysisError> {
        self.collect_if_done();
        self.submit_frame(pixels)
    }

    /// Shared view of the latest result; hold it only briefly
    pub fn fetch_latest_result(&self) -> LatestResult<'_> {
        self.publisher.fetch()
    }

    pub fn publisher(&self) -> &Arc<ResultPublisher> {
        &self.publisher
    }

    /// Cancels the worker and waits for it to exit
    pub fn stop(&self) {
        self.cancel.cancel();
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::error!("Analysis worker panicked");
            }
        }
    }
}

impl Drop for AnalysisPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Instant;

    use camcal_core::VisionError;
    use camcal_types::{Detection, PatternType, Point2};

    use super::*;

    const WIDTH: u32 = 16;
    const HEIGHT: u32 = 8;

    fn settings() -> AnalysisSettings {
        AnalysisSettings {
            geometry: PatternGeometry::default_for(PatternType::Chessboard),
            width: WIDTH,
            height: HEIGHT,
            poll_interval: Duration::from_millis(20),
        }
    }

    fn frame(value: u8) -> Vec<u8> {
        vec![value; GrayFrame::byte_len(WIDTH, HEIGHT)]
    }

    fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if done() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    /// Records the first pixel before and after a deliberate stall
    struct SlowDetector {
        delay: Duration,
        seen: Mutex<Vec<(u8, u8)>>,
    }

    impl PatternDetector for SlowDetector {
        fn detect(
            &self,
            frame: &GrayFrame,
            _geometry: &PatternGeometry,
        ) -> Result<Detection, VisionError> {
            let before = frame.data[0];
            thread::sleep(self.delay);
            let after = frame.data[frame.data.len() - 1];
            self.seen.lock().unwrap().push((before, after));
            Ok(Detection::found(vec![Point2::new(before as f32, 0.0)]))
        }
    }

    struct FailingDetector;

    impl PatternDetector for FailingDetector {
        fn detect(
            &self,
            _frame: &GrayFrame,
            _geometry: &PatternGeometry,
        ) -> Result<Detection, VisionError> {
            Err(VisionError::Detection("lens cap on".into()))
        }
    }

    #[test]
    fn busy_submission_never_reaches_worker() {
        let detector = Arc::new(SlowDetector {
            delay: Duration::from_millis(150),
            seen: Mutex::new(Vec::new()),
        });
        let cancel = CancellationToken::new();
        let pipeline = AnalysisPipeline::start(detector.clone(), settings(), &cancel).unwrap();

        assert!(pipeline.submit_frame(&frame(1)).unwrap());
        assert!(pipeline.is_busy());
        // Sentinel submitted mid-pass
        assert!(!pipeline.submit_frame(&frame(0xAA)).unwrap());

        assert!(wait_until(Duration::from_secs(2), || pipeline
            .collect_if_done()));
        assert_eq!(*detector.seen.lock().unwrap(), vec![(1, 1)]);

        let latest = pipeline.fetch_latest_result();
        assert!(latest.found());
        assert_eq!(latest.corners()[0].x, 1.0);
        assert_eq!(latest.frame().map(|f| f.pixel(0, 0)), Some(1));
    }

    #[test]
    fn worker_stays_busy_until_collected() {
        let detector = Arc::new(SlowDetector {
            delay: Duration::from_millis(1),
            seen: Mutex::new(Vec::new()),
        });
        let cancel = CancellationToken::new();
        let pipeline = AnalysisPipeline::start(detector, settings(), &cancel).unwrap();

        assert!(!pipeline.collect_if_done());
        assert!(pipeline.submit_frame(&frame(3)).unwrap());

        thread::sleep(Duration::from_millis(100));
        assert!(pipeline.is_busy());
        assert!(!pipeline.submit_frame(&frame(4)).unwrap());

        assert!(pipeline.collect_if_done());
        assert!(!pipeline.is_busy());
        assert!(!pipeline.collect_if_done());
        assert!(pipeline.process_frame(&frame(5)).unwrap());
    }

    #[test]
    fn detection_error_is_recorded_as_not_found() {
        let cancel = CancellationToken::new();
        let pipeline = AnalysisPipeline::start(Arc::new(FailingDetector), settings(), &cancel).unwrap();

        assert!(pipeline.submit_frame(&frame(7)).unwrap());
        assert!(wait_until(Duration::from_secs(2), || pipeline
            .collect_if_done()));

        let latest = pipeline.fetch_latest_result();
        assert!(!latest.found());
        assert!(latest.corners().is_empty());
        assert!(latest.frame().is_some());
    }

    #[test]
    fn wrong_frame_size_is_rejected() {
        let cancel = CancellationToken::new();
        let pipeline = AnalysisPipeline::start(Arc::new(FailingDetector), settings(), &cancel).unwrap();

        let err = pipeline.submit_frame(&[0u8; 3]).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::Core(CoreError::FrameSize { actual: 3, .. })
        ));
        assert!(!pipeline.is_busy());
    }

    #[test]
    fn stop_returns_promptly_and_releases_locks() {
        let detector = Arc::new(SlowDetector {
            delay: Duration::from_millis(200),
            seen: Mutex::new(Vec::new()),
        });
        let cancel = CancellationToken::new();
        let pipeline = AnalysisPipeline::start(detector, settings(), &cancel).unwrap();
        assert!(pipeline.submit_frame(&frame(2)).unwrap());

        let started = Instant::now();
        pipeline.stop();
        assert!(started.elapsed() < Duration::from_secs(1));

        drop(pipeline.shared.completed.lock().unwrap());
        pipeline.publisher().publish(AnalysisResult::from_detection(
            Detection::not_found(),
            GrayFrame::filled(WIDTH, HEIGHT, 0),
        ));
        pipeline.fetch_latest_result().release();

        assert!(matches!(
            pipeline.submit_frame(&frame(2)),
            Err(AnalysisError::Stopped)
        ));
        // Idempotent
        pipeline.stop();
    }

    #[test]
    fn parent_cancellation_stops_idle_worker() {
        let cancel = CancellationToken::new();
        let pipeline = AnalysisPipeline::start(Arc::new(FailingDetector), settings(), &cancel).unwrap();

        cancel.cancel();
        let started = Instant::now();
        pipeline.stop();
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
