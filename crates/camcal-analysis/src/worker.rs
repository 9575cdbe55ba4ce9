use std::sync::{Arc, PoisonError};
use std::time::{Duration, Instant};

use camcal_core::PatternDetector;
use camcal_types::{AnalysisResult, Detection, GrayFrame, PatternGeometry};
use kanal::{ReceiveErrorTimeout, Receiver};
use tokio_util::sync::CancellationToken;

use crate::pipeline::WorkerShared;

pub(crate) struct WorkerContext {
    pub detector: Arc<dyn PatternDetector>,
    pub geometry: PatternGeometry,
    pub frames: Receiver<GrayFrame>,
    pub shared: Arc<WorkerShared>,
    pub cancel: CancellationToken,
    pub poll_interval: Duration,
}

/// Analysis thread body: one detection pass per received frame
pub(crate) fn analysis_worker(ctx: WorkerContext) {
    tracing::info!("Start analysis worker");

    while !ctx.cancel.is_cancelled() {
        let frame = match ctx.frames.recv_timeout(ctx.poll_interval) {
            Ok(frame) => frame,
            Err(ReceiveErrorTimeout::Timeout) => continue,
            Err(e) => {
                tracing::debug!("Frame channel closed: {e}");
                break;
            }
        };

        // No lock is held while the detector runs
        let started = Instant::now();
        let detection = match ctx.detector.detect(&frame, &ctx.geometry) {
            Ok(detection) => detection,
            Err(e) => {
                tracing::warn!("Detection pass failed, recording as not found: {e}");
                Detection::not_found()
            }
        };
        tracing::trace!(
            "Detection pass took {:?}, found={}, corners={}",
            started.elapsed(),
            detection.found,
            detection.corners.len()
        );

        let result = AnalysisResult::from_detection(detection, frame);
        *ctx.shared
            .completed
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(result);
    }

    tracing::info!("End analysis worker");
}
