use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use camcal_analysis::AnalysisSettings;
use camcal_analysis::synthetic::{SyntheticDetector, SyntheticRefiner, SyntheticSolver};
use camcal_config::Config;
use camcal_flow::{CalibrationSession, Collaborators, FlowController};
use camcal_types::{Event, SessionState};
use camcal_upload::{UploadQueue, UploadSettings, UploadStatus};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::io::{frame_pump, status_watcher};
use crate::save::CalibrationSaver;

/// Owns every worker of one `camcal session` run
pub struct AppController {
    config: Config,
    session: Arc<CalibrationSession>,
    flow: FlowController,
    uploader: Option<Arc<UploadQueue>>,
    cancel_token: CancellationToken,
}

impl AppController {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let cancel_token = CancellationToken::new();

        let collaborators = Collaborators {
            detector: Arc::new(SyntheticDetector::new()),
            refiner: Arc::new(SyntheticRefiner),
            solver: Arc::new(SyntheticSolver),
        };
        let settings = AnalysisSettings {
            geometry: config.pattern.geometry(),
            width: config.video.width,
            height: config.video.height,
            poll_interval: config.analysis.poll_interval(),
        };
        let session = CalibrationSession::start(
            collaborators,
            settings,
            config.flow.calib_image_count_max as usize,
            &cancel_token,
        )
        .context("Failed to start analysis pipeline")?;

        let uploader = start_uploader(&config, &cancel_token)?;
        let flow = FlowController::new(config.flow.clone(), &cancel_token);

        Ok(Self {
            config,
            session: Arc::new(session),
            flow,
            uploader,
            cancel_token,
        })
    }

    /// Starts the flow thread with the save-and-queue completion handler
    pub fn start_flow(&self) -> anyhow::Result<()> {
        let saver = CalibrationSaver::new(&self.config, self.uploader.clone());
        self.flow
            .start(self.session.clone(), move |outcome| {
                if let Err(e) = saver.save(outcome) {
                    tracing::error!("Failed to save calibration: {e:#}");
                }
            })
            .context("Failed to start flow controller")?;
        Ok(())
    }

    pub fn spawn_tasks(self: &Arc<Self>) -> JoinSet<anyhow::Result<()>> {
        let mut tasks = JoinSet::new();

        // Frame source
        tasks.spawn(frame_pump(
            self.clone(),
            self.config.video.fps,
            self.cancel_token.child_token(),
        ));

        // Status logging
        let status_interval = Duration::from_millis(100);
        tasks.spawn(status_watcher(
            self.clone(),
            status_interval,
            self.cancel_token.child_token(),
        ));

        tasks
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &CalibrationSession {
        &self.session
    }

    pub fn post_event(&self, event: Event) -> bool {
        self.flow.post_event(event)
    }

    pub fn current_state(&self) -> SessionState {
        self.flow.current_state()
    }

    pub fn flow_status(&self) -> String {
        self.flow.status_text()
    }

    pub fn upload_status(&self, now: Instant) -> Option<UploadStatus> {
        self.uploader
            .as_ref()
            .map(|uploader| uploader.status_snapshot(now))
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }

    /// Cancels every task and joins every worker thread; blocking
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
        self.flow.stop();
        self.session.stop();
        if let Some(uploader) = &self.uploader {
            uploader.stop();
        }
        tracing::info!("All workers stopped");
    }
}

fn start_uploader(
    config: &Config,
    cancel_token: &CancellationToken,
) -> anyhow::Result<Option<Arc<UploadQueue>>> {
    if !config.upload.enabled {
        tracing::info!("Uploads disabled");
        return Ok(None);
    }
    if config.upload.endpoint_url.is_none() {
        tracing::warn!("No upload endpoint configured, calibrations will not be uploaded");
        return Ok(None);
    }

    let settings = UploadSettings::from_config(&config.upload)?;
    let queue = UploadQueue::start_http(settings, config.upload.request_timeout(), cancel_token)
        .with_context(|| {
            format!(
                "Failed to start uploader on {}",
                config.upload.queue_dir.display()
            )
        })?;

    // Anything left over from an earlier run
    queue.wake();
    Ok(Some(Arc::new(queue)))
}

/// Queue-only controller for `camcal drain`
pub fn drain_once(config: &Config, timeout: Duration) -> anyhow::Result<UploadStatus> {
    let cancel_token = CancellationToken::new();
    let settings = UploadSettings::from_config(&config.upload)
        .context("Draining needs upload.endpoint_url")?;
    let queue = UploadQueue::start_http(settings, config.upload.request_timeout(), &cancel_token)?;

    queue.wake();
    let deadline = Instant::now() + timeout;
    while queue.completed_cycles() == 0 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(50));
    }
    if queue.completed_cycles() == 0 {
        tracing::warn!("Drain cycle did not finish within {:?}", timeout);
    }

    let status = queue.status_snapshot(Instant::now());
    queue.stop();
    Ok(status)
}
