use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use camcal_config::upload::UploadConfig;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::client::{HttpTransport, UploadTransport};
use crate::descriptor::{create_queue_dir, next_descriptor, parse_descriptor};
use crate::error::{TransportError, UploadError};
use crate::status::{StatusBoard, UploadStatus};

#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub queue_dir: PathBuf,
    pub descriptor_extension: String,
    pub endpoint_url: String,
    pub probe_url: String,
    pub status_hide_after: Duration,
}

impl UploadSettings {
    pub fn from_config(config: &UploadConfig) -> Result<Self, UploadError> {
        let endpoint_url = config
            .endpoint_url
            .clone()
            .ok_or(UploadError::MissingEndpoint)?;

        Ok(Self {
            queue_dir: config.queue_dir.clone(),
            descriptor_extension: config.descriptor_extension.clone(),
            endpoint_url,
            probe_url: config.probe_url.clone(),
            status_hide_after: config.status_hide_after(),
        })
    }

    fn validate(&self) -> Result<(), UploadError> {
        if self.endpoint_url.trim().is_empty() {
            return Err(UploadError::MissingEndpoint);
        }
        if self.descriptor_extension.trim().is_empty() {
            return Err(UploadError::MissingExtension);
        }
        Ok(())
    }
}

/// Why a drain cycle stopped early
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleFailure {
    NoNetwork,
    Network,
    Server(u16),
    Internal,
}

impl CycleFailure {
    pub fn message(self) -> &'static str {
        match self {
            CycleFailure::NoNetwork => "No Internet access. Uploads postponed.",
            CycleFailure::Network => "Network error while uploading. Uploads postponed.",
            CycleFailure::Server(_) => "Server error while uploading. Uploads postponed.",
            CycleFailure::Internal => "Internal error while uploading. Uploads postponed.",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub uploaded: usize,
    pub failure: Option<CycleFailure>,
}

impl CycleReport {
    /// Status line for the cycle, `None` when there is nothing to report
    pub fn summary(&self) -> Option<String> {
        match (self.uploaded, self.failure) {
            (0, None) => None,
            (0, Some(failure)) => Some(failure.message().to_string()),
            (1, _) => Some("Uploaded 1 file".to_string()),
            (n, _) => Some(format!("Uploaded {n} files")),
        }
    }
}

/// One pass over the queue, oldest descriptor name first
///
/// Stops at the first failure. Items uploaded before it stay deleted; the
/// failing item and everything after it stay queued.
pub async fn drain_queue(
    settings: &UploadSettings,
    transport: &dyn UploadTransport,
    status: &StatusBoard,
) -> CycleReport {
    let mut report = CycleReport::default();
    let mut probed = false;

    loop {
        let descriptor =
            match next_descriptor(&settings.queue_dir, &settings.descriptor_extension) {
                Ok(Some(path)) => path,
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(
                        "Error opening upload queue dir {}: {e}",
                        settings.queue_dir.display()
                    );
                    report.failure = Some(CycleFailure::Internal);
                    break;
                }
            };
        status.progress(report.uploaded);

        let contents = match tokio::fs::read_to_string(&descriptor).await {
            Ok(contents) => contents,
            Err(e) => {
                tracing::error!(
                    "Error opening upload queue file {}: {e}",
                    descriptor.display()
                );
                report.failure = Some(CycleFailure::Internal);
                break;
            }
        };

        if !probed {
            if let Err(e) = transport.probe(&settings.probe_url).await {
                tracing::debug!("Connectivity probe failed: {e}");
                report.failure = Some(CycleFailure::NoNetwork);
                break;
            }
            probed = true;
        }

        let form = parse_descriptor(&contents);
        if form.is_empty() {
            tracing::error!(
                "No form fields in upload queue file {}",
                descriptor.display()
            );
            report.failure = Some(CycleFailure::Internal);
            break;
        }

        match transport.submit(&settings.endpoint_url, &form).await {
            Ok(200) => {}
            Ok(code) => {
                tracing::error!("Upload failed: server returned response {code}");
                report.failure = Some(CycleFailure::Server(code));
                break;
            }
            Err(TransportError::Network(e)) => {
                tracing::error!("Upload request failed: {e}");
                report.failure = Some(CycleFailure::Network);
                break;
            }
            Err(e) => {
                tracing::error!("Upload of {} failed: {e}", descriptor.display());
                report.failure = Some(CycleFailure::Internal);
                break;
            }
        }
        report.uploaded += 1;

        // A descriptor that cannot be removed would be uploaded again forever
        if let Err(e) = tokio::fs::remove_file(&descriptor).await {
            tracing::error!(
                "Error removing upload queue file {} after upload: {e}",
                descriptor.display()
            );
            report.failure = Some(CycleFailure::Internal);
            break;
        }
        if let Some(payload) = form.file_path() {
            if let Err(e) = tokio::fs::remove_file(payload).await {
                tracing::error!(
                    "Error removing file {} after upload: {e}",
                    payload.display()
                );
            }
        }
        tracing::info!("Uploaded {}", descriptor.display());
    }

    report
}

#[derive(Default)]
struct UploadShared {
    status: StatusBoard,
    wake: Notify,
    completed_cycles: AtomicU64,
}

struct WorkerContext {
    settings: UploadSettings,
    transport: Arc<dyn UploadTransport>,
    shared: Arc<UploadShared>,
    cancel: CancellationToken,
}

/// Background drainer of the upload queue, idle until woken
pub struct UploadQueue {
    shared: Arc<UploadShared>,
    cancel: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl UploadQueue {
    pub fn start(
        settings: UploadSettings,
        transport: Arc<dyn UploadTransport>,
        cancel: &CancellationToken,
    ) -> Result<Self, UploadError> {
        settings.validate()?;
        create_queue_dir(&settings.queue_dir)?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(UploadError::Runtime)?;

        let shared = Arc::new(UploadShared::default());
        let cancel = cancel.child_token();
        let ctx = WorkerContext {
            settings,
            transport,
            shared: shared.clone(),
            cancel: cancel.clone(),
        };

        let handle = std::thread::Builder::new()
            .name("camcal-upload".into())
            .spawn(move || runtime.block_on(upload_worker(ctx)))
            .map_err(UploadError::Spawn)?;

        Ok(Self {
            shared,
            cancel,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Starts the worker with the reqwest transport
    pub fn start_http(
        settings: UploadSettings,
        request_timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Self, UploadError> {
        let transport = HttpTransport::new(request_timeout)?;
        Self::start(settings, Arc::new(transport), cancel)
    }

    /// Requests a drain cycle; wakes during a running cycle collapse into one more
    pub fn wake(&self) {
        self.shared.wake.notify_one();
    }

    pub fn status_snapshot(&self, now: Instant) -> UploadStatus {
        self.shared.status.snapshot(now)
    }

    pub fn completed_cycles(&self) -> u64 {
        self.shared.completed_cycles.load(Ordering::Acquire)
    }

    pub fn stop(&self) {
        self.cancel.cancel();
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::error!("Upload worker panicked");
            }
        }
    }
}

impl Drop for UploadQueue {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn upload_worker(ctx: WorkerContext) {
    tracing::info!("Start upload worker");

    loop {
        tokio::select! {
            _ = ctx.cancel.cancelled() => break,
            _ = ctx.shared.wake.notified() => {}
        }

        tracing::debug!("Upload cycle started");
        ctx.shared.status.begin_cycle();

        let report = tokio::select! {
            _ = ctx.cancel.cancelled() => {
                ctx.shared.status.abort_cycle();
                tracing::debug!("Upload cycle interrupted by stop");
                break;
            }
            report = drain_queue(&ctx.settings, ctx.transport.as_ref(), &ctx.shared.status) => report,
        };

        ctx.shared.status.finish_cycle(
            report.summary(),
            Instant::now(),
            ctx.settings.status_hide_after,
        );
        ctx.shared.completed_cycles.fetch_add(1, Ordering::AcqRel);
        tracing::info!(
            "Upload cycle done: uploaded={} failure={:?}",
            report.uploaded,
            report.failure
        );
    }

    tracing::info!("End upload worker");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    use camcal_types::UploadStatusCode;
    use tempfile::TempDir;

    use super::*;
    use crate::descriptor::{DescriptorBuilder, UploadForm};

    struct StubTransport {
        probe_ok: bool,
        status: u16,
        delay: Duration,
        submitted: Mutex<Vec<UploadForm>>,
        probes: AtomicUsize,
    }

    impl StubTransport {
        fn new(probe_ok: bool, status: u16) -> Self {
            Self {
                probe_ok,
                status,
                delay: Duration::ZERO,
                submitted: Mutex::new(Vec::new()),
                probes: AtomicUsize::new(0),
            }
        }

        fn slow(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::new(true, 200)
            }
        }

        fn submit_count(&self) -> usize {
            self.submitted.lock().unwrap().len()
        }
    }

    #[async_trait::async_trait]
    impl UploadTransport for StubTransport {
        async fn probe(&self, _url: &str) -> Result<(), TransportError> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            if self.probe_ok {
                Ok(())
            } else {
                Err(TransportError::Attachment {
                    path: PathBuf::from("probe"),
                    source: std::io::Error::other("unreachable"),
                })
            }
        }

        async fn submit(&self, _url: &str, form: &UploadForm) -> Result<u16, TransportError> {
            tokio::time::sleep(self.delay).await;
            self.submitted.lock().unwrap().push(form.clone());
            Ok(self.status)
        }
    }

    fn settings(dir: &Path) -> UploadSettings {
        UploadSettings {
            queue_dir: dir.to_path_buf(),
            descriptor_extension: "upload".into(),
            endpoint_url: "http://upload.invalid/".into(),
            probe_url: "http://probe.invalid/".into(),
            status_hide_after: Duration::from_secs(2),
        }
    }

    fn enqueue(dir: &Path, stem: &str) -> PathBuf {
        let payload = dir.join(format!("{stem}-camera_para.json"));
        fs::write(&payload, b"{}").unwrap();
        DescriptorBuilder::new()
            .field("version", 1)
            .file(&payload)
            .field("device_id", "test-cam")
            .write_to_queue(dir, stem, "upload")
            .unwrap()
    }

    fn wait_until(mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(3);
        while Instant::now() < deadline {
            if done() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[tokio::test]
    async fn malformed_descriptor_stays_while_valid_ones_upload() {
        let dir = TempDir::new().unwrap();
        let valid: Vec<_> = ["a1", "a2", "a3"]
            .iter()
            .map(|stem| enqueue(dir.path(), stem))
            .collect();
        let malformed = dir.path().join("z9.upload");
        fs::write(&malformed, "# nothing here\nno fields\n").unwrap();

        let transport = StubTransport::new(true, 200);
        let status = StatusBoard::new();
        let report = drain_queue(&settings(dir.path()), &transport, &status).await;

        assert_eq!(report.uploaded, 3);
        assert_eq!(report.failure, Some(CycleFailure::Internal));
        assert_eq!(report.summary().as_deref(), Some("Uploaded 3 files"));
        assert_eq!(transport.submit_count(), 3);
        assert_eq!(transport.probes.load(Ordering::SeqCst), 1);

        for descriptor in valid {
            assert!(!descriptor.exists());
        }
        assert!(malformed.exists());
        let remaining: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(remaining.len(), 1);
    }

    #[tokio::test]
    async fn probe_failure_postpones_everything() {
        let dir = TempDir::new().unwrap();
        let queued = [enqueue(dir.path(), "a1"), enqueue(dir.path(), "a2")];

        let transport = StubTransport::new(false, 200);
        let report = drain_queue(&settings(dir.path()), &transport, &StatusBoard::new()).await;

        assert_eq!(report.failure, Some(CycleFailure::NoNetwork));
        assert_eq!(
            report.summary().as_deref(),
            Some("No Internet access. Uploads postponed.")
        );
        assert_eq!(transport.submit_count(), 0);
        assert!(queued.iter().all(|path| path.exists()));
    }

    #[tokio::test]
    async fn server_error_keeps_item_queued() {
        let dir = TempDir::new().unwrap();
        let queued = enqueue(dir.path(), "a1");

        let transport = StubTransport::new(true, 500);
        let report = drain_queue(&settings(dir.path()), &transport, &StatusBoard::new()).await;

        assert_eq!(report.uploaded, 0);
        assert_eq!(report.failure, Some(CycleFailure::Server(500)));
        assert_eq!(
            report.summary().as_deref(),
            Some("Server error while uploading. Uploads postponed.")
        );
        assert!(queued.exists());
        assert!(dir.path().join("a1-camera_para.json").exists());
    }

    #[tokio::test]
    async fn empty_queue_reports_nothing() {
        let dir = TempDir::new().unwrap();
        let transport = StubTransport::new(true, 200);
        let report = drain_queue(&settings(dir.path()), &transport, &StatusBoard::new()).await;

        assert_eq!(report, CycleReport::default());
        assert_eq!(report.summary(), None);
        assert_eq!(transport.probes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn single_upload_summary_is_singular() {
        let report = CycleReport {
            uploaded: 1,
            failure: Some(CycleFailure::Network),
        };
        assert_eq!(report.summary().as_deref(), Some("Uploaded 1 file"));
    }

    #[test]
    fn start_validates_settings() {
        let dir = TempDir::new().unwrap();
        let cancel = CancellationToken::new();
        let transport: Arc<dyn UploadTransport> = Arc::new(StubTransport::new(true, 200));

        let mut no_endpoint = settings(dir.path());
        no_endpoint.endpoint_url.clear();
        assert!(matches!(
            UploadQueue::start(no_endpoint, transport.clone(), &cancel),
            Err(UploadError::MissingEndpoint)
        ));

        let mut no_extension = settings(dir.path());
        no_extension.descriptor_extension = " ".into();
        assert!(matches!(
            UploadQueue::start(no_extension, transport.clone(), &cancel),
            Err(UploadError::MissingExtension)
        ));

        let file = dir.path().join("not-a-dir");
        fs::write(&file, "").unwrap();
        let mut bad_dir = settings(dir.path());
        bad_dir.queue_dir = file;
        assert!(matches!(
            UploadQueue::start(bad_dir, transport, &cancel),
            Err(UploadError::NotADirectory(_))
        ));
    }

    #[test]
    fn wakes_during_a_cycle_coalesce() {
        let dir = TempDir::new().unwrap();
        enqueue(dir.path(), "a1");
        let cancel = CancellationToken::new();
        let transport = Arc::new(StubTransport::slow(Duration::from_millis(200)));
        let queue = UploadQueue::start(settings(dir.path()), transport.clone(), &cancel).unwrap();

        assert_eq!(queue.completed_cycles(), 0);
        queue.wake();
        assert!(wait_until(|| queue.status_snapshot(Instant::now()).code
            == UploadStatusCode::InProgress));
        for _ in 0..5 {
            queue.wake();
        }

        assert!(wait_until(|| queue.completed_cycles() == 2));
        thread::sleep(Duration::from_millis(100));
        assert_eq!(queue.completed_cycles(), 2);
        assert_eq!(transport.submit_count(), 1);
    }

    #[test]
    fn worker_summary_expires_on_read() {
        let dir = TempDir::new().unwrap();
        enqueue(dir.path(), "a1");
        let cancel = CancellationToken::new();
        let queue = UploadQueue::start(
            settings(dir.path()),
            Arc::new(StubTransport::new(true, 200)),
            &cancel,
        )
        .unwrap();

        queue.wake();
        assert!(wait_until(|| queue.completed_cycles() == 1));
        let finished = Instant::now();

        let shown = queue.status_snapshot(finished + Duration::from_secs(1));
        assert_eq!(shown.message, "Uploaded 1 file");
        assert_eq!(shown.code, UploadStatusCode::Completed);

        let later = finished + Duration::from_secs(3);
        assert_eq!(queue.status_snapshot(later).code, UploadStatusCode::Idle);
        assert!(queue.status_snapshot(later).message.is_empty());
    }

    #[test]
    fn stop_interrupts_idle_and_busy_worker() {
        let dir = TempDir::new().unwrap();
        let cancel = CancellationToken::new();
        let idle = UploadQueue::start(
            settings(dir.path()),
            Arc::new(StubTransport::new(true, 200)),
            &cancel,
        )
        .unwrap();
        let started = Instant::now();
        idle.stop();
        assert!(started.elapsed() < Duration::from_secs(1));
        idle.status_snapshot(Instant::now());

        enqueue(dir.path(), "a1");
        let busy = UploadQueue::start(
            settings(dir.path()),
            Arc::new(StubTransport::slow(Duration::from_secs(30))),
            &cancel,
        )
        .unwrap();
        busy.wake();
        assert!(wait_until(|| busy.status_snapshot(Instant::now()).code
            == UploadStatusCode::InProgress));

        let started = Instant::now();
        busy.stop();
        assert!(started.elapsed() < Duration::from_secs(1));
        // Interrupted upload is still queued and nothing claims to be running
        assert!(dir.path().join("a1.upload").exists());
        let status = busy.status_snapshot(Instant::now() + Duration::from_secs(3600));
        assert_eq!(status.code, UploadStatusCode::Idle);
        assert!(status.message.is_empty());
        busy.stop();
    }
}
