use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use camcal_config::flow::FlowConfig;
use camcal_core::{CoreError, EventGate, SessionStateCell};
use camcal_types::{CalibrationOutcome, Event, SessionState};
use tokio_util::sync::CancellationToken;

use crate::error::FlowError;
use crate::events::{FlowContext, flow_loop};
use crate::session::CalibrationSession;

/// State the flow thread shares with its callers
#[derive(Default)]
pub(crate) struct FlowShared {
    pub gate: EventGate,
    pub state: SessionStateCell,
    pub status: Mutex<String>,
}

impl FlowShared {
    pub fn set_status(&self, text: impl Into<String>) {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner) = text.into();
    }
}

struct FlowRun {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns the capture session state machine and its thread
pub struct FlowController {
    config: FlowConfig,
    shared: Arc<FlowShared>,
    cancel_token: CancellationToken,
    run: Mutex<Option<FlowRun>>,
}

impl FlowController {
    pub fn new(config: FlowConfig, cancel_token: &CancellationToken) -> Self {
        Self {
            config,
            shared: Arc::new(FlowShared::default()),
            cancel_token: cancel_token.child_token(),
            run: Mutex::new(None),
        }
    }

    /// Spawns the flow thread
    ///
    /// `on_complete` runs on the flow thread once per finished calibration.
    pub fn start<F>(&self, session: Arc<CalibrationSession>, on_complete: F) -> Result<(), FlowError>
    where
        F: FnMut(&CalibrationOutcome) + Send + 'static,
    {
        let mut run = self.run.lock().unwrap_or_else(PoisonError::into_inner);
        if run.is_some() {
            return Err(FlowError::AlreadyStarted);
        }

        let cancel = self.cancel_token.child_token();
        let ctx = FlowContext {
            shared: self.shared.clone(),
            session,
            on_complete: Box::new(on_complete),
            cancel: cancel.clone(),
            poll_interval: self.config.event_poll_interval(),
        };

        let handle = std::thread::Builder::new()
            .name("camcal-flow".into())
            .spawn(move || flow_loop(ctx))
            .map_err(|source| CoreError::Spawn {
                name: "flow",
                source,
            })?;

        *run = Some(FlowRun { cancel, handle });
        Ok(())
    }

    /// Cancels the flow thread and waits for it to exit; no-op when not running
    pub fn stop(&self) {
        let run = self.run.lock().unwrap_or_else(PoisonError::into_inner).take();
        let Some(run) = run else {
            return;
        };

        run.cancel.cancel();
        self.shared.gate.interrupt();
        if run.handle.join().is_err() {
            tracing::error!("Flow thread panicked");
        }
    }

    pub fn current_state(&self) -> SessionState {
        self.shared.state.get()
    }

    /// Returns whether the event was accepted; masked events are dropped
    pub fn post_event(&self, event: Event) -> bool {
        let accepted = self.shared.gate.post(event);
        tracing::debug!("Event {:?} accepted={}", event, accepted);
        accepted
    }

    pub fn status_text(&self) -> String {
        self.shared
            .status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_running(&self) -> bool {
        self.run
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl Drop for FlowController {
    fn drop(&mut self) {
        self.stop();
    }
}
