use std::sync::Arc;
use std::time::Duration;

use camcal_types::{CalibrationOutcome, Event, EventMask, SessionState};
use tokio_util::sync::CancellationToken;

use crate::controller::FlowShared;
use crate::session::CalibrationSession;

mod calibrating;
mod capturing;
mod done;
mod welcome;

pub(crate) type CompletionCallback = Box<dyn FnMut(&CalibrationOutcome) + Send>;

pub(crate) struct FlowContext {
    pub shared: Arc<FlowShared>,
    pub session: Arc<CalibrationSession>,
    pub on_complete: CompletionCallback,
    pub cancel: CancellationToken,
    pub poll_interval: Duration,
}

impl FlowContext {
    /// Opens the gate to `mask` and blocks for the next accepted event
    ///
    /// `None` means the thread has been asked to stop.
    pub fn wait_for(&self, mask: EventMask) -> Option<Event> {
        self.shared.gate.set_mask(mask);
        self.wait()
    }

    /// Blocks under the mask already in place
    pub fn wait(&self) -> Option<Event> {
        self.shared.gate.wait(&self.cancel, self.poll_interval)
    }

    pub fn set_status(&self, text: impl Into<String>) {
        self.shared.set_status(text);
    }
}

/// Resets everything observable when the flow thread exits, however it exits
struct FlowCleanup(Arc<FlowShared>);

impl Drop for FlowCleanup {
    fn drop(&mut self) {
        self.0.gate.reset();
        self.0.state.set(SessionState::NotStarted);
        // Last act
        self.0.set_status(String::new());
    }
}

/// Flow thread body
pub(crate) fn flow_loop(mut ctx: FlowContext) {
    tracing::info!("Start flow thread");
    let _cleanup = FlowCleanup(ctx.shared.clone());

    let mut state = SessionState::Welcome;
    loop {
        // Nothing posted for the previous state may leak into the next one
        ctx.shared.gate.set_mask(EventMask::NONE);
        ctx.shared.state.set(state);
        tracing::info!("Flow state: {}", state);

        let next = match state {
            SessionState::Welcome => welcome::handle_welcome(&ctx),
            SessionState::Capturing => capturing::handle_capturing(&ctx),
            SessionState::Calibrating => calibrating::handle_calibrating(&mut ctx),
            SessionState::Done => done::handle_done(&ctx),
            SessionState::NotStarted => None,
        };

        match next {
            Some(next) if !ctx.cancel.is_cancelled() => state = next,
            _ => break,
        }
    }

    tracing::info!("End flow thread");
}
