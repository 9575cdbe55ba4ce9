use camcal_types::{Event, EventMask, SessionState};

use super::FlowContext;

/// Waits for the user to begin a run; modal requests open and close an overlay in place
pub(crate) fn handle_welcome(ctx: &FlowContext) -> Option<SessionState> {
    // Every run starts from an empty sample set, including one after a restart
    ctx.session.uncapture_all();

    loop {
        tracing::info!("Press 'space' to begin a calibration run, 'p' for settings and help");

        match ctx.wait_for(EventMask::PRIMARY | EventMask::MODAL)? {
            Event::ModalRequested => {
                tracing::debug!("Modal overlay open");
                ctx.wait_for(EventMask::MODAL)?;
                tracing::debug!("Modal overlay closed");
            }
            Event::PrimaryAction => return Some(SessionState::Capturing),
            _ => {}
        }
    }
}
