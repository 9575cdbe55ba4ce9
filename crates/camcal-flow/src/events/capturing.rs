use camcal_types::{Event, EventMask, SessionState};

use super::FlowContext;

/// Accumulates samples until the set is full
///
/// A cancel with no capture since the previous cancel abandons the run.
pub(crate) fn handle_capturing(ctx: &FlowContext) -> Option<SessionState> {
    let session = &ctx.session;
    let mut captured_since_cancel = false;
    ctx.shared.gate.set_mask(EventMask::PRIMARY | EventMask::CANCEL);

    while session.sample_count() < session.sample_count_max() {
        ctx.set_status(format!(
            "Capturing image {}/{}",
            session.sample_count() + 1,
            session.sample_count_max()
        ));

        match ctx.wait()? {
            Event::PrimaryAction => {
                if session.capture() {
                    captured_since_cancel = true;
                }
            }
            Event::CancelAction => {
                if !captured_since_cancel {
                    session.uncapture_all();
                    ctx.set_status(String::new());
                    tracing::info!("Calibration canceled");
                    return Some(SessionState::Welcome);
                }
                session.uncapture();
                captured_since_cancel = false;
            }
            _ => {}
        }
    }

    ctx.set_status(String::new());
    Some(SessionState::Calibrating)
}
