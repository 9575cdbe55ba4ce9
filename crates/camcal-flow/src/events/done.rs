use camcal_types::{EventMask, SessionState};

use super::FlowContext;

/// Shows the result until acknowledged
pub(crate) fn handle_done(ctx: &FlowContext) -> Option<SessionState> {
    ctx.wait_for(EventMask::PRIMARY)?;
    ctx.set_status(String::new());
    Some(SessionState::Welcome)
}
