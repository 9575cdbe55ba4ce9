use camcal_types::SessionState;

use super::FlowContext;

pub(crate) fn handle_calibrating(ctx: &mut FlowContext) -> Option<SessionState> {
    ctx.set_status("Calculating camera parameters...");
    tracing::info!("Calculating camera parameters...");

    match ctx.session.calibrate() {
        Ok(outcome) => {
            (ctx.on_complete)(&outcome);
            let error = outcome.error;
            tracing::info!(
                "Camera parameters calculated (error min={:.3}, avg={:.3}, max={:.3})",
                error.min,
                error.avg,
                error.max
            );
            ctx.set_status(format!(
                "Camera parameters calculated (error min={:.3}, avg={:.3}, max={:.3})",
                error.min, error.avg, error.max
            ));
        }
        Err(e) => {
            tracing::error!("Calibration failed: {e}");
            ctx.set_status(format!("Calibration failed: {e}"));
        }
    }

    // Ready for the next run
    ctx.session.uncapture_all();
    Some(SessionState::Done)
}
