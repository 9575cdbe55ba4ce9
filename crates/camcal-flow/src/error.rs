use camcal_analysis::AnalysisError;
use camcal_core::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("Flow controller is already running")]
    AlreadyStarted,

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}
