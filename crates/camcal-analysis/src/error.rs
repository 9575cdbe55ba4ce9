use camcal_core::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Analysis worker has stopped")]
    Stopped,
}
