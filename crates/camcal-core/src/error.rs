#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Frame is {actual} bytes, expected {expected}")]
    FrameSize { expected: usize, actual: usize },

    #[error("Failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Failure reported by one of the external vision collaborators
#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    #[error("Detection failed: {0}")]
    Detection(String),

    #[error("Corner refinement failed: {0}")]
    Refinement(String),

    #[error("Calibration solve failed: {0}")]
    Solve(String),

    #[error("Not enough samples: have {have}, need at least {need}")]
    NotEnoughSamples { have: usize, need: usize },
}
