pub mod error;
pub mod gate;
pub mod publisher;
pub mod samples;
pub mod state;
pub mod vision;

pub use error::{CoreError, VisionError};
pub use gate::EventGate;
pub use publisher::{LatestResult, ResultPublisher};
pub use samples::SampleSet;
pub use state::SessionStateCell;
pub use vision::{CalibrationSolver, CornerRefiner, PatternDetector};
