mod error;
mod pipeline;
pub mod synthetic;
mod worker;

pub use error::AnalysisError;
pub use pipeline::{AnalysisPipeline, AnalysisSettings};
