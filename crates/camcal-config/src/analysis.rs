use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_poll_interval_ms() -> u64 {
    100
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct AnalysisConfig {
    /// How often the idle worker re-checks the stop flag
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl AnalysisConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}
