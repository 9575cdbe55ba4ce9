use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_calib_image_count_max() -> u32 {
    env::var("CALIB_IMAGE_COUNT_MAX")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(10)
}

fn default_event_poll_interval_ms() -> u64 {
    2000
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct FlowConfig {
    /// Number of accepted samples that triggers the calibration solve
    #[serde(default = "default_calib_image_count_max")]
    pub calib_image_count_max: u32,
    /// Upper bound on any single blocking wait before the stop flag is re-checked
    #[serde(default = "default_event_poll_interval_ms")]
    pub event_poll_interval_ms: u64,
}

impl FlowConfig {
    pub fn new() -> Self {
        Self {
            calib_image_count_max: default_calib_image_count_max(),
            event_poll_interval_ms: default_event_poll_interval_ms(),
        }
    }

    pub fn event_poll_interval(&self) -> Duration {
        Duration::from_millis(self.event_poll_interval_ms.max(1))
    }
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self::new()
    }
}
