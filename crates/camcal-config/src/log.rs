use std::env;

use serde::{Deserialize, Serialize};

fn default_level() -> String {
    env::var("CAMCAL_LOG").unwrap_or_else(|_| "info".to_string())
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset
    #[serde(default = "default_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl LogConfig {
    pub fn new() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new()
    }
}
