use std::env;

use serde::{Deserialize, Serialize};

fn default_width() -> u32 {
    640
}

fn default_height() -> u32 {
    480
}

fn default_fps() -> u32 {
    30
}

fn default_device_id() -> Option<String> {
    env::var("CAMERA_DEVICE_ID").ok()
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct VideoConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
    /// Identifier reported with uploaded calibrations
    #[serde(default = "default_device_id")]
    pub device_id: Option<String>,
    pub front_facing: bool,
    /// Lens focal length in metres, 0 when unknown
    pub focal_length: f32,
}

impl VideoConfig {
    pub fn new() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            device_id: default_device_id(),
            front_facing: false,
            focal_length: 0.0,
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self::new()
    }
}
