use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_queue_dir() -> PathBuf {
    env::var("UPLOAD_QUEUE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("queue"))
}

fn default_descriptor_extension() -> String {
    "upload".to_string()
}

fn default_endpoint_url() -> Option<String> {
    env::var("CALIB_UPLOAD_URL").ok()
}

fn default_probe_url() -> String {
    "http://www.google.com".to_string()
}

fn default_status_hide_after_secs() -> f32 {
    9.0
}

fn default_request_timeout_secs() -> u64 {
    30
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct UploadConfig {
    pub enabled: bool,
    #[serde(default = "default_queue_dir")]
    pub queue_dir: PathBuf,
    #[serde(default = "default_descriptor_extension")]
    pub descriptor_extension: String,
    /// Multipart POST target; uploads stay queued while unset
    #[serde(default = "default_endpoint_url")]
    pub endpoint_url: Option<String>,
    /// Always-up host used for the connectivity probe
    #[serde(default = "default_probe_url")]
    pub probe_url: String,
    #[serde(default = "default_status_hide_after_secs")]
    pub status_hide_after_secs: f32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl UploadConfig {
    pub fn new() -> Self {
        Self {
            enabled: true,
            queue_dir: default_queue_dir(),
            descriptor_extension: default_descriptor_extension(),
            endpoint_url: default_endpoint_url(),
            probe_url: default_probe_url(),
            status_hide_after_secs: default_status_hide_after_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }

    pub fn status_hide_after(&self) -> Duration {
        Duration::try_from_secs_f32(self.status_hide_after_secs.max(0.0))
            .unwrap_or(Duration::MAX)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self::new()
    }
}
