use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use camcal_config::Config;
use camcal_types::CalibrationOutcome;
use camcal_upload::{DescriptorBuilder, UploadQueue};
use time::OffsetDateTime;
use time::macros::format_description;
use uuid::Uuid;

/// Stores each finished calibration locally and in the upload queue
pub struct CalibrationSaver {
    queue_dir: PathBuf,
    extension: String,
    queue_enabled: bool,
    device_id: Option<String>,
    front_facing: bool,
    focal_length: f32,
    save_dir: Option<PathBuf>,
    uploader: Option<Arc<UploadQueue>>,
}

impl CalibrationSaver {
    pub fn new(config: &Config, uploader: Option<Arc<UploadQueue>>) -> Self {
        Self {
            queue_dir: config.upload.queue_dir.clone(),
            extension: config.upload.descriptor_extension.clone(),
            queue_enabled: config.upload.enabled && config.upload.endpoint_url.is_some(),
            device_id: config.video.device_id.clone(),
            front_facing: config.video.front_facing,
            focal_length: config.video.focal_length,
            save_dir: config.save_dir.clone(),
            uploader,
        }
    }

    /// Completion handler body; returns the queued descriptor, if any
    pub fn save(&self, outcome: &CalibrationOutcome) -> anyhow::Result<Option<PathBuf>> {
        let payload = serde_json::to_string_pretty(&outcome.params)?;

        if let Some(save_dir) = &self.save_dir {
            let path = self.save_local(save_dir, &payload, outcome)?;
            tracing::info!("Saved calibration to {}", path.display());
        }

        let Some(device_id) = self.device_id.as_deref().filter(|_| self.queue_enabled) else {
            tracing::debug!("No upload endpoint or device id, calibration not queued");
            return Ok(None);
        };

        let descriptor = self.enqueue(device_id, &payload, outcome)?;
        if let Some(uploader) = &self.uploader {
            uploader.wake();
        }
        Ok(Some(descriptor))
    }

    fn focal_length_text(&self) -> String {
        format!("{:.3}", self.focal_length)
    }

    fn save_local(
        &self,
        save_dir: &Path,
        payload: &str,
        outcome: &CalibrationOutcome,
    ) -> anyhow::Result<PathBuf> {
        fs::create_dir_all(save_dir)
            .with_context(|| format!("Failed to create {}", save_dir.display()))?;

        let identifier: String = self
            .device_id
            .as_deref()
            .unwrap_or_default()
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        let mut name = format!(
            "camera_para-{identifier}-0-{}x{}",
            outcome.params.width, outcome.params.height
        );
        if self.focal_length != 0.0 {
            name.push('-');
            name.push_str(&self.focal_length_text());
        }
        name.push_str(".json");

        let path = save_dir.join(name);
        fs::write(&path, payload).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    fn enqueue(
        &self,
        device_id: &str,
        payload: &str,
        outcome: &CalibrationOutcome,
    ) -> anyhow::Result<PathBuf> {
        let now = OffsetDateTime::now_utc();
        let id = queue_id(now);
        let payload_path = self.queue_dir.join(format!("{id}-camera_para.json"));
        fs::write(&payload_path, payload)
            .with_context(|| format!("Failed to write {}", payload_path.display()))?;

        let timestamp =
            now.format(format_description!("[year]-[month]-[day] [hour]:[minute]:[second] +0000"))?;
        let params = &outcome.params;
        let error = &outcome.error;
        let builder = DescriptorBuilder::new()
            .field("version", if params.dist_function_version == 5 { 2 } else { 1 })
            .file(&payload_path)
            .field("timestamp", timestamp)
            .field("os_name", std::env::consts::OS)
            .field("os_arch", std::env::consts::ARCH)
            .field("device_id", device_id)
            .field("focal_length", self.focal_length_text())
            .field("camera_index", 0)
            .field("camera_face", if self.front_facing { "front" } else { "rear" })
            .field("camera_width", params.width)
            .field("camera_height", params.height)
            .field("err_min", error.min)
            .field("err_avg", error.avg)
            .field("err_max", error.max);

        match builder.write_to_queue(&self.queue_dir, &id, &self.extension) {
            Ok(descriptor) => {
                tracing::info!("Queued calibration {} for upload", id);
                Ok(descriptor)
            }
            Err(e) => {
                let _ = fs::remove_file(&payload_path);
                Err(e).context("Failed to queue calibration upload")
            }
        }
    }
}

/// Sortable queue identifier: UTC time first, random suffix to break ties
fn queue_id(now: OffsetDateTime) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{:04}{:02}{:02}_{:02}{:02}{:02}-{}",
        now.year(),
        now.month() as u8,
        now.day(),
        now.hour(),
        now.minute(),
        now.second(),
        &suffix[..8]
    )
}
