use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use self::analysis::AnalysisConfig;
use self::flow::FlowConfig;
use self::log::LogConfig;
use self::pattern::PatternConfig;
use self::upload::UploadConfig;
use self::video::VideoConfig;

pub mod analysis;
pub mod flow;
pub mod log;
pub mod pattern;
pub mod upload;
pub mod video;

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct Config {
    pub flow: FlowConfig,
    pub pattern: PatternConfig,
    pub video: VideoConfig,
    pub analysis: AnalysisConfig,
    pub upload: UploadConfig,
    pub log: LogConfig,

    /// Local copy of every completed calibration, if set
    pub save_dir: Option<PathBuf>,
}

impl Config {
    pub fn new() -> Self {
        let save_dir = env::var("CALIB_SAVE_DIR").ok().map(PathBuf::from);

        Config {
            flow: FlowConfig::new(),
            pattern: PatternConfig::default(),
            video: VideoConfig::new(),
            analysis: AnalysisConfig::default(),
            upload: UploadConfig::new(),
            log: LogConfig::new(),

            save_dir,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use camcal_types::PatternType;

    use super::*;

    #[test]
    fn partial_json_keeps_section_defaults() {
        let json = r#"{ "flow": { "calib_image_count_max": 4 }, "pattern": { "pattern_type": "asymmetric_circles_grid" } }"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.flow.calib_image_count_max, 4);
        assert_eq!(config.flow.event_poll_interval_ms, 2000);
        assert_eq!(
            config.pattern.pattern_type,
            PatternType::AsymmetricCirclesGrid
        );
        assert_eq!(config.upload.descriptor_extension, "upload");
    }

    #[test]
    fn pattern_geometry_falls_back_to_type_defaults() {
        let json = r#"{ "pattern_type": "asymmetric_circles_grid" }"#;
        let pattern: PatternConfig = serde_json::from_str(json).unwrap();
        let geometry = pattern.geometry();

        assert_eq!(geometry.size.columns, 4);
        assert_eq!(geometry.size.rows, 11);
        assert_eq!(geometry.spacing, 20.0);
    }
}
