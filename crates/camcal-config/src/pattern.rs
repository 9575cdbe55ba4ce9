use camcal_types::{PatternGeometry, PatternSize, PatternType};
use serde::{Deserialize, Serialize};

fn default_pattern_type() -> PatternType {
    PatternType::Chessboard
}

/// Calibration target description
///
/// Size and spacing fall back to the built-in values for `pattern_type` when unset.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct PatternConfig {
    #[serde(default = "default_pattern_type")]
    pub pattern_type: PatternType,
    pub columns: Option<u32>,
    pub rows: Option<u32>,
    pub spacing: Option<f32>,
}

impl PatternConfig {
    pub fn geometry(&self) -> PatternGeometry {
        let fallback = self.pattern_type.default_size();
        let size = PatternSize::new(
            self.columns.unwrap_or(fallback.columns),
            self.rows.unwrap_or(fallback.rows),
        );
        let spacing = self
            .spacing
            .unwrap_or_else(|| self.pattern_type.default_spacing());

        PatternGeometry::new(self.pattern_type, size, spacing)
    }
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            pattern_type: default_pattern_type(),
            columns: None,
            rows: None,
            spacing: None,
        }
    }
}
