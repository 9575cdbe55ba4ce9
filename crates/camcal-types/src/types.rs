use std::fmt;
use std::ops::BitOr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// UI input understood by the flow controller
///
/// Each variant is a single bit so that masks can accept a combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Event {
    None = 0,
    PrimaryAction = 1,
    CancelAction = 2,
    ModalRequested = 4,
}

impl Event {
    pub fn bits(self) -> u8 {
        self as u8
    }
}

/// Set of event categories currently accepted by the flow controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventMask(u8);

impl EventMask {
    pub const NONE: EventMask = EventMask(0);
    pub const PRIMARY: EventMask = EventMask(Event::PrimaryAction as u8);
    pub const CANCEL: EventMask = EventMask(Event::CancelAction as u8);
    pub const MODAL: EventMask = EventMask(Event::ModalRequested as u8);

    pub fn accepts(self, event: Event) -> bool {
        self.0 & event.bits() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for EventMask {
    type Output = EventMask;

    fn bitor(self, rhs: EventMask) -> EventMask {
        EventMask(self.0 | rhs.0)
    }
}

impl From<Event> for EventMask {
    fn from(event: Event) -> Self {
        EventMask(event.bits())
    }
}

/// Externally visible phase of the capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SessionState {
    NotStarted = 0,
    Welcome = 1,
    Capturing = 2,
    Calibrating = 3,
    Done = 4,
}

impl SessionState {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => SessionState::Welcome,
            2 => SessionState::Capturing,
            3 => SessionState::Calibrating,
            4 => SessionState::Done,
            _ => SessionState::NotStarted,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::NotStarted => "not started",
            SessionState::Welcome => "welcome",
            SessionState::Capturing => "capturing",
            SessionState::Calibrating => "calibrating",
            SessionState::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Single-channel 8-bit video frame, row-major with no padding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrayFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl GrayFrame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if data.len() != Self::byte_len(width, height) {
            return None;
        }
        Some(Self {
            width,
            height,
            data,
        })
    }

    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        Self {
            width,
            height,
            data: vec![value; Self::byte_len(width, height)],
        }
    }

    pub fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize
    }

    pub fn pixel(&self, x: u32, y: u32) -> u8 {
        self.data[y as usize * self.width as usize + x as usize]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    Chessboard,
    CirclesGrid,
    AsymmetricCirclesGrid,
}

impl PatternType {
    /// Built-in feature count for the printed targets
    pub fn default_size(self) -> PatternSize {
        match self {
            PatternType::Chessboard | PatternType::CirclesGrid => PatternSize::new(7, 5),
            PatternType::AsymmetricCirclesGrid => PatternSize::new(4, 11),
        }
    }

    /// Built-in feature spacing in millimetres
    pub fn default_spacing(self) -> f32 {
        match self {
            PatternType::Chessboard | PatternType::CirclesGrid => 28.5,
            PatternType::AsymmetricCirclesGrid => 20.0,
        }
    }
}

/// Feature grid dimensions
///
/// For the chessboard this is inner corners per row x per column; for the
/// asymmetric circles grid it is circles per row x total rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatternSize {
    pub columns: u32,
    pub rows: u32,
}

impl PatternSize {
    pub fn new(columns: u32, rows: u32) -> Self {
        Self { columns, rows }
    }

    pub fn point_count(&self) -> usize {
        self.columns as usize * self.rows as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatternGeometry {
    pub pattern_type: PatternType,
    pub size: PatternSize,
    pub spacing: f32,
}

impl PatternGeometry {
    pub fn new(pattern_type: PatternType, size: PatternSize, spacing: f32) -> Self {
        Self {
            pattern_type,
            size,
            spacing,
        }
    }

    pub fn default_for(pattern_type: PatternType) -> Self {
        Self::new(
            pattern_type,
            pattern_type.default_size(),
            pattern_type.default_spacing(),
        )
    }
}

/// Raw output of one detection pass
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Detection {
    pub found: bool,
    pub corners: Vec<Point2>,
}

impl Detection {
    pub fn found(corners: Vec<Point2>) -> Self {
        Self {
            found: true,
            corners,
        }
    }

    pub fn not_found() -> Self {
        Self::default()
    }
}

/// Completed detection pass together with the frame it ran against
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub found: bool,
    /// Empty when `found` is false
    pub corners: Vec<Point2>,
    pub frame: Arc<GrayFrame>,
}

impl AnalysisResult {
    pub fn from_detection(detection: Detection, frame: GrayFrame) -> Self {
        let corners = if detection.found {
            detection.corners
        } else {
            Vec::new()
        };
        Self {
            found: detection.found,
            corners,
            frame: Arc::new(frame),
        }
    }
}

/// Intrinsic camera model produced by the calibration solve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraParameters {
    pub width: u32,
    pub height: u32,
    /// 3x4 projection matrix, row-major
    pub matrix: [[f64; 4]; 3],
    pub dist_factors: Vec<f64>,
    pub dist_function_version: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ReprojectionError {
    pub min: f64,
    pub avg: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationOutcome {
    pub params: CameraParameters,
    pub error: ReprojectionError,
}

/// Upload worker status code reported alongside the status message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum UploadStatusCode {
    Idle = 0,
    InProgress = 1,
    Completed = 2,
}
