//! Stand-in collaborators for the demo binary and tests
//!
//! None of these is a real vision routine. The frame source paints a bright
//! rectangle where a printed target would be, and the detector reports an even
//! grid of corners over it.

use std::time::Duration;

use camcal_core::{CalibrationSolver, CornerRefiner, PatternDetector, VisionError};
use camcal_types::{
    CalibrationOutcome, CameraParameters, Detection, GrayFrame, PatternGeometry, Point2,
    ReprojectionError,
};

const BACKGROUND: u8 = 40;
const BOARD: u8 = 230;
const DIST_FUNCTION_VERSION: u32 = 4;

/// Frames alternating between runs with and without a visible board
pub struct SyntheticFrameSource {
    width: u32,
    height: u32,
    period: u64,
    index: u64,
}

impl SyntheticFrameSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            period: 30,
            index: 0,
        }
    }

    /// Number of consecutive frames in each visible/hidden run
    pub fn with_period(mut self, period: u64) -> Self {
        self.period = period.max(1);
        self
    }

    pub fn board_visible(&self, index: u64) -> bool {
        (index / self.period) % 2 == 0
    }

    pub fn next_frame(&mut self) -> GrayFrame {
        let index = self.index;
        self.index += 1;

        let mut frame = GrayFrame::filled(self.width, self.height, BACKGROUND);
        if !self.board_visible(index) {
            return frame;
        }

        // Nudge the board between runs so consecutive samples differ
        let shift = ((index / self.period / 2) % 4) as u32 * 4;
        let x0 = (self.width / 4 + shift).min(self.width);
        let y0 = (self.height / 4 + shift / 2).min(self.height);
        let x1 = (x0 + self.width / 2).min(self.width);
        let y1 = (y0 + self.height / 2).min(self.height);

        for y in y0..y1 {
            let row = (y * self.width) as usize;
            frame.data[row + x0 as usize..row + x1 as usize].fill(BOARD);
        }
        frame
    }
}

/// Thresholds the frame and lays the pattern grid over the bright region
pub struct SyntheticDetector {
    threshold: u8,
    delay: Duration,
}

impl SyntheticDetector {
    pub fn new() -> Self {
        Self {
            threshold: 200,
            delay: Duration::ZERO,
        }
    }

    /// Simulated per-pass latency
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl Default for SyntheticDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternDetector for SyntheticDetector {
    fn detect(
        &self,
        frame: &GrayFrame,
        geometry: &PatternGeometry,
    ) -> Result<Detection, VisionError> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }

        let Some((x0, y0, x1, y1)) = bright_bounds(frame, self.threshold) else {
            return Ok(Detection::not_found());
        };

        let columns = geometry.size.columns;
        let rows = geometry.size.rows;
        if columns == 0 || rows == 0 || x1 - x0 <= columns || y1 - y0 <= rows {
            return Ok(Detection::not_found());
        }

        let step_x = (x1 - x0) as f32 / (columns + 1) as f32;
        let step_y = (y1 - y0) as f32 / (rows + 1) as f32;
        let corners = (1..=rows)
            .flat_map(|r| {
                (1..=columns).map(move |c| {
                    Point2::new(x0 as f32 + c as f32 * step_x, y0 as f32 + r as f32 * step_y)
                })
            })
            .collect();

        Ok(Detection::found(corners))
    }
}

fn bright_bounds(frame: &GrayFrame, threshold: u8) -> Option<(u32, u32, u32, u32)> {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (i, &value) in frame.data.iter().enumerate() {
        if value < threshold {
            continue;
        }
        let x = (i % frame.width as usize) as u32;
        let y = (i / frame.width as usize) as u32;
        bounds = Some(match bounds {
            None => (x, y, x + 1, y + 1),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x + 1), y1.max(y + 1)),
        });
    }
    bounds
}

/// Returns the corners unchanged
#[derive(Default)]
pub struct SyntheticRefiner;

impl CornerRefiner for SyntheticRefiner {
    fn refine(&self, _frame: &GrayFrame, corners: &[Point2]) -> Result<Vec<Point2>, VisionError> {
        Ok(corners.to_vec())
    }
}

/// Pinhole guess from the frame size, errors from corner spacing regularity
#[derive(Default)]
pub struct SyntheticSolver;

impl CalibrationSolver for SyntheticSolver {
    fn solve(
        &self,
        samples: &[Vec<Point2>],
        geometry: &PatternGeometry,
        width: u32,
        height: u32,
    ) -> Result<CalibrationOutcome, VisionError> {
        if samples.is_empty() {
            return Err(VisionError::NotEnoughSamples { have: 0, need: 1 });
        }

        let focal = width.max(height) as f64;
        let cx = width as f64 / 2.0;
        let cy = height as f64 / 2.0;
        let params = CameraParameters {
            width,
            height,
            matrix: [
                [focal, 0.0, cx, 0.0],
                [0.0, focal, cy, 0.0],
                [0.0, 0.0, 1.0, 0.0],
            ],
            dist_factors: vec![0.0, 0.0, 0.0, 0.0, focal, focal, cx, cy, 1.0],
            dist_function_version: DIST_FUNCTION_VERSION,
        };

        let columns = geometry.size.columns.max(1) as usize;
        let residuals: Vec<f64> = samples
            .iter()
            .map(|corners| spacing_residual(corners, columns))
            .collect();
        let min = residuals.iter().copied().fold(f64::INFINITY, f64::min);
        let max = residuals.iter().copied().fold(0.0, f64::max);
        let avg = residuals.iter().sum::<f64>() / residuals.len() as f64;

        Ok(CalibrationOutcome {
            params,
            error: ReprojectionError { min, avg, max },
        })
    }
}

/// RMS deviation of neighbouring-corner gaps from their mean
fn spacing_residual(corners: &[Point2], columns: usize) -> f64 {
    let gaps: Vec<f64> = corners
        .chunks(columns)
        .flat_map(|row| {
            row.windows(2).map(|pair| {
                let dx = (pair[1].x - pair[0].x) as f64;
                let dy = (pair[1].y - pair[0].y) as f64;
                dx.hypot(dy)
            })
        })
        .collect();
    if gaps.is_empty() {
        return 0.0;
    }

    let mean = gaps.iter().sum::<f64>() / gaps.len() as f64;
    let variance = gaps.iter().map(|g| (g - mean).powi(2)).sum::<f64>() / gaps.len() as f64;
    variance.sqrt()
}
