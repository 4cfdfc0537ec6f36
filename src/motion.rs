//! Motion estimation
//!
//! The monitor only needs one scalar per analyzed frame. Real deployments plug
//! in dense optical flow; [`FrameDifferenceEstimator`] is a cheap stand-in
//! built on luma differences against the previous frame.

use crate::error::MonitorError;
use tracing::debug;

/// Default scale applied to the mean absolute luma difference
pub const DEFAULT_MOTION_GAIN: f64 = 5.0;

/// Grayscale frame, row-major, one byte per pixel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LumaFrame {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
}

impl LumaFrame {
    pub fn new(width: usize, height: usize, pixels: Vec<u8>) -> Result<Self, MonitorError> {
        if width.checked_mul(height) != Some(pixels.len()) {
            return Err(MonitorError::ParseError(format!(
                "{width}x{height} frame needs {} pixels, got {}",
                width.saturating_mul(height),
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Frame with every pixel set to `value`
    pub fn filled(width: usize, height: usize, value: u8) -> Result<Self, MonitorError> {
        let len = width.checked_mul(height).ok_or_else(|| {
            MonitorError::ParseError(format!("{width}x{height} frame is too large"))
        })?;
        Ok(Self {
            width,
            height,
            pixels: vec![value; len],
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

/// Produces one non-negative motion magnitude per frame
pub trait MotionEstimator {
    fn estimate(&mut self, frame: &LumaFrame) -> f64;

    /// Forget the previous-frame reference
    fn reset(&mut self);
}

/// Mean absolute luma difference between consecutive frames, scaled by `gain`
#[derive(Debug, Clone)]
pub struct FrameDifferenceEstimator {
    gain: f64,
    previous: Option<LumaFrame>,
}

impl Default for FrameDifferenceEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_MOTION_GAIN)
    }
}

impl FrameDifferenceEstimator {
    pub fn new(gain: f64) -> Self {
        Self {
            gain,
            previous: None,
        }
    }

    pub fn has_reference(&self) -> bool {
        self.previous.is_some()
    }
}

impl MotionEstimator for FrameDifferenceEstimator {
    fn estimate(&mut self, frame: &LumaFrame) -> f64 {
        let magnitude = match &self.previous {
            Some(prev) if prev.width == frame.width && prev.height == frame.height => {
                if frame.pixels.is_empty() {
                    0.0
                } else {
                    let total: u64 = prev
                        .pixels
                        .iter()
                        .zip(&frame.pixels)
                        .map(|(a, b)| u64::from(a.abs_diff(*b)))
                        .sum();
                    // Scale to 0-1 per pixel before applying the gain
                    total as f64 / frame.pixels.len() as f64 / 255.0 * self.gain
                }
            }
            Some(_) => {
                debug!("frame size changed, restarting motion reference");
                0.0
            }
            None => 0.0,
        };
        self.previous = Some(frame.clone());
        magnitude.max(0.0)
    }

    fn reset(&mut self) {
        self.previous = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_size_checked() {
        assert!(LumaFrame::new(2, 2, vec![0; 4]).is_ok());
        assert!(LumaFrame::new(2, 2, vec![0; 3]).is_err());
    }

    #[test]
    fn test_filled_rejects_overflowing_size() {
        assert!(LumaFrame::filled(usize::MAX, 2, 0).is_err());
        assert_eq!(LumaFrame::filled(3, 2, 7).unwrap().pixels(), &[7; 6]);
    }

    #[test]
    fn test_first_frame_has_no_motion() {
        let mut estimator = FrameDifferenceEstimator::default();
        assert_eq!(estimator.estimate(&LumaFrame::filled(4, 4, 200).unwrap()), 0.0);
        assert!(estimator.has_reference());
    }

    #[test]
    fn test_difference_scales_with_gain() {
        let mut estimator = FrameDifferenceEstimator::new(10.0);
        estimator.estimate(&LumaFrame::filled(4, 4, 0).unwrap());
        let magnitude = estimator.estimate(&LumaFrame::filled(4, 4, 255).unwrap());
        assert!((magnitude - 10.0).abs() < 1e-9);

        let still = estimator.estimate(&LumaFrame::filled(4, 4, 255).unwrap());
        assert_eq!(still, 0.0);
    }

    #[test]
    fn test_partial_change() {
        let mut estimator = FrameDifferenceEstimator::new(1.0);
        estimator.estimate(&LumaFrame::filled(2, 1, 0).unwrap());
        let frame = LumaFrame::new(2, 1, vec![255, 0]).unwrap();
        assert!((estimator.estimate(&frame) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_reset_drops_reference() {
        let mut estimator = FrameDifferenceEstimator::default();
        estimator.estimate(&LumaFrame::filled(4, 4, 0).unwrap());
        estimator.reset();

        assert!(!estimator.has_reference());
        assert_eq!(estimator.estimate(&LumaFrame::filled(4, 4, 255).unwrap()), 0.0);
    }

    #[test]
    fn test_size_change_restarts_reference() {
        let mut estimator = FrameDifferenceEstimator::default();
        estimator.estimate(&LumaFrame::filled(4, 4, 0).unwrap());
        assert_eq!(estimator.estimate(&LumaFrame::filled(8, 2, 255).unwrap()), 0.0);
        assert!(estimator.estimate(&LumaFrame::filled(8, 2, 0).unwrap()) > 0.0);
    }
}
