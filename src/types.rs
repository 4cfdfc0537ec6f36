//! Core types for the congestion monitor
//!
//! This module defines the data structures that flow through each stage of the
//! monitor: detections, sectors, per-frame metrics, and notification requests.

use crate::error::MonitorError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Normalized bounding box of a detected person, relative to frame size.
///
/// Serialized as a `[x1, y1, x2, y2]` array, which is how detectors usually
/// emit normalized boxes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct Detection {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl Detection {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Center point of the box
    pub fn center(&self) -> (f64, f64) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// Check that every coordinate lies in `[0, 1]` and the corners are ordered
    pub fn validate(&self) -> Result<(), MonitorError> {
        let coords = [self.x1, self.y1, self.x2, self.y2];
        if coords.iter().any(|c| !c.is_finite() || !(0.0..=1.0).contains(c)) {
            return Err(MonitorError::MalformedDetection(format!(
                "coordinates outside [0, 1]: {coords:?}"
            )));
        }
        if self.x1 > self.x2 || self.y1 > self.y2 {
            return Err(MonitorError::MalformedDetection(format!(
                "corners out of order: {coords:?}"
            )));
        }
        Ok(())
    }
}

impl From<[f64; 4]> for Detection {
    fn from(b: [f64; 4]) -> Self {
        Self::new(b[0], b[1], b[2], b[3])
    }
}

impl From<Detection> for [f64; 4] {
    fn from(d: Detection) -> Self {
        [d.x1, d.y1, d.x2, d.y2]
    }
}

/// Normalized rectangle `(x1, y1, x2, y2)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

/// One of the four fixed quadrants of the frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sector {
    #[serde(rename = "North-West")]
    NorthWest,
    #[serde(rename = "North-East")]
    NorthEast,
    #[serde(rename = "South-West")]
    SouthWest,
    #[serde(rename = "South-East")]
    SouthEast,
}

impl Sector {
    /// All sectors in tie-break order
    pub const ALL: [Sector; 4] = [
        Sector::NorthWest,
        Sector::NorthEast,
        Sector::SouthWest,
        Sector::SouthEast,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Sector::NorthWest => "North-West",
            Sector::NorthEast => "North-East",
            Sector::SouthWest => "South-West",
            Sector::SouthEast => "South-East",
        }
    }

    /// Quadrant covered by this sector
    pub fn region(&self) -> Region {
        let (x1, y1, x2, y2) = match self {
            Sector::NorthWest => (0.0, 0.0, 0.5, 0.5),
            Sector::NorthEast => (0.5, 0.0, 1.0, 0.5),
            Sector::SouthWest => (0.0, 0.5, 0.5, 1.0),
            Sector::SouthEast => (0.5, 0.5, 1.0, 1.0),
        };
        Region { x1, y1, x2, y2 }
    }

    /// Sector containing a normalized point. The 0.5 boundaries belong to the
    /// East and South halves.
    pub fn containing(x: f64, y: f64) -> Sector {
        match (x < 0.5, y < 0.5) {
            (true, true) => Sector::NorthWest,
            (false, true) => Sector::NorthEast,
            (true, false) => Sector::SouthWest,
            (false, false) => Sector::SouthEast,
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            Sector::NorthWest => 0,
            Sector::NorthEast => 1,
            Sector::SouthWest => 2,
            Sector::SouthEast => 3,
        }
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Congestion status tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CongestionStatus {
    Normal,
    Warning,
    Critical,
}

impl CongestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CongestionStatus::Normal => "NORMAL",
            CongestionStatus::Warning => "WARNING",
            CongestionStatus::Critical => "CRITICAL",
        }
    }

    pub fn color(&self) -> StatusColor {
        match self {
            CongestionStatus::Normal => StatusColor::Green,
            CongestionStatus::Warning => StatusColor::Orange,
            CongestionStatus::Critical => StatusColor::Red,
        }
    }
}

impl fmt::Display for CongestionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Color-coded threshold bucket shown on the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusColor {
    Green,
    Orange,
    Red,
}

impl StatusColor {
    pub fn hex(&self) -> &'static str {
        match self {
            StatusColor::Green => "#16a34a",
            StatusColor::Orange => "#ea580c",
            StatusColor::Red => "#dc2626",
        }
    }

    /// Blue-green-red triple for overlay drawing
    pub fn bgr(&self) -> (u8, u8, u8) {
        match self {
            StatusColor::Green => (0, 255, 0),
            StatusColor::Orange => (0, 165, 255),
            StatusColor::Red => (0, 0, 255),
        }
    }
}

/// Result of analyzing one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Number of accepted detections
    pub count: usize,
    /// Malformed detections skipped during analysis
    #[serde(default)]
    pub excluded: usize,
    /// Congestion index (0-100, one decimal)
    pub congestion_index: f64,
    pub status: CongestionStatus,
    /// Most crowded sector
    pub hotspot: Sector,
}

/// Request handed to a notifier when an alert fires
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub id: Uuid,
    pub status: CongestionStatus,
    pub congestion_index: f64,
    pub recommendation: String,
    pub raised_at: DateTime<Utc>,
}

impl NotificationRequest {
    pub fn new(
        status: CongestionStatus,
        congestion_index: f64,
        recommendation: String,
        raised_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            status,
            congestion_index,
            recommendation,
            raised_at,
        }
    }

    pub fn subject(&self) -> String {
        format!("CROWD MONITOR ALERT: {}", self.status)
    }

    /// Plain-text message body for mail-style transports
    pub fn body(&self) -> String {
        format!(
            "Status: {}\nIndex: {:.1}\nAction: {}\nTime: {}",
            self.status,
            self.congestion_index,
            self.recommendation,
            self.raised_at.format("%H:%M:%S")
        )
    }
}

/// One frame's detector and motion output, as read from NDJSON replays
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameObservation {
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub detections: Vec<Detection>,
    #[serde(default)]
    pub motion_magnitude: f64,
}
