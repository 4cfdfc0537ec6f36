//! Congestion scoring
//!
//! This module turns one frame's detections and motion magnitude into
//! [`Metrics`]:
//! - Density and motion normalized to 0-1 and clamped
//! - Weighted blend scaled to a 0-100 congestion index
//! - Status tier from the configured thresholds
//! - Hotspot sector by detection centers

use crate::config::ScoringConfig;
use crate::error::MonitorError;
use crate::types::{CongestionStatus, Detection, Metrics, Sector};
use tracing::debug;

/// Scoring engine holding validated tunables
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    config: ScoringConfig,
}

impl ScoringEngine {
    /// Create an engine, rejecting degenerate tunables
    pub fn new(config: ScoringConfig) -> Result<Self, MonitorError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Analyze one frame
    pub fn analyze(&self, detections: &[Detection], motion_magnitude: f64) -> Metrics {
        let mut accepted = Vec::with_capacity(detections.len());
        let mut excluded = 0;
        for detection in detections {
            match detection.validate() {
                Ok(()) => accepted.push(*detection),
                Err(e) => {
                    debug!(error = %e, "skipping detection");
                    excluded += 1;
                }
            }
        }

        let count = accepted.len();
        let density_score = (count as f64 / self.config.max_capacity).min(1.0);
        let motion_score = (sanitize_motion(motion_magnitude) / self.config.motion_saturation).min(1.0);

        let raw_index =
            density_score * self.config.density_weight + motion_score * self.config.motion_weight;
        let congestion_index = round_one_decimal(raw_index * 100.0).clamp(0.0, 100.0);

        Metrics {
            count,
            excluded,
            congestion_index,
            status: self.classify(congestion_index),
            hotspot: hotspot(&accepted),
        }
    }

    /// Map an index to its status; both thresholds are inclusive
    pub fn classify(&self, congestion_index: f64) -> CongestionStatus {
        if congestion_index >= self.config.critical_threshold {
            CongestionStatus::Critical
        } else if congestion_index >= self.config.warning_threshold {
            CongestionStatus::Warning
        } else {
            CongestionStatus::Normal
        }
    }
}

/// Per-sector detection counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SectorCounts([usize; 4]);

impl SectorCounts {
    pub fn from_detections(detections: &[Detection]) -> Self {
        let mut counts = Self::default();
        for detection in detections {
            let (cx, cy) = detection.center();
            counts.0[Sector::containing(cx, cy).index()] += 1;
        }
        counts
    }

    pub fn get(&self, sector: Sector) -> usize {
        self.0[sector.index()]
    }

    /// Sector with the highest count. Ties go to the earliest sector in
    /// [`Sector::ALL`], so an empty frame reports North-West.
    pub fn busiest(&self) -> Sector {
        let mut best = Sector::ALL[0];
        for sector in Sector::ALL.into_iter().skip(1) {
            if self.get(sector) > self.get(best) {
                best = sector;
            }
        }
        best
    }
}

/// Most crowded sector for a set of detections
pub fn hotspot(detections: &[Detection]) -> Sector {
    SectorCounts::from_detections(detections).busiest()
}

fn sanitize_motion(motion_magnitude: f64) -> f64 {
    if motion_magnitude.is_finite() && motion_magnitude > 0.0 {
        motion_magnitude
    } else {
        0.0
    }
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
