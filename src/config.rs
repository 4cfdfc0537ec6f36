//! Monitor configuration
//!
//! A flat set of named numeric options, grouped by the stage that consumes
//! them. Every field has a default so partial JSON files are accepted.

use crate::error::MonitorError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Tunables for the scoring engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Weight of the density sub-score
    pub density_weight: f64,
    /// Weight of the motion sub-score
    pub motion_weight: f64,
    /// Detection count that maps to a full density score
    pub max_capacity: f64,
    /// Motion magnitude that maps to a full motion score
    pub motion_saturation: f64,
    /// Index (0-100) at which the status becomes WARNING
    pub warning_threshold: f64,
    /// Index (0-100) at which the status becomes CRITICAL
    pub critical_threshold: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            density_weight: 0.5,
            motion_weight: 0.5,
            max_capacity: 100.0,
            motion_saturation: 10.0,
            warning_threshold: 40.0,
            critical_threshold: 50.0,
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<(), MonitorError> {
        let fields = [
            ("density_weight", self.density_weight),
            ("motion_weight", self.motion_weight),
            ("max_capacity", self.max_capacity),
            ("motion_saturation", self.motion_saturation),
            ("warning_threshold", self.warning_threshold),
            ("critical_threshold", self.critical_threshold),
        ];
        if let Some((name, value)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(MonitorError::InvalidConfiguration(format!(
                "{name} must be finite, got {value}"
            )));
        }
        if self.max_capacity <= 0.0 {
            return Err(MonitorError::InvalidConfiguration(format!(
                "max_capacity must be positive, got {}",
                self.max_capacity
            )));
        }
        if self.motion_saturation <= 0.0 {
            return Err(MonitorError::InvalidConfiguration(format!(
                "motion_saturation must be positive, got {}",
                self.motion_saturation
            )));
        }
        if self.density_weight < 0.0 || self.motion_weight < 0.0 {
            return Err(MonitorError::InvalidConfiguration(
                "weights must not be negative".to_string(),
            ));
        }
        if self.critical_threshold < self.warning_threshold {
            return Err(MonitorError::InvalidConfiguration(format!(
                "critical_threshold ({}) is below warning_threshold ({})",
                self.critical_threshold, self.warning_threshold
            )));
        }
        Ok(())
    }
}

/// Alert policy settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Minimum interval between notifications
    pub cooldown_seconds: u64,
    /// Where notifications go (mail address, channel, ...); transport-specific
    pub destination: Option<String>,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            cooldown_seconds: 60,
            destination: None,
        }
    }
}

/// Processing loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Frames skipped between two analyzed frames
    pub skip_frames: u32,
    /// Sleep between control checks while paused or ended
    pub pause_poll_interval_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            skip_frames: 2,
            pause_poll_interval_ms: 100,
        }
    }
}

impl PipelineConfig {
    pub fn pause_poll_interval(&self) -> Duration {
        Duration::from_millis(self.pause_poll_interval_ms)
    }
}

/// Background notifier settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// Pending notifications held before new ones are dropped
    pub queue_capacity: usize,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self { queue_capacity: 8 }
    }
}

/// Complete monitor configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub scoring: ScoringConfig,
    pub alerts: AlertConfig,
    pub pipeline: PipelineConfig,
    pub notifier: NotifierConfig,
}

impl MonitorConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> Result<Self, MonitorError> {
        let config: MonitorConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MonitorError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String, MonitorError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), MonitorError> {
        self.scoring.validate()?;
        if self.notifier.queue_capacity == 0 {
            return Err(MonitorError::InvalidConfiguration(
                "notifier.queue_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
