//! Congestion Monitor - crowd congestion scoring and alerting for live video
//!
//! The monitor turns per-frame person detections and a motion magnitude into a
//! bounded congestion index through a deterministic pipeline: scoring →
//! status tier → hotspot sector → cooldown-gated alerting → dashboard snapshot.
//!
//! Detection, motion estimation and notification transport are collaborators
//! behind traits ([`Detector`], [`MotionEstimator`], [`Transport`]).

pub mod alert;
pub mod config;
pub mod control;
pub mod dashboard;
pub mod error;
pub mod motion;
pub mod notifier;
pub mod pipeline;
pub mod recommendation;
pub mod scoring;
pub mod types;

pub use alert::AlertPolicy;
pub use config::MonitorConfig;
pub use dashboard::{DashboardSnapshot, DashboardStore};
pub use error::MonitorError;
pub use motion::{FrameDifferenceEstimator, LumaFrame, MotionEstimator};
pub use notifier::{BackgroundNotifier, Notifier, Transport};
pub use pipeline::{analyze_observations, Detector, FrameAnalyzer, FrameSource, Monitor};
pub use scoring::ScoringEngine;
pub use types::{CongestionStatus, Detection, Metrics, Sector};

/// Crate version, reported by the CLI
pub const MONITOR_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name used in reports
pub const PRODUCER_NAME: &str = "congestion-monitor";
