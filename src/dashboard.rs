//! Dashboard snapshot store
//!
//! The processing loop is the only writer; any number of readers (an HTTP
//! handler, a status printer) take snapshots. A publish swaps in a complete
//! new snapshot, so readers never see half of one frame and half of another.

use crate::config::{AlertConfig, ScoringConfig};
use crate::types::{CongestionStatus, Metrics, Sector, StatusColor};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};
use uuid::Uuid;

/// Message shown before the first analyzed frame
pub const INITIALIZING_MESSAGE: &str = "System monitoring...";

/// Status shown on the dashboard, including the pre-analysis state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FeedStatus {
    Initializing,
    Normal,
    Warning,
    Critical,
}

impl From<CongestionStatus> for FeedStatus {
    fn from(status: CongestionStatus) -> Self {
        match status {
            CongestionStatus::Normal => FeedStatus::Normal,
            CongestionStatus::Warning => FeedStatus::Warning,
            CongestionStatus::Critical => FeedStatus::Critical,
        }
    }
}

/// Everything the dashboard displays for one committed frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub instance_id: Uuid,
    /// Index of the frame these metrics came from (0 before the first one)
    pub frame_index: u64,
    pub status: FeedStatus,
    pub score: f64,
    pub occupancy: usize,
    pub excluded: usize,
    pub hotspot: Option<Sector>,
    pub recommendation: String,
    pub color: Option<StatusColor>,
    pub color_hex: Option<String>,
    pub alert_triggered: bool,
    pub thresh_warn: f64,
    pub thresh_danger: f64,
    pub alert_destination: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct DisplayContext {
    instance_id: Uuid,
    thresh_warn: f64,
    thresh_danger: f64,
    alert_destination: Option<String>,
}

/// Shared handle to the latest snapshot; clones share the same slot
#[derive(Debug, Clone)]
pub struct DashboardStore {
    context: Arc<DisplayContext>,
    latest: Arc<RwLock<Arc<DashboardSnapshot>>>,
}

impl DashboardStore {
    pub fn new(scoring: &ScoringConfig, alerts: &AlertConfig) -> Self {
        let context = DisplayContext {
            instance_id: Uuid::new_v4(),
            thresh_warn: scoring.warning_threshold,
            thresh_danger: scoring.critical_threshold,
            alert_destination: alerts.destination.clone(),
        };
        let initial = initializing_snapshot(&context);
        Self {
            context: Arc::new(context),
            latest: Arc::new(RwLock::new(Arc::new(initial))),
        }
    }

    pub fn instance_id(&self) -> Uuid {
        self.context.instance_id
    }

    /// Latest committed snapshot
    pub fn snapshot(&self) -> Arc<DashboardSnapshot> {
        let guard = self.latest.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Replace the current snapshot
    pub fn publish(&self, snapshot: DashboardSnapshot) {
        let snapshot = Arc::new(snapshot);
        let mut guard = self.latest.write().unwrap_or_else(PoisonError::into_inner);
        *guard = snapshot;
    }

    /// Publish the metrics of one analyzed frame
    pub fn publish_metrics(
        &self,
        frame_index: u64,
        metrics: &Metrics,
        recommendation: String,
        alert_triggered: bool,
        updated_at: DateTime<Utc>,
    ) {
        let color = metrics.status.color();
        self.publish(DashboardSnapshot {
            instance_id: self.context.instance_id,
            frame_index,
            status: metrics.status.into(),
            score: metrics.congestion_index,
            occupancy: metrics.count,
            excluded: metrics.excluded,
            hotspot: Some(metrics.hotspot),
            recommendation,
            color: Some(color),
            color_hex: Some(color.hex().to_string()),
            alert_triggered,
            thresh_warn: self.context.thresh_warn,
            thresh_danger: self.context.thresh_danger,
            alert_destination: self.context.alert_destination.clone(),
            updated_at,
        });
    }

    /// Return the dashboard to its pre-analysis state
    pub fn publish_initializing(&self) {
        self.publish(initializing_snapshot(&self.context));
    }

    /// Republish the current snapshot with a new alert flag
    pub fn set_alert_triggered(&self, alert_triggered: bool) {
        let mut guard = self.latest.write().unwrap_or_else(PoisonError::into_inner);
        if guard.alert_triggered != alert_triggered {
            let mut next = DashboardSnapshot::clone(&guard);
            next.alert_triggered = alert_triggered;
            next.updated_at = Utc::now();
            *guard = Arc::new(next);
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&*self.snapshot())
    }
}

fn initializing_snapshot(context: &DisplayContext) -> DashboardSnapshot {
    DashboardSnapshot {
        instance_id: context.instance_id,
        frame_index: 0,
        status: FeedStatus::Initializing,
        score: 0.0,
        occupancy: 0,
        excluded: 0,
        hotspot: None,
        recommendation: INITIALIZING_MESSAGE.to_string(),
        color: None,
        color_hex: None,
        alert_triggered: false,
        thresh_warn: context.thresh_warn,
        thresh_danger: context.thresh_danger,
        alert_destination: context.alert_destination.clone(),
        updated_at: Utc::now(),
    }
}
