//! Cooldown-gated alert policy
//!
//! Watches the per-frame status stream and decides when a notification should
//! be raised. Only CRITICAL frames can raise one, and never more often than
//! once per cooldown window.

use crate::config::AlertConfig;
use crate::types::{CongestionStatus, NotificationRequest};
use chrono::{DateTime, Duration, Utc};
use tracing::info;

/// Default minimum interval between notifications, in seconds
pub const DEFAULT_COOLDOWN_SECONDS: u64 = 60;

#[derive(Debug, Clone)]
pub struct AlertPolicy {
    cooldown: Duration,
    last_alert_time: Option<DateTime<Utc>>,
    awaiting_acknowledgment: bool,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN_SECONDS)
    }
}

impl AlertPolicy {
    pub fn new(cooldown_seconds: u64) -> Self {
        Self {
            cooldown: Duration::seconds(cooldown_seconds.min(u64::from(u32::MAX)) as i64),
            last_alert_time: None,
            awaiting_acknowledgment: false,
        }
    }

    pub fn from_config(config: &AlertConfig) -> Self {
        Self::new(config.cooldown_seconds)
    }

    /// Decide whether this frame raises a notification.
    ///
    /// Returns the request to hand to a notifier; delivery is not this
    /// policy's concern.
    pub fn evaluate(
        &mut self,
        status: CongestionStatus,
        congestion_index: f64,
        recommendation: &str,
        now: DateTime<Utc>,
    ) -> Option<NotificationRequest> {
        if status != CongestionStatus::Critical {
            return None;
        }

        let cooled_down = match self.last_alert_time {
            None => true,
            Some(last) => now - last > self.cooldown,
        };
        if !cooled_down {
            return None;
        }

        self.last_alert_time = Some(now);
        self.awaiting_acknowledgment = true;
        info!(congestion_index, "critical congestion, raising alert");

        Some(NotificationRequest::new(
            status,
            congestion_index,
            recommendation.to_string(),
            now,
        ))
    }

    /// Operator acknowledged the current alert
    pub fn acknowledge(&mut self) {
        self.awaiting_acknowledgment = false;
    }

    /// Return the acknowledgment flag to its initial state. The cooldown
    /// timestamp is kept so a replay cannot re-send an alert just delivered.
    pub fn reset(&mut self) {
        self.awaiting_acknowledgment = false;
    }

    pub fn awaiting_acknowledgment(&self) -> bool {
        self.awaiting_acknowledgment
    }

    pub fn last_alert_time(&self) -> Option<DateTime<Utc>> {
        self.last_alert_time
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }
}
