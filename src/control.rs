//! Playback control shared between the processing loop and its operators

use crate::dashboard::DashboardStore;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};

/// Playback state of the processing loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Play,
    Pause,
    /// Rewind the source and reset transient state, then play
    Replay,
    /// Source exhausted
    Ended,
    /// Loop asked to return to its caller
    Stopped,
}

#[derive(Debug)]
struct ControlInner {
    state: PlaybackState,
    acknowledge_pending: bool,
}

/// Cloneable control handle; every clone drives the same loop
#[derive(Debug, Clone)]
pub struct PlaybackControl {
    inner: Arc<Mutex<ControlInner>>,
    dashboard: Option<DashboardStore>,
}

impl Default for PlaybackControl {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackControl {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ControlInner {
                state: PlaybackState::Play,
                acknowledge_pending: false,
            })),
            dashboard: None,
        }
    }

    /// Control whose acknowledgments also clear the alert flag on `dashboard`
    pub fn with_dashboard(dashboard: DashboardStore) -> Self {
        Self {
            dashboard: Some(dashboard),
            ..Self::new()
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.with(|inner| inner.state)
    }

    pub fn play(&self) {
        self.set(PlaybackState::Play);
    }

    pub fn pause(&self) {
        self.set(PlaybackState::Pause);
    }

    pub fn replay(&self) {
        self.set(PlaybackState::Replay);
    }

    pub fn mark_ended(&self) {
        self.set(PlaybackState::Ended);
    }

    pub fn stop(&self) {
        self.set(PlaybackState::Stopped);
    }

    /// Operator acknowledged the current alert. The dashboard flag clears
    /// right away; the loop picks up the pending flag on its next pass.
    pub fn acknowledge(&self) {
        self.with(|inner| inner.acknowledge_pending = true);
        if let Some(dashboard) = &self.dashboard {
            dashboard.set_alert_triggered(false);
        }
    }

    /// Apply a named action. Returns false for unknown actions.
    pub fn apply(&self, action: &str) -> bool {
        match action {
            "play" => self.play(),
            "pause" => self.pause(),
            "replay" => self.replay(),
            "stop" => self.stop(),
            "continue" => self.acknowledge(),
            _ => return false,
        }
        true
    }

    /// Consume a pending replay request, switching back to Play
    pub fn take_replay(&self) -> bool {
        self.with(|inner| {
            if inner.state == PlaybackState::Replay {
                inner.state = PlaybackState::Play;
                true
            } else {
                false
            }
        })
    }

    /// Consume a pending acknowledgment
    pub fn take_acknowledge(&self) -> bool {
        self.with(|inner| std::mem::take(&mut inner.acknowledge_pending))
    }

    fn set(&self, state: PlaybackState) {
        self.with(|inner| inner.state = state);
    }

    fn with<R>(&self, f: impl FnOnce(&mut ControlInner) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AlertConfig, ScoringConfig};
    use crate::types::{CongestionStatus, Metrics, Sector};
    use chrono::Utc;

    #[test]
    fn test_starts_playing() {
        assert_eq!(PlaybackControl::new().state(), PlaybackState::Play);
    }

    #[test]
    fn test_clones_share_state() {
        let control = PlaybackControl::new();
        let remote = control.clone();
        remote.pause();
        assert_eq!(control.state(), PlaybackState::Pause);
    }

    #[test]
    fn test_take_replay_once() {
        let control = PlaybackControl::new();
        control.replay();

        assert!(control.take_replay());
        assert_eq!(control.state(), PlaybackState::Play);
        assert!(!control.take_replay());
    }

    #[test]
    fn test_apply_actions() {
        let control = PlaybackControl::new();
        assert!(control.apply("pause"));
        assert_eq!(control.state(), PlaybackState::Pause);
        assert!(control.apply("continue"));
        assert!(control.take_acknowledge());
        assert!(!control.take_acknowledge());
        assert!(!control.apply("rewind"));
        assert_eq!(control.state(), PlaybackState::Pause);
    }

    #[test]
    fn test_continue_clears_dashboard_alert() {
        let dashboard = DashboardStore::new(&ScoringConfig::default(), &AlertConfig::default());
        let metrics = Metrics {
            count: 100,
            excluded: 0,
            congestion_index: 50.0,
            status: CongestionStatus::Critical,
            hotspot: Sector::NorthEast,
        };
        dashboard.publish_metrics(1, &metrics, "halt".to_string(), true, Utc::now());

        let control = PlaybackControl::with_dashboard(dashboard.clone());
        control.mark_ended();
        assert!(control.apply("continue"));

        assert!(!dashboard.snapshot().alert_triggered);
        assert_eq!(dashboard.snapshot().frame_index, 1);
        assert!(control.take_acknowledge());
    }
}
