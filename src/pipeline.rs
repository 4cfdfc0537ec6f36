//! Pipeline orchestration
//!
//! This module provides the public API of the monitor. It drives frames
//! through detection, motion estimation, scoring, alerting and dashboard
//! publishing.

use crate::alert::AlertPolicy;
use crate::config::MonitorConfig;
use crate::control::{PlaybackControl, PlaybackState};
use crate::dashboard::DashboardStore;
use crate::error::MonitorError;
use crate::motion::{LumaFrame, MotionEstimator};
use crate::notifier::Notifier;
use crate::recommendation::recommendation;
use crate::scoring::ScoringEngine;
use crate::types::{Detection, FrameObservation, Metrics, NotificationRequest, StatusColor};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Person detector producing normalized boxes for one frame
pub trait Detector {
    fn detect(&mut self, frame: &LumaFrame) -> Vec<Detection>;
}

/// Source of frames for the processing loop
pub trait FrameSource {
    /// Next frame, or `None` once the source is exhausted
    fn next_frame(&mut self) -> Option<LumaFrame>;

    /// Go back to the first frame
    fn rewind(&mut self);
}

/// Outcome of analyzing one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameReport {
    pub frame: u64,
    pub timestamp: DateTime<Utc>,
    pub metrics: Metrics,
    pub recommendation: String,
    pub color: StatusColor,
    /// Notification raised by this frame, if any
    pub alert: Option<NotificationRequest>,
}

/// Analyze NDJSON frame observations in one shot.
///
/// # Arguments
/// * `ndjson` - One `FrameObservation` JSON object per line
/// * `config` - Monitor configuration
///
/// # Returns
/// One report per observation, in input order
///
/// # Example
/// ```ignore
/// let reports = analyze_observations(
///     r#"{"detections": [[0.6, 0.1, 0.7, 0.3]], "motion_magnitude": 4.2}"#,
///     &MonitorConfig::default(),
/// )?;
/// ```
pub fn analyze_observations(
    ndjson: &str,
    config: &MonitorConfig,
) -> Result<Vec<FrameReport>, MonitorError> {
    let observations = parse_observations(ndjson)?;
    let mut analyzer = FrameAnalyzer::new(config)?;

    Ok(observations
        .iter()
        .enumerate()
        .map(|(i, obs)| analyzer.analyze_observation(i as u64 + 1, obs))
        .collect())
}

/// Parse NDJSON observations, skipping blank lines
pub fn parse_observations(ndjson: &str) -> Result<Vec<FrameObservation>, MonitorError> {
    ndjson
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line.trim())
                .map_err(|e| MonitorError::ParseError(format!("line {}: {}", i + 1, e)))
        })
        .collect()
}

/// Scoring engine and alert policy, without any I/O
#[derive(Debug, Clone)]
pub struct FrameAnalyzer {
    engine: ScoringEngine,
    policy: AlertPolicy,
}

impl FrameAnalyzer {
    pub fn new(config: &MonitorConfig) -> Result<Self, MonitorError> {
        Ok(Self {
            engine: ScoringEngine::new(config.scoring.clone())?,
            policy: AlertPolicy::from_config(&config.alerts),
        })
    }

    /// Score a frame and run the alert policy on the result
    pub fn analyze(
        &mut self,
        frame: u64,
        detections: &[Detection],
        motion_magnitude: f64,
        now: DateTime<Utc>,
    ) -> FrameReport {
        let metrics = self.engine.analyze(detections, motion_magnitude);
        let recommendation = recommendation(metrics.status, metrics.hotspot);
        let alert = self
            .policy
            .evaluate(metrics.status, metrics.congestion_index, &recommendation, now);

        FrameReport {
            frame,
            timestamp: now,
            color: metrics.status.color(),
            metrics,
            recommendation,
            alert,
        }
    }

    /// Analyze a recorded observation; untimed observations use the current time
    pub fn analyze_observation(&mut self, frame: u64, observation: &FrameObservation) -> FrameReport {
        let now = observation.timestamp.unwrap_or_else(Utc::now);
        self.analyze(frame, &observation.detections, observation.motion_magnitude, now)
    }

    pub fn acknowledge(&mut self) {
        self.policy.acknowledge();
    }

    pub fn reset(&mut self) {
        self.policy.reset();
    }

    pub fn awaiting_acknowledgment(&self) -> bool {
        self.policy.awaiting_acknowledgment()
    }

    pub fn engine(&self) -> &ScoringEngine {
        &self.engine
    }

    pub fn policy(&self) -> &AlertPolicy {
        &self.policy
    }
}

/// Counters for one `Monitor::run` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub frames_read: u64,
    pub frames_analyzed: u64,
    pub alerts_raised: u64,
    pub replays: u64,
}

/// Stateful processing loop for a single camera
pub struct Monitor<D, M> {
    detector: D,
    motion: M,
    analyzer: FrameAnalyzer,
    notifier: Box<dyn Notifier>,
    dashboard: DashboardStore,
    control: PlaybackControl,
    skip_frames: u32,
    pause_poll_interval: Duration,
    frame_counter: u64,
}

impl<D: Detector, M: MotionEstimator> Monitor<D, M> {
    pub fn new(
        config: &MonitorConfig,
        detector: D,
        motion: M,
        notifier: Box<dyn Notifier>,
    ) -> Result<Self, MonitorError> {
        config.validate()?;
        let dashboard = DashboardStore::new(&config.scoring, &config.alerts);
        Ok(Self {
            detector,
            motion,
            analyzer: FrameAnalyzer::new(config)?,
            notifier,
            control: PlaybackControl::with_dashboard(dashboard.clone()),
            dashboard,
            skip_frames: config.pipeline.skip_frames,
            pause_poll_interval: config.pipeline.pause_poll_interval(),
            frame_counter: 0,
        })
    }

    /// Reader handle for the dashboard
    pub fn dashboard(&self) -> DashboardStore {
        self.dashboard.clone()
    }

    /// Control handle for pause/resume/replay
    pub fn control(&self) -> PlaybackControl {
        self.control.clone()
    }

    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    /// Feed one frame. Only every `skip_frames + 1`-th frame is analyzed; the
    /// others return `None` and leave the dashboard as it was.
    pub fn process_frame(&mut self, frame: &LumaFrame, now: DateTime<Utc>) -> Option<FrameReport> {
        self.apply_acknowledgment();

        self.frame_counter += 1;
        if self.frame_counter % (u64::from(self.skip_frames) + 1) != 0 {
            return None;
        }

        let detections = self.detector.detect(frame);
        let motion_magnitude = self.motion.estimate(frame);
        let report = self
            .analyzer
            .analyze(self.frame_counter, &detections, motion_magnitude, now);

        if let Some(alert) = &report.alert {
            self.notifier.notify(alert.clone());
        }
        self.dashboard.publish_metrics(
            self.frame_counter,
            &report.metrics,
            report.recommendation.clone(),
            self.analyzer.awaiting_acknowledgment(),
            now,
        );

        debug!(
            frame = self.frame_counter,
            index = report.metrics.congestion_index,
            status = %report.metrics.status,
            "frame analyzed"
        );
        Some(report)
    }

    fn apply_acknowledgment(&mut self) {
        if self.control.take_acknowledge() {
            self.analyzer.acknowledge();
            self.dashboard.set_alert_triggered(false);
        }
    }

    /// Return every transient field to its initial value: the motion
    /// reference, the alert acknowledgment, the frame counter and the
    /// dashboard.
    pub fn reset(&mut self) {
        self.motion.reset();
        self.analyzer.reset();
        self.frame_counter = 0;
        self.dashboard.publish_initializing();
        info!("monitor reset");
    }

    /// Drive frames from `source` until it is exhausted or the loop is stopped.
    ///
    /// Pausing only sleeps and applies operator acknowledgments; no frame
    /// state is touched until playback resumes. A replay request rewinds the
    /// source and resets the monitor.
    pub fn run<S: FrameSource>(&mut self, source: &mut S) -> RunSummary {
        let mut summary = RunSummary::default();

        loop {
            match self.control.state() {
                PlaybackState::Pause => {
                    self.apply_acknowledgment();
                    std::thread::sleep(self.pause_poll_interval);
                    continue;
                }
                PlaybackState::Ended | PlaybackState::Stopped => {
                    self.apply_acknowledgment();
                    break;
                }
                PlaybackState::Replay => {
                    if self.control.take_replay() {
                        source.rewind();
                        self.reset();
                        summary.replays += 1;
                    }
                    continue;
                }
                PlaybackState::Play => {}
            }

            let Some(frame) = source.next_frame() else {
                self.control.mark_ended();
                info!(frames = summary.frames_read, "source exhausted");
                break;
            };
            summary.frames_read += 1;

            if let Some(report) = self.process_frame(&frame, Utc::now()) {
                summary.frames_analyzed += 1;
                if report.alert.is_some() {
                    summary.alerts_raised += 1;
                }
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::FeedStatus;
    use crate::motion::FrameDifferenceEstimator;
    use crate::notifier::MemoryNotifier;
    use crate::types::{CongestionStatus, Sector};
    use chrono::{Duration as ChronoDuration, TimeZone};
    use pretty_assertions::assert_eq;

    /// Reports a fixed set of boxes for every frame
    struct FixedDetector(Vec<Detection>);

    impl Detector for FixedDetector {
        fn detect(&mut self, _frame: &LumaFrame) -> Vec<Detection> {
            self.0.clone()
        }
    }

    struct VecSource {
        frames: Vec<LumaFrame>,
        position: usize,
        /// Stop the loop once this many frames have been handed out
        stop_at: Option<(usize, PlaybackControl)>,
    }

    impl FrameSource for VecSource {
        fn next_frame(&mut self) -> Option<LumaFrame> {
            let frame = self.frames.get(self.position).cloned();
            self.position += 1;
            if let Some((at, control)) = &self.stop_at {
                if *at == self.position {
                    control.stop();
                }
            }
            frame
        }

        fn rewind(&mut self) {
            self.position = 0;
        }
    }

    fn source(frames: Vec<LumaFrame>) -> VecSource {
        VecSource {
            frames,
            position: 0,
            stop_at: None,
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn crowd(n: usize) -> Vec<Detection> {
        (0..n).map(|_| Detection::new(0.6, 0.1, 0.8, 0.3)).collect()
    }

    fn config(skip_frames: u32) -> MonitorConfig {
        let mut config = MonitorConfig::default();
        config.pipeline.skip_frames = skip_frames;
        config.pipeline.pause_poll_interval_ms = 1;
        config
    }

    fn monitor(
        skip_frames: u32,
        people: usize,
    ) -> (Monitor<FixedDetector, FrameDifferenceEstimator>, MemoryNotifier) {
        let notifier = MemoryNotifier::new();
        let monitor = Monitor::new(
            &config(skip_frames),
            FixedDetector(crowd(people)),
            FrameDifferenceEstimator::new(10.0),
            Box::new(notifier.clone()),
        )
        .unwrap();
        (monitor, notifier)
    }

    #[test]
    fn test_analyze_observations() {
        let input = r#"
            {"timestamp": "2024-06-01T12:00:00Z", "detections": [], "motion_magnitude": 0.0}
            {"timestamp": "2024-06-01T12:00:01Z", "detections": [[0.6, 0.1, 0.8, 0.3]], "motion_magnitude": 10.0}
        "#;
        let reports = analyze_observations(input, &MonitorConfig::default()).unwrap();

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].frame, 1);
        assert_eq!(reports[0].metrics.status, CongestionStatus::Normal);
        assert_eq!(reports[1].metrics.congestion_index, 50.5);
        assert_eq!(reports[1].metrics.hotspot, Sector::NorthEast);
        assert_eq!(reports[1].color, StatusColor::Red);
        assert!(reports[1].alert.is_some());
        assert_eq!(reports[1].timestamp, t0() + ChronoDuration::seconds(1));
    }

    #[test]
    fn test_parse_observations_reports_line() {
        let err = parse_observations("{}\nnot json\n").unwrap_err();
        match err {
            MonitorError::ParseError(msg) => assert!(msg.starts_with("line 2"), "{msg}"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_analyzer_cooldown_over_stream() {
        let mut analyzer = FrameAnalyzer::new(&MonitorConfig::default()).unwrap();
        let crowd = crowd(100);

        let alerts: Vec<u64> = (0..180)
            .filter_map(|s| {
                let report = analyzer.analyze(s as u64, &crowd, 0.0, t0() + ChronoDuration::seconds(s));
                report.alert.map(|_| report.frame)
            })
            .collect();

        // Alerts at 0s, 61s and 122s
        assert_eq!(alerts, vec![0, 61, 122]);
    }

    #[test]
    fn test_skip_frames() {
        let (mut monitor, _) = monitor(2, 10);
        let frame = LumaFrame::filled(4, 4, 0).unwrap();

        let analyzed: Vec<bool> = (0..6)
            .map(|_| monitor.process_frame(&frame, t0()).is_some())
            .collect();

        assert_eq!(analyzed, vec![false, false, true, false, false, true]);
        assert_eq!(monitor.dashboard().snapshot().frame_index, 6);
    }

    #[test]
    fn test_critical_frame_notifies_and_publishes() {
        let (mut monitor, notifier) = monitor(0, 100);
        let dashboard = monitor.dashboard();

        let report = monitor
            .process_frame(&LumaFrame::filled(4, 4, 0).unwrap(), t0())
            .unwrap();
        assert_eq!(report.metrics.congestion_index, 50.0);
        assert_eq!(report.metrics.status, CongestionStatus::Critical);

        assert_eq!(notifier.len(), 1);
        let snapshot = dashboard.snapshot();
        assert_eq!(snapshot.status, FeedStatus::Critical);
        assert!(snapshot.alert_triggered);
        assert_eq!(snapshot.hotspot, Some(Sector::NorthEast));
        assert_eq!(snapshot.updated_at, report.timestamp);

        // Still critical inside the cooldown: no second notification
        monitor.process_frame(&LumaFrame::filled(4, 4, 0).unwrap(), t0() + ChronoDuration::seconds(5));
        assert_eq!(notifier.len(), 1);
    }

    #[test]
    fn test_acknowledge_clears_flag() {
        let (mut monitor, _) = monitor(0, 100);
        let control = monitor.control();
        monitor.process_frame(&LumaFrame::filled(4, 4, 0).unwrap(), t0());

        control.acknowledge();
        monitor.process_frame(&LumaFrame::filled(4, 4, 0).unwrap(), t0() + ChronoDuration::seconds(1));

        assert!(!monitor.dashboard().snapshot().alert_triggered);
    }

    #[test]
    fn test_reset_clears_motion_reference() {
        let (mut monitor, _) = monitor(0, 0);
        monitor.process_frame(&LumaFrame::filled(4, 4, 0).unwrap(), t0());
        let moving = monitor
            .process_frame(&LumaFrame::filled(4, 4, 255).unwrap(), t0())
            .unwrap();
        assert_eq!(moving.metrics.congestion_index, 50.0);

        monitor.reset();
        assert_eq!(monitor.dashboard().snapshot().status, FeedStatus::Initializing);

        // The first frame after a reset has no motion reference
        let first = monitor
            .process_frame(&LumaFrame::filled(4, 4, 0).unwrap(), t0())
            .unwrap();
        assert_eq!(first.metrics.congestion_index, 0.0);
    }

    #[test]
    fn test_run_to_end() {
        let (mut monitor, _) = monitor(1, 5);
        let mut source = source(vec![LumaFrame::filled(2, 2, 0).unwrap(); 7]);

        let summary = monitor.run(&mut source);

        assert_eq!(summary.frames_read, 7);
        assert_eq!(summary.frames_analyzed, 3);
        assert_eq!(monitor.control().state(), PlaybackState::Ended);
    }

    #[test]
    fn test_replay_after_end() {
        let (mut monitor, _) = monitor(0, 5);
        let control = monitor.control();
        let mut source = source(vec![
            LumaFrame::filled(2, 2, 0).unwrap(),
            LumaFrame::filled(2, 2, 255).unwrap(),
        ]);

        monitor.run(&mut source);
        control.replay();
        let summary = monitor.run(&mut source);

        assert_eq!(summary.replays, 1);
        assert_eq!(summary.frames_read, 2);
        assert_eq!(monitor.frame_counter(), 2);
    }

    #[test]
    fn test_replay_has_no_stale_motion() {
        let (mut monitor, _) = monitor(0, 0);
        let control = monitor.control();
        let dashboard = monitor.dashboard();
        let mut source = source(vec![
            LumaFrame::filled(2, 2, 255).unwrap(),
            LumaFrame::filled(2, 2, 0).unwrap(),
        ]);

        monitor.run(&mut source);
        assert_eq!(dashboard.snapshot().score, 50.0);

        // The first replayed frame differs from the last frame seen
        source.stop_at = Some((1, control.clone()));
        control.replay();
        let summary = monitor.run(&mut source);

        assert_eq!(summary.replays, 1);
        assert_eq!(summary.frames_analyzed, 1);
        let snapshot = dashboard.snapshot();
        assert_eq!(snapshot.frame_index, 1);
        assert_eq!(snapshot.score, 0.0);
    }

    #[test]
    fn test_continue_after_end_clears_alert() {
        let (mut monitor, _) = monitor(0, 100);
        let control = monitor.control();
        let dashboard = monitor.dashboard();
        let mut source = source(vec![LumaFrame::filled(2, 2, 0).unwrap()]);

        monitor.run(&mut source);
        assert_eq!(control.state(), PlaybackState::Ended);
        assert!(dashboard.snapshot().alert_triggered);

        assert!(control.apply("continue"));
        assert!(!dashboard.snapshot().alert_triggered);

        // The ended loop still hands the acknowledgment to the alert policy
        monitor.run(&mut source);
        assert!(!monitor.analyzer.awaiting_acknowledgment());
    }

    #[test]
    fn test_continue_while_paused() {
        let (mut monitor, _) = monitor(0, 100);
        let control = monitor.control();
        let dashboard = monitor.dashboard();
        monitor.process_frame(&LumaFrame::filled(2, 2, 0).unwrap(), t0());
        assert!(monitor.analyzer.awaiting_acknowledgment());

        control.pause();
        let operator = control.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(20));
            operator.apply("continue");
            std::thread::sleep(std::time::Duration::from_millis(20));
            operator.stop();
        });
        let summary = monitor.run(&mut source(vec![LumaFrame::filled(2, 2, 0).unwrap()]));
        handle.join().unwrap();

        assert_eq!(summary.frames_read, 0);
        assert!(!dashboard.snapshot().alert_triggered);
        assert!(!monitor.analyzer.awaiting_acknowledgment());
    }

    #[test]
    fn test_stopped_loop_returns_immediately() {
        let (mut monitor, _) = monitor(0, 5);
        monitor.control().stop();
        let mut source = source(vec![LumaFrame::filled(2, 2, 0).unwrap()]);

        assert_eq!(monitor.run(&mut source), RunSummary::default());
    }

    #[test]
    fn test_paused_loop_resumes() {
        let (mut monitor, _) = monitor(0, 5);
        let control = monitor.control();
        control.pause();
        let mut source = source(vec![LumaFrame::filled(2, 2, 0).unwrap(); 3]);

        let resumer = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(20));
            control.play();
        });
        let summary = monitor.run(&mut source);
        resumer.join().unwrap();

        assert_eq!(summary.frames_analyzed, 3);
    }
}
