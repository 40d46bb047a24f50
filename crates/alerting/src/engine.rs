//! Two-level alert escalation
//!
//! Level 1 fires after a symptom persists for `level1_duration_secs`, or at
//! once on a microsleep. Level 2 fires when a Level 1 condition outlasts
//! `level2_duration_secs`, or when Level 1 keeps recurring within
//! `level1_frequency_window_secs`. A frame with no active trigger resets the
//! engine once the latest alert is at least `level1_reset_quiet_secs` old
//! and the driver has not yawned since Level 1 began.

use dms::DriverState;
use serde::Serialize;
use sliding_window::TimeWindow;
use std::fmt;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use crate::reason::{AlertDetails, AlertReason, Trigger, TriggerKind, TriggerSet};
use crate::tone::{AudioOutput, ToneTask};
use crate::{AlertConfig, AlertError};

/// Alert level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertLevel {
    #[default]
    Idle,
    Level1,
    Level2,
}

impl AlertLevel {
    pub fn as_u8(self) -> u8 {
        match self {
            AlertLevel::Idle => 0,
            AlertLevel::Level1 => 1,
            AlertLevel::Level2 => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AlertLevel::Idle => "IDLE",
            AlertLevel::Level1 => "LEVEL1",
            AlertLevel::Level2 => "LEVEL2",
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-frame inputs beyond the driver state
///
/// `None` means the metric was not measured this frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlertMetrics {
    /// Start times of recently confirmed yawns; may repeat across frames
    pub yawn_timestamps: Vec<f64>,
    pub perclos: Option<f64>,
    pub blink_rate: Option<f64>,
    pub microsleep_count: u32,
    pub ear: Option<f64>,
}

/// A raised alert
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertInfo {
    pub level: AlertLevel,
    pub timestamp: f64,
    pub reason: AlertReason,
    pub details: AlertDetails,
}

/// Level change produced by one `process` call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AlertTransition {
    Raised(AlertInfo),
    Cleared { timestamp: f64, manual: bool },
}

/// Result of one `process` call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlertOutcome {
    pub level: AlertLevel,
    /// Edges in the order they happened; 0 -> 1 -> 2 in one frame yields two
    pub transitions: Vec<AlertTransition>,
}

/// Alert state machine
pub struct AlertEngine {
    config: AlertConfig,

    level1_active: bool,
    level2_active: bool,
    /// Sticky until manual reset
    level2_triggered: bool,

    /// When the current run of symptomatic frames began
    level1_start: Option<f64>,
    level1_triggered_at: Option<f64>,
    level2_triggered_at: Option<f64>,

    yawn_timestamps: TimeWindow<f64>,
    yawns_since_level1: usize,
    /// Level 1 activation times, never cleared by reset
    trigger_history: TimeWindow<f64>,
    last_alert: Option<AlertInfo>,

    audio: Option<AudioOutput>,
    tone: Option<ToneTask>,
    retired_tone: Option<JoinHandle<()>>,
}

impl AlertEngine {
    /// Create an engine; without `audio` it runs silently
    pub fn new(config: AlertConfig, audio: Option<AudioOutput>) -> Result<Self, AlertError> {
        config.validate()?;
        info!(
            "Alert engine created: level1 after {}s, level2 after {}s, audio {}",
            config.level1_duration_secs,
            config.level2_duration_secs,
            if audio.is_some() { "on" } else { "off" }
        );

        Ok(Self {
            yawn_timestamps: TimeWindow::new(config.yawn_alert_window_secs),
            trigger_history: TimeWindow::new(config.level1_frequency_window_secs),
            config,
            level1_active: false,
            level2_active: false,
            level2_triggered: false,
            level1_start: None,
            level1_triggered_at: None,
            level2_triggered_at: None,
            yawns_since_level1: 0,
            last_alert: None,
            audio,
            tone: None,
            retired_tone: None,
        })
    }

    pub fn config(&self) -> &AlertConfig {
        &self.config
    }

    /// Advance the state machine by one frame
    pub fn process(&mut self, state: DriverState, timestamp: f64, metrics: &AlertMetrics) -> AlertOutcome {
        let mut transitions = Vec::new();

        self.ingest_yawns(&metrics.yawn_timestamps, timestamp);
        self.trigger_history.prune(timestamp);
        let triggers = self.evaluate_triggers(state, timestamp, metrics);

        if let Some(&microsleep) = triggers.get(TriggerKind::Microsleep) {
            if self.alert_level() == AlertLevel::Idle {
                let reason = AlertReason::Symptoms { triggers: [microsleep].into_iter().collect() };
                transitions.push(self.raise_level1(timestamp, reason));
                transitions.extend(self.check_recurrence(timestamp));
                return self.outcome(transitions);
            }
        }

        if triggers.is_empty() {
            self.level1_start = None;
            if self.quiet_long_enough(timestamp) && self.reset() {
                transitions.push(AlertTransition::Cleared { timestamp, manual: false });
            }
            return self.outcome(transitions);
        }

        let dwell_start = *self.level1_start.get_or_insert(timestamp);
        // Level 1 is only an edge from idle; a recurrence-raised Level 2 absorbs it
        if self.alert_level() == AlertLevel::Idle && timestamp - dwell_start >= self.config.level1_duration_secs {
            let reason = AlertReason::Symptoms { triggers: triggers.clone() };
            transitions.push(self.raise_level1(timestamp, reason));
        }

        transitions.extend(self.check_recurrence(timestamp));

        if !self.level2_active {
            if let Some(trigger) = self.persisting_trigger(timestamp, &triggers, metrics) {
                transitions.push(self.raise_level2(timestamp, AlertReason::PersistentSymptoms { trigger }));
            }
        }

        self.outcome(transitions)
    }

    /// Clear all alert state and stop tones
    ///
    /// Returns whether an alert was active. Level 1 recurrence history and
    /// the sticky Level 2 flag survive.
    pub fn reset(&mut self) -> bool {
        let was_active = self.level1_active || self.level2_active;

        self.level1_active = false;
        self.level2_active = false;
        self.level1_start = None;
        self.level1_triggered_at = None;
        self.level2_triggered_at = None;
        self.yawn_timestamps.clear();
        self.yawns_since_level1 = 0;
        self.stop_tone();

        if was_active {
            info!("Alert reset: driver alertness restored");
        }
        was_active
    }

    /// Driver acknowledgement; also clears the sticky Level 2 flag
    pub fn manual_reset(&mut self) -> bool {
        let was_active = self.reset();
        self.level2_triggered = false;
        info!("Manual alert reset");
        was_active
    }

    pub fn alert_level(&self) -> AlertLevel {
        if self.level2_active {
            AlertLevel::Level2
        } else if self.level1_active {
            AlertLevel::Level1
        } else {
            AlertLevel::Idle
        }
    }

    /// Seconds since Level 1 fired, or 0 when inactive
    pub fn level1_elapsed(&self, now: f64) -> f64 {
        match self.level1_triggered_at {
            Some(at) if self.level1_active => (now - at).max(0.0),
            _ => 0.0,
        }
    }

    /// Yawns in the alert window
    pub fn yawn_frequency(&mut self, now: f64) -> usize {
        self.yawn_timestamps.count(now)
    }

    /// Whether a yawn started within `yawn_recent_window_secs`
    pub fn has_recent_yawns(&self, now: f64) -> bool {
        let since = now - self.config.yawn_recent_window_secs;
        self.yawn_timestamps.contains_by(|ts| *ts >= since)
    }

    pub fn last_alert(&self) -> Option<&AlertInfo> {
        self.last_alert.as_ref()
    }

    /// Whether Level 2 fired since the last manual reset
    pub fn level2_triggered(&self) -> bool {
        self.level2_triggered
    }

    /// Level 1 activations within the recurrence window
    pub fn trigger_history_len(&mut self, now: f64) -> usize {
        self.trigger_history.count(now)
    }

    fn outcome(&self, transitions: Vec<AlertTransition>) -> AlertOutcome {
        AlertOutcome { level: self.alert_level(), transitions }
    }

    fn ingest_yawns(&mut self, timestamps: &[f64], now: f64) {
        let cutoff = now - self.config.yawn_alert_window_secs;
        for &ts in timestamps {
            if !ts.is_finite() || ts < cutoff || self.yawn_timestamps.contains_by(|seen| *seen == ts) {
                continue;
            }
            if self.yawn_timestamps.back().is_some_and(|last| ts < *last) {
                debug!("Ignoring out-of-order yawn at t={:.2}", ts);
                continue;
            }

            self.yawn_timestamps.push(ts);
            if self.level1_triggered_at.is_some_and(|at| ts >= at) {
                self.yawns_since_level1 += 1;
            }
            debug!("Yawn recorded at t={:.2}", ts);
        }
    }

    fn evaluate_triggers(&mut self, state: DriverState, now: f64, metrics: &AlertMetrics) -> TriggerSet {
        let mut triggers = TriggerSet::default();

        let yawns = self.yawn_timestamps.count(now);
        if yawns > self.config.yawn_alert_threshold {
            triggers.insert(Trigger::YawnFrequency { yawns });
        }
        if let Some(rate) = metrics.blink_rate.filter(|r| *r >= self.config.blink_rate_level1_threshold) {
            triggers.insert(Trigger::BlinkRate { rate });
        }
        if let Some(perclos) = metrics
            .perclos
            .filter(|p| (self.config.perclos_level1_min..=self.config.perclos_level1_max).contains(p))
        {
            triggers.insert(Trigger::Perclos { perclos });
        }
        if state.is_symptomatic() {
            triggers.insert(Trigger::DrowsyState { state });
        }
        if self.config.microsleep_level1_trigger && metrics.microsleep_count > 0 {
            triggers.insert(Trigger::Microsleep { count: metrics.microsleep_count });
        }

        triggers
    }

    /// Trigger that justifies escalating to Level 2, if Level 1 is old enough
    fn persisting_trigger(&self, now: f64, triggers: &TriggerSet, metrics: &AlertMetrics) -> Option<Trigger> {
        let since = self.level1_triggered_at.filter(|_| self.level1_active)?;
        if now - since < self.config.level2_duration_secs {
            return None;
        }

        if let Some(state) = triggers.get(TriggerKind::State) {
            return Some(*state);
        }
        if let Some(yawn) = triggers.get(TriggerKind::Yawn) {
            let eyes_affected = metrics.perclos.is_some_and(|p| p >= self.config.perclos_level1_min)
                || metrics.ear.is_some_and(|e| e < self.config.ear_closed_threshold);
            if self.yawns_since_level1 > 0 && eyes_affected {
                return Some(*yawn);
            }
        }
        triggers
            .get(TriggerKind::BlinkRate)
            .or_else(|| triggers.get(TriggerKind::Perclos))
            .copied()
    }

    fn check_recurrence(&mut self, now: f64) -> Option<AlertTransition> {
        if self.level2_active {
            return None;
        }
        let count = self.trigger_history.count(now);
        if count < self.config.level1_frequency_threshold {
            return None;
        }

        let reason = AlertReason::FrequentRecurrence {
            count,
            window_secs: self.config.level1_frequency_window_secs,
        };
        Some(self.raise_level2(now, reason))
    }

    fn quiet_long_enough(&self, now: f64) -> bool {
        if !(self.level1_active || self.level2_active) {
            return false;
        }
        let Some(latest) = self.level2_triggered_at.or(self.level1_triggered_at) else {
            return false;
        };
        now - latest >= self.config.level1_reset_quiet_secs && !self.yawned_since_level1()
    }

    /// A yawn still in the alert window started after Level 1 fired
    fn yawned_since_level1(&self) -> bool {
        match self.level1_triggered_at {
            Some(at) => self.yawn_timestamps.contains_by(|ts| *ts >= at),
            None => false,
        }
    }

    fn raise_level1(&mut self, now: f64, reason: AlertReason) -> AlertTransition {
        self.level1_active = true;
        self.level1_triggered_at = Some(now);
        self.yawns_since_level1 = 0;
        self.trigger_history.push(now);

        warn!("LEVEL 1 ALERT at t={:.2}: {}", now, reason);
        self.start_tone(AlertLevel::Level1);
        self.record(AlertLevel::Level1, now, reason)
    }

    fn raise_level2(&mut self, now: f64, reason: AlertReason) -> AlertTransition {
        self.level2_active = true;
        self.level2_triggered = true;
        self.level2_triggered_at = Some(now);

        warn!("LEVEL 2 ALERT at t={:.2}: {}", now, reason);
        self.start_tone(AlertLevel::Level2);
        self.record(AlertLevel::Level2, now, reason)
    }

    fn record(&mut self, level: AlertLevel, timestamp: f64, reason: AlertReason) -> AlertTransition {
        let info = AlertInfo {
            level,
            timestamp,
            details: reason.details(&self.config),
            reason,
        };
        self.last_alert = Some(info.clone());
        AlertTransition::Raised(info)
    }

    fn start_tone(&mut self, level: AlertLevel) {
        let Some(audio) = &self.audio else {
            return;
        };
        let (label, pattern) = match level {
            AlertLevel::Level1 => ("warning", self.config.level1_tone),
            AlertLevel::Level2 => ("emergency", self.config.level2_tone),
            AlertLevel::Idle => return,
        };

        let predecessor = match self.tone.take() {
            Some(task) => task.stop(),
            None => self.retired_tone.take(),
        };
        let grace = Duration::from_secs_f64(self.config.handoff_grace_secs);
        self.tone = Some(ToneTask::spawn(audio, label, pattern, predecessor, grace));
    }

    fn stop_tone(&mut self) {
        if let Some(task) = self.tone.take() {
            self.retired_tone = task.stop();
        }
    }
}

impl fmt::Debug for AlertEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlertEngine")
            .field("level", &self.alert_level())
            .field("level1_start", &self.level1_start)
            .field("level1_triggered_at", &self.level1_triggered_at)
            .field("level2_triggered_at", &self.level2_triggered_at)
            .field("level2_triggered", &self.level2_triggered)
            .finish_non_exhaustive()
    }
}
