//! Alert triggers and reasons
//!
//! Each trigger kind carries the value that tripped it. A [`TriggerSet`]
//! keeps triggers in reporting order (yawn, blink rate, PERCLOS, state,
//! microsleep) so the rendered reason is stable.

use dms::DriverState;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use crate::AlertConfig;

/// Key/value details attached to a raised alert
pub type AlertDetails = BTreeMap<String, Value>;

/// Trigger kinds in reporting precedence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    Yawn,
    BlinkRate,
    Perclos,
    State,
    Microsleep,
}

/// One active Level 1 trigger and its payload
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Trigger {
    /// Yawns in the alert window
    YawnFrequency { yawns: usize },
    /// Blinks per minute
    BlinkRate { rate: f64 },
    /// PERCLOS percent
    Perclos { perclos: f64 },
    /// Symptomatic driver state
    DrowsyState { state: DriverState },
    /// Microsleeps in the analyzer window
    Microsleep { count: u32 },
}

impl Trigger {
    pub fn kind(&self) -> TriggerKind {
        match self {
            Trigger::YawnFrequency { .. } => TriggerKind::Yawn,
            Trigger::BlinkRate { .. } => TriggerKind::BlinkRate,
            Trigger::Perclos { .. } => TriggerKind::Perclos,
            Trigger::DrowsyState { .. } => TriggerKind::State,
            Trigger::Microsleep { .. } => TriggerKind::Microsleep,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Trigger::YawnFrequency { .. } => "yawn frequency",
            Trigger::BlinkRate { .. } => "excessive blink rate",
            Trigger::Perclos { .. } => "high PERCLOS",
            Trigger::DrowsyState { .. } => "drowsiness symptoms",
            Trigger::Microsleep { .. } => "microsleep event",
        }
    }

    fn add_details(&self, config: &AlertConfig, details: &mut AlertDetails) {
        match *self {
            Trigger::YawnFrequency { yawns } => {
                details.insert("yawn_frequency".into(), json!(yawns));
                details.insert("yawn_threshold".into(), json!(config.yawn_alert_threshold));
                details.insert("yawn_window_secs".into(), json!(config.yawn_alert_window_secs));
            }
            Trigger::BlinkRate { rate } => {
                details.insert("blink_rate".into(), json!(round1(rate)));
                details.insert("blink_rate_threshold".into(), json!(config.blink_rate_level1_threshold));
            }
            Trigger::Perclos { perclos } => {
                details.insert("perclos".into(), json!(round1(perclos)));
                details.insert(
                    "perclos_range".into(),
                    json!(format!("{}-{}%", config.perclos_level1_min, config.perclos_level1_max)),
                );
            }
            Trigger::DrowsyState { state } => {
                details.insert("state".into(), json!(state.as_str()));
            }
            Trigger::Microsleep { count } => {
                details.insert("microsleep_count".into(), json!(count));
                details.insert("critical".into(), json!(true));
            }
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Active triggers, at most one per kind, in reporting order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TriggerSet(Vec<Trigger>);

impl TriggerSet {
    /// Add a trigger, replacing any existing one of the same kind
    pub fn insert(&mut self, trigger: Trigger) {
        let kind = trigger.kind();
        match self.0.binary_search_by_key(&kind, Trigger::kind) {
            Ok(idx) => self.0[idx] = trigger,
            Err(idx) => self.0.insert(idx, trigger),
        }
    }

    pub fn get(&self, kind: TriggerKind) -> Option<&Trigger> {
        self.0.iter().find(|t| t.kind() == kind)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Trigger> {
        self.0.iter()
    }
}

impl FromIterator<Trigger> for TriggerSet {
    fn from_iter<I: IntoIterator<Item = Trigger>>(iter: I) -> Self {
        let mut set = TriggerSet::default();
        for trigger in iter {
            set.insert(trigger);
        }
        set
    }
}

impl fmt::Display for TriggerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("drowsiness symptoms");
        }
        for (i, trigger) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" + ")?;
            }
            f.write_str(trigger.label())?;
        }
        Ok(())
    }
}

/// Why an alert level was raised
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlertReason {
    /// Level 1: every trigger active when it fired
    Symptoms { triggers: TriggerSet },
    /// Level 2: the Level 1 condition outlasted the escalation delay
    PersistentSymptoms { trigger: Trigger },
    /// Level 2: too many Level 1 activations in the recurrence window
    FrequentRecurrence { count: usize, window_secs: f64 },
}

impl AlertReason {
    /// Key/value details for logging
    pub fn details(&self, config: &AlertConfig) -> AlertDetails {
        let mut details = AlertDetails::new();
        match self {
            AlertReason::Symptoms { triggers } => {
                for trigger in triggers.iter() {
                    trigger.add_details(config, &mut details);
                }
                if triggers.len() > 1 {
                    details.insert("symptoms".into(), json!("multiple"));
                }
            }
            AlertReason::PersistentSymptoms { trigger } => {
                trigger.add_details(config, &mut details);
                details.insert("symptoms".into(), json!("persistent"));
                details.insert(
                    "message".into(),
                    json!("Driver unresponsive to Level 1 warnings - Immediate attention required!"),
                );
            }
            AlertReason::FrequentRecurrence { count, window_secs } => {
                let window_minutes = round1(window_secs / 60.0);
                details.insert("level1_alert_count".into(), json!(count));
                details.insert("window_minutes".into(), json!(window_minutes));
                details.insert("threshold".into(), json!(config.level1_frequency_threshold));
                details.insert(
                    "message".into(),
                    json!(format!(
                        "Level 1 alerts triggered {count} times in last {window_minutes} minutes. \
                         Driver repeatedly becoming drowsy - Immediate attention required!"
                    )),
                );
            }
        }
        details
    }
}

impl fmt::Display for AlertReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertReason::Symptoms { triggers } => write!(f, "{triggers}"),
            AlertReason::PersistentSymptoms { trigger } => write!(f, "persistent symptoms ({trigger})"),
            AlertReason::FrequentRecurrence { .. } => f.write_str("frequent level1 recurrence"),
        }
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_renders_in_precedence_order() {
        let set: TriggerSet = [
            Trigger::DrowsyState { state: DriverState::Drowsy },
            Trigger::Perclos { perclos: 22.0 },
            Trigger::YawnFrequency { yawns: 3 },
        ]
        .into_iter()
        .collect();

        assert_eq!(set.to_string(), "yawn frequency + high PERCLOS + drowsiness symptoms");
    }

    #[test]
    fn test_insert_replaces_same_kind() {
        let mut set = TriggerSet::default();
        set.insert(Trigger::BlinkRate { rate: 31.0 });
        set.insert(Trigger::BlinkRate { rate: 35.0 });

        assert_eq!(set.len(), 1);
        assert_eq!(set.get(TriggerKind::BlinkRate), Some(&Trigger::BlinkRate { rate: 35.0 }));
    }

    #[test]
    fn test_microsleep_reason() {
        let reason = AlertReason::Symptoms {
            triggers: [Trigger::Microsleep { count: 1 }].into_iter().collect(),
        };
        assert_eq!(reason.to_string(), "microsleep event");

        let details = reason.details(&AlertConfig::default());
        assert_eq!(details["microsleep_count"], json!(1));
        assert_eq!(details["critical"], json!(true));
    }

    #[test]
    fn test_recurrence_details() {
        let reason = AlertReason::FrequentRecurrence { count: 3, window_secs: 300.0 };
        assert_eq!(reason.to_string(), "frequent level1 recurrence");

        let details = reason.details(&AlertConfig::default());
        assert_eq!(details["level1_alert_count"], json!(3));
        assert_eq!(details["window_minutes"], json!(5.0));
        assert_eq!(details["threshold"], json!(3));
    }

    #[test]
    fn test_conjunction_marks_multiple() {
        let reason = AlertReason::Symptoms {
            triggers: [
                Trigger::YawnFrequency { yawns: 3 },
                Trigger::DrowsyState { state: DriverState::SlightlyDrowsy },
            ]
            .into_iter()
            .collect(),
        };
        let details = reason.details(&AlertConfig::default());
        assert_eq!(details["symptoms"], json!("multiple"));
        assert_eq!(details["state"], json!("SLIGHTLY_DROWSY"));
        assert_eq!(details["yawn_frequency"], json!(3));
    }
}
