//! Layered settings: defaults, optional file, then `DMS__*` environment

use alerting::AlertConfig;
use config::{Config, Environment, File};
use dms::DmsConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;
use crate::MonitorError;

/// Session-level options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Seconds between driver state snapshots
    pub state_log_interval_secs: f64,
    /// Offline event log; no log when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            state_log_interval_secs: 5.0,
            log_path: None,
        }
    }
}

/// Everything a monitoring session needs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub dms: DmsConfig,
    pub alert: AlertConfig,
    pub session: SessionConfig,
}

impl Settings {
    /// Load defaults, overlay `path` (any format `config` understands),
    /// then `DMS__SECTION__KEY` environment variables, and validate
    pub fn load(path: Option<&Path>) -> Result<Self, MonitorError> {
        let defaults = Config::try_from(&Settings::default())?;
        let mut builder = Config::builder().add_source(defaults);

        if let Some(path) = path {
            info!("Loading settings from {}", path.display());
            builder = builder.add_source(File::from(path).required(true));
        }

        let settings: Settings = builder
            .add_source(
                Environment::with_prefix("DMS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), MonitorError> {
        self.dms
            .validate()
            .map_err(|e| MonitorError::Settings(e.to_string()))?;
        self.alert
            .validate()
            .map_err(|e| MonitorError::Settings(e.to_string()))?;

        let interval = self.session.state_log_interval_secs;
        if !(interval > 0.0) || !interval.is_finite() {
            return Err(MonitorError::Settings(format!(
                "state_log_interval_secs must be positive, got {interval}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_settings(contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("dms-settings-tests");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(format!("{}.toml", uuid::Uuid::new_v4()));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_defaults_load() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.session.state_log_interval_secs, 5.0);
        assert_eq!(settings.alert.level1_duration_secs, 3.0);
        assert_eq!(settings.dms.ear_closed_threshold, 0.16);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let path = write_settings(
            r#"
            [alert]
            level2_duration_secs = 8.0

            [alert.level1_tone]
            frequency_hz = 600
            duration_secs = 0.25
            interval_secs = 1.5

            [session]
            log_path = "/tmp/dms/events.jsonl"
            "#,
        );

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.alert.level2_duration_secs, 8.0);
        assert_eq!(settings.alert.level1_tone.frequency_hz, 600);
        // Untouched keys keep their defaults
        assert_eq!(settings.alert.level1_duration_secs, 3.0);
        assert_eq!(settings.session.log_path, Some(PathBuf::from("/tmp/dms/events.jsonl")));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_inverted_range_rejected() {
        let path = write_settings(
            r#"
            [dms]
            blink_min_secs = 0.9
            blink_max_secs = 0.8
            "#,
        );

        let err = Settings::load(Some(&path)).unwrap_err();
        assert!(matches!(err, MonitorError::Settings(_)));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let path = std::env::temp_dir().join("dms-settings-tests/does-not-exist.toml");
        assert!(Settings::load(Some(&path)).is_err());
    }
}
