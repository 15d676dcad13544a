use std::{io::ErrorKind, path::Path, time::Duration};

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::utils::dir::CONFIG_FILE_NAME;

/// Shell, search and input method hosts that own the foreground window without being something the
/// user works in.
pub const DEFAULT_APP_DENYLIST: [&str; 8] = [
    "explorer.exe",
    "SearchHost.exe",
    "SearchApp.exe",
    "ShellExperienceHost.exe",
    "StartMenuExperienceHost.exe",
    "TextInputHost.exe",
    "LockApp.exe",
    "ctfmon.exe",
];

/// Shortest interval and query timeout accepted. Anything below would keep the sampler spinning.
pub const MIN_INTERVAL_SECONDS: f64 = 0.01;

/// Sampling settings read from `config.json` in the application directory. Every field is
/// optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub interval_seconds: f64,
    pub idle_threshold_seconds: f64,
    pub query_timeout_seconds: f64,
    pub app_denylist: Vec<String>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 2.,
            idle_threshold_seconds: 300.,
            query_timeout_seconds: 1.,
            app_denylist: DEFAULT_APP_DENYLIST.iter().map(|app| app.to_string()).collect(),
        }
    }
}

impl SamplingConfig {
    /// Reads the config file from `dir`, falling back to defaults when there is none.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE_NAME);
        let config = match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text)
                .with_context(|| format!("Invalid config file {}", path.display()))?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No config at {}, using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };
        Ok(config)
    }

    /// Command line values win over the file.
    pub fn with_overrides(mut self, interval: Option<f64>, idle_threshold: Option<f64>) -> Self {
        if let Some(interval) = interval {
            self.interval_seconds = interval;
        }
        if let Some(idle_threshold) = idle_threshold {
            self.idle_threshold_seconds = idle_threshold;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.interval_seconds >= MIN_INTERVAL_SECONDS,
            "Interval must be at least {MIN_INTERVAL_SECONDS}s, got {}",
            self.interval_seconds
        );
        self.interval()?;
        ensure!(
            self.query_timeout_seconds >= MIN_INTERVAL_SECONDS,
            "Query timeout must be at least {MIN_INTERVAL_SECONDS}s, got {}",
            self.query_timeout_seconds
        );
        self.query_timeout()?;
        ensure!(
            self.idle_threshold_seconds.is_finite() && self.idle_threshold_seconds >= 0.,
            "Idle threshold can't be negative, got {}",
            self.idle_threshold_seconds
        );
        Ok(())
    }

    pub fn interval(&self) -> Result<Duration> {
        to_duration("Interval", self.interval_seconds)
    }

    pub fn query_timeout(&self) -> Result<Duration> {
        to_duration("Query timeout", self.query_timeout_seconds)
    }
}

fn to_duration(what: &str, seconds: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(seconds)
        .with_context(|| format!("{what} of {seconds}s is out of range"))
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = SamplingConfig::load(dir.path()).unwrap();
        assert_eq!(config, SamplingConfig::default());
        assert_eq!(config.interval().unwrap(), Duration::from_secs(2));
        assert!(config.app_denylist.iter().any(|app| app == "explorer.exe"));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"{ "interval_seconds": 5, "app_denylist": ["slack"] }"#,
        )
        .unwrap();
        let config = SamplingConfig::load(dir.path()).unwrap();
        assert_eq!(config.interval_seconds, 5.);
        assert_eq!(config.idle_threshold_seconds, 300.);
        assert_eq!(config.app_denylist, vec!["slack".to_string()]);
    }

    #[test]
    fn broken_file_is_an_error() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "{ interval").unwrap();
        assert!(SamplingConfig::load(dir.path()).is_err());
    }

    #[test]
    fn overrides_and_validation() {
        let config = SamplingConfig::default().with_overrides(Some(0.5), None);
        assert_eq!(config.interval_seconds, 0.5);
        assert!(config.validate().is_ok());

        assert!(SamplingConfig::default().with_overrides(Some(0.), None).validate().is_err());
        assert!(SamplingConfig::default().with_overrides(Some(-1.), None).validate().is_err());
        assert!(SamplingConfig::default()
            .with_overrides(None, Some(f64::NAN))
            .validate()
            .is_err());
        let no_timeout = SamplingConfig {
            query_timeout_seconds: 0.,
            ..SamplingConfig::default()
        };
        assert!(no_timeout.validate().is_err());
    }

    #[test]
    fn out_of_range_durations_are_rejected() {
        let huge = SamplingConfig::default().with_overrides(Some(1e30), None);
        assert!(huge.validate().is_err());
        assert!(huge.interval().is_err());

        let tiny = SamplingConfig::default().with_overrides(Some(1e-12), None);
        assert!(tiny.validate().is_err());

        let huge_timeout = SamplingConfig {
            query_timeout_seconds: 1e30,
            ..SamplingConfig::default()
        };
        assert!(huge_timeout.validate().is_err());

        let huge_threshold = SamplingConfig::default().with_overrides(None, Some(1e30));
        assert!(huge_threshold.validate().is_ok());
    }
}
