use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::report::ReportFormat;
use crate::system::history::{ANALYSIS_CAPACITY, REPORT_CAPACITY};

pub const MIN_INTERVAL_SECS: u64 = 1;
pub const MAX_INTERVAL_SECS: u64 = 3600;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("interval must be between 1 and 3600 seconds, got {0}")]
    Interval(u64),
    #[error("{0} capacity must be greater than zero")]
    Capacity(&'static str),
    #[error("unknown report format `{0}` (expected `text` or `json`)")]
    ReportFormat(String),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub history: HistoryConfig,
    pub report: ReportConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub interval_secs: u64,
    /// Zero runs until interrupted.
    pub duration_secs: u64,
    pub show_top: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            interval_secs: 5,
            duration_secs: 0,
            show_top: 5,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub analysis_capacity: usize,
    pub report_capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        HistoryConfig {
            analysis_capacity: ANALYSIS_CAPACITY,
            report_capacity: REPORT_CAPACITY,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub format: String,
    /// Empty prints the report to stdout.
    pub output: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        ReportConfig {
            format: "text".to_string(),
            output: String::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Config {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.general.interval_secs)
    }

    pub fn duration(&self) -> Option<Duration> {
        let secs = self.general.duration_secs;
        (secs > 0).then(|| Duration::from_secs(secs))
    }

    pub fn output_path(&self) -> Option<PathBuf> {
        (!self.report.output.is_empty()).then(|| PathBuf::from(&self.report.output))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let interval = self.general.interval_secs;
        if !(MIN_INTERVAL_SECS..=MAX_INTERVAL_SECS).contains(&interval) {
            return Err(ConfigError::Interval(interval));
        }
        if self.history.analysis_capacity == 0 {
            return Err(ConfigError::Capacity("analysis history"));
        }
        if self.history.report_capacity == 0 {
            return Err(ConfigError::Capacity("report history"));
        }
        self.report_format().map(|_| ())
    }

    pub fn report_format(&self) -> Result<ReportFormat, ConfigError> {
        self.report.format.parse()
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("hostwatch").join("config.toml"))
}

/// Load the user config. A file that fails to parse yields the defaults
/// together with the parse error, so the caller can report it once logging
/// is up.
pub fn load_config() -> (Config, Option<toml::de::Error>) {
    match config_path() {
        Some(path) if path.exists() => load_config_from_path(&path),
        _ => (Config::default(), None),
    }
}

pub fn load_config_from_path(path: &Path) -> (Config, Option<toml::de::Error>) {
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => (config, None),
            Err(err) => (Config::default(), Some(err)),
        },
        Err(_) => (Config::default(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = Config::default();
        assert_eq!(config.general.interval_secs, 5);
        assert_eq!(config.duration(), None);
        assert_eq!(config.history.analysis_capacity, 1000);
        assert_eq!(config.history.report_capacity, 5000);
        assert_eq!(config.report.format, "text");
        assert_eq!(config.output_path(), None);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_partial_toml() {
        let toml_str = r#"
[general]
interval_secs = 30
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.interval(), Duration::from_secs(30));
        // Other fields should be defaults
        assert_eq!(config.general.show_top, 5);
        assert_eq!(config.history.analysis_capacity, 1000);
    }

    #[test]
    fn parse_full_toml() {
        let toml_str = r#"
[general]
interval_secs = 10
duration_secs = 600
show_top = 3

[history]
analysis_capacity = 200
report_capacity = 800

[report]
format = "json"
output = "/tmp/hostwatch.json"

[logging]
level = "debug"
json = true
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.duration(), Some(Duration::from_secs(600)));
        assert_eq!(config.general.show_top, 3);
        assert_eq!(config.history.analysis_capacity, 200);
        assert_eq!(config.history.report_capacity, 800);
        assert_eq!(config.report_format(), Ok(ReportFormat::Json));
        assert_eq!(
            config.output_path(),
            Some(PathBuf::from("/tmp/hostwatch.json"))
        );
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validation_rejects_out_of_range_values() {
        let mut config = Config::default();
        config.general.interval_secs = 0;
        assert_eq!(config.validate(), Err(ConfigError::Interval(0)));
        config.general.interval_secs = 3601;
        assert_eq!(config.validate(), Err(ConfigError::Interval(3601)));
        config.general.interval_secs = 3600;
        assert!(config.validate().is_ok());

        config.history.report_capacity = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::Capacity("report history"))
        );
        config.history.report_capacity = 1;

        config.report.format = "html".to_string();
        assert_eq!(
            config.validate(),
            Err(ConfigError::ReportFormat("html".to_string()))
        );
    }

    #[test]
    fn missing_file_returns_default() {
        let (config, err) = load_config_from_path(Path::new("/nonexistent/path/config.toml"));
        assert_eq!(config.general.interval_secs, 5);
        assert!(err.is_none());
    }

    #[test]
    fn valid_file_loads_without_error() {
        let temp = std::env::temp_dir().join("hostwatch_test_valid.toml");
        std::fs::write(&temp, "[general]\ninterval_secs = 9\n").unwrap();
        let (config, err) = load_config_from_path(&temp);
        let _ = std::fs::remove_file(&temp);
        assert_eq!(config.general.interval_secs, 9);
        assert!(err.is_none());
    }

    #[test]
    fn invalid_toml_returns_default() {
        let temp = std::env::temp_dir().join("hostwatch_test_invalid.toml");
        std::fs::write(&temp, "this is not valid toml {{{{").unwrap();
        let (config, err) = load_config_from_path(&temp);
        let _ = std::fs::remove_file(&temp);
        assert_eq!(config.general.interval_secs, 5);
        assert!(err.is_some(), "parse error should be reported to the caller");
    }
}
