use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::metrics::SlaPolicy;
use crate::source::FetchPolicy;

/// Environment variable overriding `fetch_timeout_secs`.
pub const FETCH_TIMEOUT_ENV: &str = "OPSMETRICS_FETCH_TIMEOUT_SECS";

/// Runtime settings, read from JSON. Missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub standard_hours_per_day: f64,
    pub fetch_timeout_secs: u64,
    pub top_n: usize,
    pub sla: SlaPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            standard_hours_per_day: 8.0,
            fetch_timeout_secs: 30,
            top_n: 10,
            sla: SlaPolicy::default(),
        }
    }
}

impl Settings {
    /// The default config path (`~/.opsmetrics/config.json`).
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".opsmetrics").join("config.json"))
    }

    /// Load settings from `path`, else the default path when that file
    /// exists, else defaults. The timeout env override applies last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(p) => Self::from_file(p)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(p) => Self::from_file(&p)?,
                None => Self::default(),
            },
        };
        if let Ok(raw) = std::env::var(FETCH_TIMEOUT_ENV) {
            settings.apply_timeout_override(&raw)?;
        }
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        let settings: Settings = serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("invalid config {}: {e}", path.display())))?;
        log::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    fn apply_timeout_override(&mut self, raw: &str) -> Result<()> {
        self.fetch_timeout_secs = raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{FETCH_TIMEOUT_ENV} must be a whole number of seconds, got {raw:?}")))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.standard_hours_per_day > 0.0 && self.standard_hours_per_day <= 24.0) {
            return Err(Error::Config(format!(
                "standard_hours_per_day must be in (0, 24], got {}",
                self.standard_hours_per_day
            )));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(Error::Config("fetch_timeout_secs must be at least 1".into()));
        }
        let sla = &self.sla;
        for (name, hours) in [
            ("critical", sla.critical_hours),
            ("high", sla.high_hours),
            ("medium", sla.medium_hours),
            ("low", sla.low_hours),
        ] {
            if !(hours.is_finite() && hours > 0.0) {
                return Err(Error::Config(format!("sla.{name}_hours must be positive, got {hours}")));
            }
        }
        Ok(())
    }

    pub fn fetch_policy(&self) -> FetchPolicy {
        FetchPolicy::from_secs(self.fetch_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.standard_hours_per_day, 8.0);
        assert_eq!(s.fetch_timeout_secs, 30);
        assert_eq!(s.top_n, 10);
        assert_eq!(s.sla.critical_hours, 4.0);
        assert!(s.validate().is_ok());
        assert_eq!(s.fetch_policy(), FetchPolicy::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let file = write_config(r#"{"standard_hours_per_day": 7.5, "sla": {"high_hours": 6}}"#);
        let s = Settings::from_file(file.path()).unwrap();
        assert_eq!(s.standard_hours_per_day, 7.5);
        assert_eq!(s.sla.high_hours, 6.0);
        assert_eq!(s.sla.low_hours, 48.0);
        assert_eq!(s.top_n, 10);
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let file = write_config("{not json");
        assert!(matches!(Settings::from_file(file.path()), Err(Error::Config(_))));
        let missing = Settings::from_file(Path::new("/nonexistent/opsmetrics.json"));
        assert!(matches!(missing, Err(Error::Config(_))));
    }

    #[test]
    fn test_validation() {
        let file = write_config(r#"{"standard_hours_per_day": 0}"#);
        assert!(Settings::load(Some(file.path())).is_err());

        let s = Settings {
            sla: SlaPolicy {
                low_hours: -1.0,
                ..SlaPolicy::default()
            },
            ..Settings::default()
        };
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_timeout_override_parsing() {
        let mut s = Settings::default();
        s.apply_timeout_override(" 5 ").unwrap();
        assert_eq!(s.fetch_timeout_secs, 5);
        assert!(s.apply_timeout_override("soon").is_err());
    }
}
