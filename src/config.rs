use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;

/// Top-level configuration for a reconciliation run.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Logging verbosity (trace, debug, info, warn, error). Default: "info".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Input table locations.
    #[serde(default)]
    pub input: InputConfig,

    /// Output table locations and formatting.
    #[serde(default)]
    pub output: OutputConfig,

    /// Install-cohort cutoff: units whose earliest surviving interval
    /// starts strictly before this instant are the early batch.
    /// Default: 2016-01-01T00:00:00.
    #[serde(default = "default_batch_cutoff")]
    pub batch_cutoff: NaiveDateTime,
}

/// Input table locations.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InputConfig {
    /// Inventory history table (CSV). Required.
    #[serde(default)]
    pub history: PathBuf,

    /// Service-slot reference table (CSV). Optional; nothing is filtered
    /// when omitted.
    #[serde(default)]
    pub service_slots: Option<PathBuf>,
}

/// Output table locations and formatting.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Per-interval output table (CSV). Required.
    #[serde(default)]
    pub intervals: PathBuf,

    /// Per-unit lifetime output table (CSV). Required.
    #[serde(default)]
    pub lifetimes: PathBuf,

    /// Serialization of missing values in output tables. Default: "NA".
    #[serde(default = "default_null_marker")]
    pub null_marker: String,
}

// --- Default value functions ---

fn default_log_level() -> String {
    "info".to_string()
}

fn default_null_marker() -> String {
    "NA".to_string()
}

fn default_batch_cutoff() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2016, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            input: InputConfig::default(),
            output: OutputConfig::default(),
            batch_cutoff: default_batch_cutoff(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            intervals: PathBuf::new(),
            lifetimes: PathBuf::new(),
            null_marker: default_null_marker(),
        }
    }
}

impl Config {
    /// Load and validate a YAML configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;

        let cfg: Config = serde_yaml::from_str(&data)
            .with_context(|| format!("parsing config file {}", path.display()))?;

        cfg.validate()?;

        Ok(cfg)
    }

    /// Validate configuration invariants.
    pub fn validate(&self) -> Result<()> {
        if self.input.history.as_os_str().is_empty() {
            bail!("input.history is required");
        }
        if self.output.intervals.as_os_str().is_empty() {
            bail!("output.intervals is required");
        }
        if self.output.lifetimes.as_os_str().is_empty() {
            bail!("output.lifetimes is required");
        }
        if self.output.intervals == self.output.lifetimes {
            bail!("output.intervals and output.lifetimes must be different files");
        }
        if self.output.null_marker.is_empty() {
            bail!("output.null_marker must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_yaml() -> &'static str {
        "input:\n  history: data/history.csv\noutput:\n  intervals: out/intervals.csv\n  lifetimes: out/lifetimes.csv\n"
    }

    #[test]
    fn test_defaults_applied() {
        let cfg: Config = serde_yaml::from_str(valid_yaml()).expect("config parses");
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.output.null_marker, "NA");
        assert_eq!(
            cfg.batch_cutoff,
            NaiveDate::from_ymd_opt(2016, 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .expect("valid cutoff")
        );
        assert!(cfg.input.service_slots.is_none());
        cfg.validate().expect("valid config");
    }

    #[test]
    fn test_explicit_values_override_defaults() {
        let yaml = "log_level: debug\n\
                    input:\n  history: h.csv\n  service_slots: s.csv\n\
                    output:\n  intervals: i.csv\n  lifetimes: l.csv\n  null_marker: \"\\\\N\"\n\
                    batch_cutoff: \"2015-06-15T12:00:00\"\n";
        let cfg: Config = serde_yaml::from_str(yaml).expect("config parses");
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.output.null_marker, "\\N");
        assert_eq!(
            cfg.input.service_slots.as_deref(),
            Some(Path::new("s.csv"))
        );
        assert_eq!(
            cfg.batch_cutoff,
            NaiveDate::from_ymd_opt(2015, 6, 15)
                .and_then(|d| d.and_hms_opt(12, 0, 0))
                .expect("valid cutoff")
        );
    }

    #[test]
    fn test_validate_requires_paths() {
        let cfg: Config = serde_yaml::from_str("{}").expect("empty config parses");
        let err = cfg.validate().expect_err("history is required");
        assert!(err.to_string().contains("input.history"));

        let cfg: Config =
            serde_yaml::from_str("input:\n  history: h.csv\n").expect("config parses");
        let err = cfg.validate().expect_err("intervals is required");
        assert!(err.to_string().contains("output.intervals"));
    }

    #[test]
    fn test_validate_rejects_colliding_outputs() {
        let yaml = "input:\n  history: h.csv\noutput:\n  intervals: same.csv\n  lifetimes: same.csv\n";
        let cfg: Config = serde_yaml::from_str(yaml).expect("config parses");
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_null_marker() {
        let yaml = "input:\n  history: h.csv\noutput:\n  intervals: i.csv\n  lifetimes: l.csv\n  null_marker: \"\"\n";
        let cfg: Config = serde_yaml::from_str(yaml).expect("config parses");
        assert!(cfg.validate().is_err());
    }
}
