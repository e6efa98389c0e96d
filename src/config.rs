//! Minimal runtime configuration helpers.
//! Every setting has a default, so an empty environment runs against a local API.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use crate::services::units::TemperatureUnit;

pub const DEFAULT_SOURCE_BASE_URL: &str = "http://localhost:8080/api";
pub const DEFAULT_REFRESH_SECS: u64 = 60;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_FETCH_WORKERS: usize = 8;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SourceMode {
    Http,
    /// Synthetic network generated locally.
    Fake,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub source_base_url: String,
    pub source_mode: SourceMode,
    /// Snapshot rebuild cadence.
    pub refresh_interval: Duration,
    /// Upper bound for a single HTTP call, connect to last byte.
    pub http_timeout: Duration,
    /// Concurrent device fetches per build.
    pub fetch_workers: NonZeroUsize,
    pub temperature_unit: TemperatureUnit,
    /// JSON rule table replacing the built-in greenhouse ideals.
    pub ideals_file: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let source_base_url = var("SOURCE_BASE_URL").unwrap_or_else(|| DEFAULT_SOURCE_BASE_URL.to_string());

        let source_mode = match var("SOURCE_MODE").as_deref() {
            None | Some("http") => SourceMode::Http,
            Some("fake") => SourceMode::Fake,
            Some(other) => return Err(format!("SOURCE_MODE must be `http` or `fake`, got `{}`", other)),
        };

        let refresh_secs = parse_positive(var("REFRESH_INTERVAL_SECS"), "REFRESH_INTERVAL_SECS")?
            .unwrap_or(DEFAULT_REFRESH_SECS);
        let http_timeout_secs =
            parse_positive(var("HTTP_TIMEOUT_SECS"), "HTTP_TIMEOUT_SECS")?.unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS);

        let fetch_workers = match parse_positive(var("FETCH_WORKERS"), "FETCH_WORKERS")? {
            Some(n) => NonZeroUsize::new(n as usize),
            None => NonZeroUsize::new(DEFAULT_FETCH_WORKERS),
        }
        .ok_or_else(|| "FETCH_WORKERS must be a positive integer".to_string())?;

        let temperature_unit = match var("TEMPERATURE_UNIT") {
            Some(s) => s.parse::<TemperatureUnit>()?,
            None => TemperatureUnit::default(),
        };

        Ok(Config {
            source_base_url,
            source_mode,
            refresh_interval: Duration::from_secs(refresh_secs),
            http_timeout: Duration::from_secs(http_timeout_secs),
            fetch_workers,
            temperature_unit,
            ideals_file: var("IDEALS_FILE").map(PathBuf::from),
        })
    }
}

fn parse_positive(value: Option<String>, key: &str) -> Result<Option<u64>, String> {
    match value {
        None => Ok(None),
        Some(s) => match s.parse::<u64>() {
            Ok(n) if n > 0 => Ok(Some(n)),
            _ => Err(format!("{} must be a positive integer, got `{}`", key, s)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_from_empty_environment() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.source_base_url, DEFAULT_SOURCE_BASE_URL);
        assert_eq!(cfg.source_mode, SourceMode::Http);
        assert_eq!(cfg.refresh_interval, Duration::from_secs(60));
        assert_eq!(cfg.fetch_workers.get(), DEFAULT_FETCH_WORKERS);
        assert_eq!(cfg.temperature_unit, TemperatureUnit::Celsius);
        assert!(cfg.ideals_file.is_none());
    }

    #[test]
    fn reads_overrides() {
        let cfg = config(&[
            ("SOURCE_MODE", "fake"),
            ("REFRESH_INTERVAL_SECS", "15"),
            ("FETCH_WORKERS", "2"),
            ("TEMPERATURE_UNIT", "fahrenheit"),
            ("IDEALS_FILE", " ideals.json "),
            ("HTTP_TIMEOUT_SECS", ""),
        ])
        .unwrap();
        assert_eq!(cfg.source_mode, SourceMode::Fake);
        assert_eq!(cfg.refresh_interval, Duration::from_secs(15));
        assert_eq!(cfg.http_timeout, Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS));
        assert_eq!(cfg.fetch_workers.get(), 2);
        assert_eq!(cfg.temperature_unit, TemperatureUnit::Fahrenheit);
        assert_eq!(cfg.ideals_file, Some(PathBuf::from("ideals.json")));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(config(&[("FETCH_WORKERS", "0")]).is_err());
        assert!(config(&[("REFRESH_INTERVAL_SECS", "soon")]).is_err());
        assert!(config(&[("SOURCE_MODE", "ftp")]).is_err());
        assert!(config(&[("TEMPERATURE_UNIT", "rankine")]).is_err());
    }
}
