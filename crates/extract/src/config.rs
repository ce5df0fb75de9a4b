use serde::{Deserialize, Serialize};

use crate::error::{AnalyzeError, Result};

pub const DEFAULT_API_BASE: &str = "https://task-analyzer-api.onrender.com";
pub const DEFAULT_TEMPERATURE: f64 = 0.9;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub const ENV_API_BASE: &str = "TASK_ANALYZER_API_BASE";
pub const ENV_TEMPERATURE: &str = "TASK_ANALYZER_TEMPERATURE";
pub const ENV_TIMEOUT_SECS: &str = "TASK_ANALYZER_TIMEOUT_SECS";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalyzerConfig {
    pub base_url: String,
    pub temperature: f64,
    pub request_timeout_secs: u64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl AnalyzerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from a key lookup; unset or blank keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(base_url) = get(ENV_API_BASE) {
            config.base_url = base_url;
        }

        if let Some(raw) = get(ENV_TEMPERATURE) {
            config.temperature = raw.parse().map_err(|_| {
                AnalyzeError::InvalidConfig(format!("{} is not a number: {}", ENV_TEMPERATURE, raw))
            })?;
        }

        if let Some(raw) = get(ENV_TIMEOUT_SECS) {
            config.request_timeout_secs = raw.parse().map_err(|_| {
                AnalyzeError::InvalidConfig(format!(
                    "{} is not a whole number of seconds: {}",
                    ENV_TIMEOUT_SECS, raw
                ))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(AnalyzeError::InvalidConfig(format!(
                "base URL must start with http:// or https://: {}",
                self.base_url
            )));
        }
        if !self.temperature.is_finite() {
            return Err(AnalyzeError::InvalidConfig(
                "temperature must be a finite number".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(AnalyzeError::InvalidConfig(
                "request timeout must be at least one second".to_string(),
            ));
        }
        Ok(())
    }

    /// Full URL of the analysis endpoint.
    pub fn endpoint(&self) -> String {
        format!("{}/analyze", self.base_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = AnalyzerConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, AnalyzerConfig::default());
        assert_eq!(config.endpoint(), "https://task-analyzer-api.onrender.com/analyze");
    }

    #[test]
    fn test_overrides_from_lookup() {
        let config = AnalyzerConfig::from_lookup(lookup_from(&[
            (ENV_API_BASE, "http://localhost:5000/"),
            (ENV_TEMPERATURE, "0.2"),
            (ENV_TIMEOUT_SECS, "5"),
        ]))
        .unwrap();
        assert_eq!(config.endpoint(), "http://localhost:5000/analyze");
        assert_eq!(config.temperature, 0.2);
        assert_eq!(config.request_timeout_secs, 5);
    }

    #[test]
    fn test_blank_values_keep_defaults() {
        let config = AnalyzerConfig::from_lookup(lookup_from(&[(ENV_API_BASE, "  ")])).unwrap();
        assert_eq!(config.base_url, DEFAULT_API_BASE);
    }

    #[test]
    fn test_rejects_bad_values() {
        let err = AnalyzerConfig::from_lookup(lookup_from(&[(ENV_TEMPERATURE, "warm")]))
            .unwrap_err();
        assert_eq!(err.kind(), "config");

        let err =
            AnalyzerConfig::from_lookup(lookup_from(&[(ENV_API_BASE, "localhost:5000")]))
                .unwrap_err();
        assert_eq!(err.kind(), "config");

        let err = AnalyzerConfig::from_lookup(lookup_from(&[(ENV_TIMEOUT_SECS, "0")])).unwrap_err();
        assert_eq!(err.kind(), "config");
    }
}
