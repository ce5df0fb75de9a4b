use anyhow::{Context, Result};
use extract::AnalyzerConfig;
use serde::{Deserialize, Serialize};

pub const ENV_BIND: &str = "TASK_ANALYZER_BIND";
pub const ENV_LOG_FORMAT: &str = "LOG_FORMAT";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    pub bind_addr: String,
    pub log_format: LogFormat,
    pub analyzer: AnalyzerConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            log_format: LogFormat::Text,
            analyzer: AnalyzerConfig::default(),
        }
    }
}

impl WebConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(bind) = lookup(ENV_BIND).filter(|v| !v.trim().is_empty()) {
            config.bind_addr = bind.trim().to_string();
        }

        config.log_format = match lookup(ENV_LOG_FORMAT).as_deref().map(str::trim) {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        config.analyzer =
            AnalyzerConfig::from_lookup(&lookup).context("Invalid analyzer configuration")?;

        Ok(config)
    }
}
