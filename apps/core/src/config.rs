//! Environment-driven pipeline configuration.

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;
use validator::Validate;

use crate::brain::few_shot::DEFAULT_MAX_EXAMPLES;
use crate::error::AppError;

pub const DEFAULT_PROVIDER_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_REASONING_MODEL: &str = "gpt-4o";
pub const DEFAULT_HISTORY_WINDOW: usize = 20;

/// Runtime settings for one pipeline instance.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PipelineConfig {
    /// Base URL of an OpenAI-compatible API (e.g. `https://api.openai.com/v1`).
    #[validate(url)]
    pub provider_base_url: String,
    #[serde(skip_serializing)]
    pub provider_api_key: Option<String>,
    #[validate(length(min = 1))]
    pub chat_model: String,
    /// Model used by the strategy analyzer.
    #[validate(length(min = 1))]
    pub reasoning_model: String,
    #[validate(range(min = 0.0, max = 2.0))]
    pub temperature: f32,
    #[validate(range(min = 1, max = 10))]
    pub max_examples: usize,
    /// Messages of history handed to the provider.
    #[validate(range(min = 1))]
    pub history_window: usize,
    #[validate(range(min = 1, max = 600))]
    pub request_timeout_secs: u64,

    #[validate(url)]
    pub scheduling_url: Option<String>,
    #[validate(url)]
    pub payment_url: Option<String>,
    #[validate(url)]
    pub notification_url: Option<String>,
    #[validate(url)]
    pub handoff_url: Option<String>,
    #[serde(skip_serializing)]
    pub webhook_token: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            provider_base_url: DEFAULT_PROVIDER_URL.to_string(),
            provider_api_key: None,
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            reasoning_model: DEFAULT_REASONING_MODEL.to_string(),
            temperature: 0.7,
            max_examples: DEFAULT_MAX_EXAMPLES,
            history_window: DEFAULT_HISTORY_WINDOW,
            request_timeout_secs: 60,
            scheduling_url: None,
            payment_url: None,
            notification_url: None,
            handoff_url: None,
            webhook_token: None,
        }
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parsed<T: FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match optional(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| AppError::Config(format!("{} has an invalid value: {:?}", key, raw))),
        None => Ok(default),
    }
}

impl PipelineConfig {
    /// Load from the process environment, after reading `.env` if present.
    pub fn from_env() -> Result<Self, AppError> {
        if dotenv::dotenv().is_ok() {
            info!("Loaded .env file");
        }

        let defaults = Self::default();
        let config = Self {
            provider_base_url: optional("LEADFLOW_PROVIDER_URL").unwrap_or(defaults.provider_base_url),
            provider_api_key: optional("LEADFLOW_API_KEY"),
            chat_model: optional("LEADFLOW_CHAT_MODEL").unwrap_or(defaults.chat_model),
            reasoning_model: optional("LEADFLOW_REASONING_MODEL").unwrap_or(defaults.reasoning_model),
            temperature: parsed("LEADFLOW_TEMPERATURE", defaults.temperature)?,
            max_examples: parsed("LEADFLOW_MAX_EXAMPLES", defaults.max_examples)?,
            history_window: parsed("LEADFLOW_HISTORY_WINDOW", defaults.history_window)?,
            request_timeout_secs: parsed("LEADFLOW_TIMEOUT_SECS", defaults.request_timeout_secs)?,
            scheduling_url: optional("LEADFLOW_SCHEDULING_URL"),
            payment_url: optional("LEADFLOW_PAYMENT_URL"),
            notification_url: optional("LEADFLOW_NOTIFICATION_URL"),
            handoff_url: optional("LEADFLOW_HANDOFF_URL"),
            webhook_token: optional("LEADFLOW_WEBHOOK_TOKEN"),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEYS: [&str; 6] = [
        "LEADFLOW_PROVIDER_URL",
        "LEADFLOW_TEMPERATURE",
        "LEADFLOW_MAX_EXAMPLES",
        "LEADFLOW_CHAT_MODEL",
        "LEADFLOW_PAYMENT_URL",
        "LEADFLOW_API_KEY",
    ];

    /// Every known key, unset unless overridden.
    fn vars(overrides: &[(&'static str, &'static str)]) -> Vec<(&'static str, Option<&'static str>)> {
        KEYS.iter()
            .map(|key| {
                let value = overrides.iter().find(|(k, _)| k == key).map(|(_, v)| *v);
                (*key, value)
            })
            .collect()
    }

    #[test]
    fn test_defaults_when_unset() {
        temp_env::with_vars(vars(&[]), || {
            let config = PipelineConfig::from_env().unwrap();
            assert_eq!(config.provider_base_url, DEFAULT_PROVIDER_URL);
            assert_eq!(config.max_examples, 2);
            assert_eq!(config.history_window, DEFAULT_HISTORY_WINDOW);
            assert!(config.payment_url.is_none());
        });
    }

    #[test]
    fn test_reads_overrides() {
        let overrides = [
            ("LEADFLOW_PROVIDER_URL", "http://localhost:8080/v1"),
            ("LEADFLOW_TEMPERATURE", "0.3"),
            ("LEADFLOW_PAYMENT_URL", "https://pay.example.com/checkout"),
        ];
        temp_env::with_vars(vars(&overrides), || {
            let config = PipelineConfig::from_env().unwrap();
            assert_eq!(config.provider_base_url, "http://localhost:8080/v1");
            assert!((config.temperature - 0.3).abs() < f32::EPSILON);
            assert_eq!(config.payment_url.as_deref(), Some("https://pay.example.com/checkout"));
        });
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        temp_env::with_vars(vars(&[("LEADFLOW_MAX_EXAMPLES", "50")]), || {
            assert!(matches!(PipelineConfig::from_env(), Err(AppError::Validation(_))));
        });
    }

    #[test]
    fn test_rejects_unparseable_values() {
        temp_env::with_vars(vars(&[("LEADFLOW_TEMPERATURE", "warm")]), || {
            assert!(matches!(PipelineConfig::from_env(), Err(AppError::Config(_))));
        });
    }

    #[test]
    fn test_rejects_bad_url() {
        temp_env::with_vars(vars(&[("LEADFLOW_PAYMENT_URL", "not a url")]), || {
            assert!(PipelineConfig::from_env().is_err());
        });
    }
}
