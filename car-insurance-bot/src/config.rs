use intake_flow::{IntakeSettings, Price};
use std::path::PathBuf;
use thiserror::Error;

use crate::telemetry::LogFormat;

pub const DEFAULT_LLM_MODEL: &str = "openai/gpt-4o-mini";
pub const DEFAULT_OCR_MODEL: &str = "openai/gpt-4.1-mini";
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

/// How updates reach the bot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelegramMode {
    /// Long-poll `getUpdates`
    Polling,
    /// Telegram posts updates to `/telegram/webhook`
    Webhook,
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub telegram_token: String,
    pub openrouter_api_key: String,
    pub llm_model: String,
    pub ocr_model: String,
    pub mode: TelegramMode,
    /// Expected `X-Telegram-Bot-Api-Secret-Token`; required in webhook mode
    pub webhook_secret: Option<String>,
    pub port: u16,
    pub log_format: LogFormat,
    pub intake: IntakeSettings,
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let mode = match get("TELEGRAM_MODE").as_deref() {
            None | Some("polling") => TelegramMode::Polling,
            Some("webhook") => TelegramMode::Webhook,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "TELEGRAM_MODE",
                    value: other.to_string(),
                });
            }
        };

        let webhook_secret = match mode {
            TelegramMode::Webhook => Some(required("TELEGRAM_WEBHOOK_SECRET")?),
            TelegramMode::Polling => None,
        };

        let log_format = match get("LOG_FORMAT").as_deref() {
            Some("pretty") => LogFormat::Pretty,
            _ => LogFormat::Json,
        };

        let port = parse_or("PORT", get("PORT"), DEFAULT_PORT)?;

        let defaults = IntakeSettings::default();
        let price = Price {
            amount: parse_or("POLICY_PRICE", get("POLICY_PRICE"), defaults.price.amount)?,
            currency: get("POLICY_CURRENCY").unwrap_or(defaults.price.currency),
        };
        let intake = IntakeSettings {
            price,
            documents_dir: get("DOCUMENTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.documents_dir),
            notify_issuance_failure: parse_or(
                "NOTIFY_ISSUANCE_FAILURE",
                get("NOTIFY_ISSUANCE_FAILURE"),
                defaults.notify_issuance_failure,
            )?,
        };

        Ok(Self {
            telegram_token: required("TELEGRAM_BOT_TOKEN")?,
            openrouter_api_key: required("OPENROUTER_API_KEY")?,
            llm_model: get("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            ocr_model: get("OCR_MODEL").unwrap_or_else(|| DEFAULT_OCR_MODEL.to_string()),
            mode,
            webhook_secret,
            port,
            log_format,
            intake,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    key: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_secrets_are_set() {
        let config = BotConfig::from_lookup(lookup(&[
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
            ("OPENROUTER_API_KEY", "sk-test"),
        ]))
        .unwrap();

        assert_eq!(config.mode, TelegramMode::Polling);
        assert_eq!(config.webhook_secret, None);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.llm_model, DEFAULT_LLM_MODEL);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.intake.price.to_string(), "100 USD");
        assert!(!config.intake.notify_issuance_failure);
    }

    #[test]
    fn missing_token_is_reported() {
        let err = BotConfig::from_lookup(lookup(&[("OPENROUTER_API_KEY", "sk-test")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("TELEGRAM_BOT_TOKEN"));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = BotConfig::from_lookup(lookup(&[
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
            ("OPENROUTER_API_KEY", "sk-test"),
            ("TELEGRAM_MODE", "webhook"),
            ("TELEGRAM_WEBHOOK_SECRET", "s3cret"),
            ("PORT", "8080"),
            ("POLICY_PRICE", "250"),
            ("POLICY_CURRENCY", "EUR"),
            ("DOCUMENTS_DIR", "/tmp/policies"),
            ("NOTIFY_ISSUANCE_FAILURE", "true"),
            ("LOG_FORMAT", "pretty"),
        ]))
        .unwrap();

        assert_eq!(config.mode, TelegramMode::Webhook);
        assert_eq!(config.webhook_secret.as_deref(), Some("s3cret"));
        assert_eq!(config.port, 8080);
        assert_eq!(config.intake.price.to_string(), "250 EUR");
        assert_eq!(config.intake.documents_dir, PathBuf::from("/tmp/policies"));
        assert!(config.intake.notify_issuance_failure);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn webhook_mode_requires_a_secret() {
        let err = BotConfig::from_lookup(lookup(&[
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
            ("OPENROUTER_API_KEY", "sk-test"),
            ("TELEGRAM_MODE", "webhook"),
        ]))
        .unwrap_err();
        assert_eq!(err, ConfigError::Missing("TELEGRAM_WEBHOOK_SECRET"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = BotConfig::from_lookup(lookup(&[
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
            ("OPENROUTER_API_KEY", "sk-test"),
            ("PORT", "eighty"),
        ]))
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: "PORT",
                value: "eighty".to_string()
            }
        );
    }
}
