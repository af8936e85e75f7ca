use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::quiz::chunker::DEFAULT_CHUNK_SIZE;

pub const DEFAULT_TRANSCRIPT_LANGUAGE: &str = "en";
pub const DEFAULT_CHATGPT_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{var} has an invalid value: {value:?}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub chatgpt_api_key: String,
    pub chunk_size: usize,
    pub transcript_language: String,
    pub chatgpt_timeout: Duration,
}

impl Config {
    /// Reads the process environment. The bot token itself is picked up by
    /// `Bot::from_env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let chatgpt_api_key = lookup("CHATGPT_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::Missing("CHATGPT_API_KEY"))?;

        let chunk_size = parse_or(&lookup, "QUIZ_CHUNK_SIZE", DEFAULT_CHUNK_SIZE)?;
        if chunk_size == 0 {
            return Err(ConfigError::Invalid {
                var: "QUIZ_CHUNK_SIZE",
                value: "0".to_string(),
            });
        }

        let transcript_language = lookup("QUIZ_TRANSCRIPT_LANGUAGE")
            .map(|lang| lang.trim().to_string())
            .filter(|lang| !lang.is_empty())
            .unwrap_or_else(|| DEFAULT_TRANSCRIPT_LANGUAGE.to_string());

        let timeout_secs = parse_or(&lookup, "CHATGPT_TIMEOUT_SECS", DEFAULT_CHATGPT_TIMEOUT_SECS)?;

        Ok(Self {
            chatgpt_api_key,
            chunk_size,
            transcript_language,
            chatgpt_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn defaults_apply_when_only_key_is_set() {
        let config = config_from(&[("CHATGPT_API_KEY", "sk-test")]).unwrap();
        assert_eq!(config.chatgpt_api_key, "sk-test");
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.transcript_language, "en");
        assert_eq!(config.chatgpt_timeout, Duration::from_secs(15));
    }

    #[test]
    fn api_key_is_required() {
        assert_eq!(
            config_from(&[]).unwrap_err(),
            ConfigError::Missing("CHATGPT_API_KEY")
        );
        assert_eq!(
            config_from(&[("CHATGPT_API_KEY", "  ")]).unwrap_err(),
            ConfigError::Missing("CHATGPT_API_KEY")
        );
    }

    #[test]
    fn overrides_are_parsed() {
        let config = config_from(&[
            ("CHATGPT_API_KEY", "sk-test"),
            ("QUIZ_CHUNK_SIZE", " 3000 "),
            ("QUIZ_TRANSCRIPT_LANGUAGE", "de"),
            ("CHATGPT_TIMEOUT_SECS", "30"),
        ])
        .unwrap();
        assert_eq!(config.chunk_size, 3000);
        assert_eq!(config.transcript_language, "de");
        assert_eq!(config.chatgpt_timeout, Duration::from_secs(30));
    }

    #[test]
    fn invalid_chunk_size_is_rejected() {
        assert_eq!(
            config_from(&[("CHATGPT_API_KEY", "sk-test"), ("QUIZ_CHUNK_SIZE", "lots")])
                .unwrap_err(),
            ConfigError::Invalid {
                var: "QUIZ_CHUNK_SIZE",
                value: "lots".to_string()
            }
        );
        assert!(config_from(&[("CHATGPT_API_KEY", "sk-test"), ("QUIZ_CHUNK_SIZE", "0")]).is_err());
    }
}
