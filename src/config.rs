//! Environment configuration

use crate::llm::LlmConfig;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_ADVICE_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: invalid value {value:?} ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: &'static str,
    },
    #[error("TRIAGE_ADVICE_BACKEND=llm needs ANTHROPIC_API_KEY or LLM_GATEWAY")]
    MissingLlm,
}

/// Which `AdviceGenerator` to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdviceBackend {
    #[default]
    Template,
    Llm,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub port: u16,
    /// Offer the optional image step after the last question
    pub image_step: bool,
    /// Root the image classifier may read from
    pub image_dir: PathBuf,
    pub advice_backend: AdviceBackend,
    /// Deadline for each LLM collaborator call
    pub advice_timeout: Duration,
    pub llm: LlmConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let db_path = get("TRIAGE_DB_PATH").map_or_else(
            || {
                let home = get("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(home).join(".triage-intake").join("intake.db")
            },
            PathBuf::from,
        );

        let port = match get("TRIAGE_PORT") {
            Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
                var: "TRIAGE_PORT",
                value,
                reason: "expected a port number",
            })?,
            None => DEFAULT_PORT,
        };

        let image_step = match get("TRIAGE_IMAGE_STEP") {
            Some(value) => parse_bool(&value).ok_or(ConfigError::Invalid {
                var: "TRIAGE_IMAGE_STEP",
                value,
                reason: "expected true or false",
            })?,
            None => false,
        };

        let image_dir = get("TRIAGE_IMAGE_DIR").map_or_else(|| PathBuf::from("/tmp"), PathBuf::from);

        let advice_backend = match get("TRIAGE_ADVICE_BACKEND") {
            Some(value) => match value.trim().to_lowercase().as_str() {
                "template" => AdviceBackend::Template,
                "llm" => AdviceBackend::Llm,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "TRIAGE_ADVICE_BACKEND",
                        value,
                        reason: "expected template or llm",
                    })
                }
            },
            None => AdviceBackend::Template,
        };

        let advice_timeout = match get("TRIAGE_ADVICE_TIMEOUT_SECS") {
            Some(value) => match value.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "TRIAGE_ADVICE_TIMEOUT_SECS",
                        value,
                        reason: "expected a positive number of seconds",
                    })
                }
            },
            None => DEFAULT_ADVICE_TIMEOUT,
        };

        let llm = LlmConfig {
            anthropic_api_key: get("ANTHROPIC_API_KEY"),
            gateway: get("LLM_GATEWAY"),
            model: get("TRIAGE_MODEL"),
        };
        if advice_backend == AdviceBackend::Llm && !llm.is_available() {
            return Err(ConfigError::MissingLlm);
        }

        Ok(Self {
            db_path,
            port,
            image_step,
            image_dir,
            advice_backend,
            advice_timeout,
            llm,
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
