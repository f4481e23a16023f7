use std::fmt;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::error::RecapError;
use crate::models::session::Credential;

/// Env var holding the service-account login id (email).
pub const LOGIN_ID_ENV: &str = "API_LOGIN_ID";
/// Env var holding the service-account password.
pub const LOGIN_PW_ENV: &str = "API_LOGIN_PW";
/// Env var holding the language-model API key.
pub const LLM_API_KEY_ENV: &str = "OPENAI_API_KEY";
/// Env var overriding `[backend] base_url`.
pub const BASE_URL_ENV: &str = "API_BASE_URL";

#[derive(Debug, Deserialize, Clone)]
pub struct RecapConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    pub backend: BackendConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    #[serde(default = "default_backend_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_search_limit")]
    pub search_limit: u32,
    #[serde(default = "default_detail_concurrency")]
    pub detail_concurrency: usize,
}

fn default_backend_timeout() -> u64 {
    10
}

fn default_search_limit() -> u32 {
    50
}

fn default_detail_concurrency() -> usize {
    4
}

impl BackendConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_seconds: default_backend_timeout(),
            search_limit: default_search_limit(),
            detail_concurrency: default_detail_concurrency(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub extraction_model: String,
    pub synthesis_model: String,
    pub timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            extraction_model: "gpt-4o".to_string(),
            synthesis_model: "gpt-4o-mini".to_string(),
            timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

impl RecapConfig {
    /// Load from a TOML file, then apply `RECAP__SECTION__KEY` overrides and
    /// `API_BASE_URL`.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("RECAP").separator("__"))
            .set_override_option("backend.base_url", std::env::var(BASE_URL_ENV).ok())?
            .build()?;
        s.try_deserialize()
    }
}

/// Secrets read from the environment at startup. Never part of the config file.
#[derive(Clone)]
pub struct Secrets {
    pub credential: Credential,
    pub llm_api_key: String,
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("credential", &self.credential)
            .field("llm_api_key", &"<redacted>")
            .finish()
    }
}

impl Secrets {
    pub fn from_env() -> Result<Self, RecapError> {
        let email = required_env(LOGIN_ID_ENV)?;
        let password = required_env(LOGIN_PW_ENV)?;
        let llm_api_key = required_env(LLM_API_KEY_ENV)?;

        Ok(Self {
            credential: Credential::new(email, password),
            llm_api_key,
        })
    }
}

fn required_env(name: &'static str) -> Result<String, RecapError> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(RecapError::MissingEnv(name)),
    }
}
