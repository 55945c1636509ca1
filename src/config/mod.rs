//! Application configuration

pub mod presets;

use std::env;

use serde::{Deserialize, Serialize};

pub use presets::{builtin as presets_builtin, AgentPreset, PresetError, PresetManager};

const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Completion backend: "ollama", "openai" or "remote"
    pub provider: String,
    /// Model name; empty means the provider's default
    pub model: String,
    pub ollama_url: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    /// Base URL of a running `agent-chat serve` instance
    pub remote_url: Option<String>,
    pub timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".into()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            provider: env::var("AGENT_CHAT_PROVIDER").unwrap_or_else(|_| "ollama".into()),
            model: env::var("AGENT_CHAT_MODEL").unwrap_or_default(),
            ollama_url: env::var("OLLAMA_URL").ok(),
            openai_api_key: env::var("OPENAI_API_KEY").ok(),
            openai_base_url: env::var("OPENAI_BASE_URL").ok(),
            remote_url: env::var("AGENT_CHAT_REMOTE_URL").ok(),
            timeout_secs: match env::var("AGENT_CHAT_TIMEOUT_SECS") {
                Ok(raw) => raw.parse().map_err(|e| {
                    anyhow::anyhow!("AGENT_CHAT_TIMEOUT_SECS must be a number of seconds: {e}")
                })?,
                Err(_) => DEFAULT_TIMEOUT_SECS,
            },
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3000,
            provider: "ollama".into(),
            model: String::new(),
            ollama_url: None,
            openai_api_key: None,
            openai_base_url: None,
            remote_url: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}
