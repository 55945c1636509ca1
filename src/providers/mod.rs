//! Completion transports
//!
//! Every transport is stateless: the caller hands over the system prompt and
//! the whole transcript on each turn and gets back the next assistant message.

mod ollama;
mod openai_compat;
mod remote;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;

use crate::config::Config;
use crate::conversation::Message;

pub use ollama::OllamaProvider;
pub use openai_compat::{OpenAICompatConfig, OpenAICompatProvider};
pub use remote::RemoteProvider;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Error message reported by the service itself
    #[error("{0}")]
    Api(String),

    /// Opaque failure carrying only a message
    #[error("{0}")]
    Transport(String),
}

/// Produces the next assistant reply for a conversation
#[async_trait]
pub trait CompletionTransport: Send + Sync {
    async fn send_chat_turn(
        &self,
        system_prompt: &str,
        transcript: &[Message],
    ) -> Result<Message, ProviderError>;
}

#[async_trait]
impl<T: CompletionTransport + ?Sized> CompletionTransport for Arc<T> {
    async fn send_chat_turn(
        &self,
        system_prompt: &str,
        transcript: &[Message],
    ) -> Result<Message, ProviderError> {
        (**self).send_chat_turn(system_prompt, transcript).await
    }
}

#[async_trait]
impl<T: CompletionTransport + ?Sized> CompletionTransport for Box<T> {
    async fn send_chat_turn(
        &self,
        system_prompt: &str,
        transcript: &[Message],
    ) -> Result<Message, ProviderError> {
        (**self).send_chat_turn(system_prompt, transcript).await
    }
}

pub enum Provider {
    Ollama(OllamaProvider),
    OpenAICompat(OpenAICompatProvider),
    Remote(RemoteProvider),
}

impl Provider {
    pub fn from_config(config: &Config) -> Result<Self, ProviderError> {
        let client = http_client(config.timeout_secs)?;

        match config.provider.to_lowercase().as_str() {
            "ollama" => {
                let url = config
                    .ollama_url
                    .clone()
                    .unwrap_or_else(|| "http://localhost:11434".into());
                Ok(Provider::Ollama(OllamaProvider::with_client(
                    client,
                    url,
                    &config.model,
                )))
            }
            "openai" => {
                let mut openai = match &config.openai_base_url {
                    Some(base_url) => OpenAICompatConfig::local(base_url.clone(), "gpt-4o-mini"),
                    None => {
                        let key = config.openai_api_key.clone().ok_or_else(|| {
                            ProviderError::NotConfigured("OPENAI_API_KEY is not set".into())
                        })?;
                        OpenAICompatConfig::openai(key)
                    }
                };
                if openai.api_key.is_none() {
                    openai.api_key = config.openai_api_key.clone();
                }
                if !config.model.is_empty() {
                    openai.default_model = config.model.clone();
                }
                Ok(Provider::OpenAICompat(OpenAICompatProvider::with_client(
                    client, openai,
                )))
            }
            "remote" => {
                let url = config.remote_url.clone().ok_or_else(|| {
                    ProviderError::NotConfigured("AGENT_CHAT_REMOTE_URL is not set".into())
                })?;
                Ok(Provider::Remote(RemoteProvider::with_client(client, url)))
            }
            other => Err(ProviderError::UnknownProvider(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::Ollama(_) => "ollama",
            Provider::OpenAICompat(_) => "openai",
            Provider::Remote(_) => "remote",
        }
    }
}

#[async_trait]
impl CompletionTransport for Provider {
    async fn send_chat_turn(
        &self,
        system_prompt: &str,
        transcript: &[Message],
    ) -> Result<Message, ProviderError> {
        match self {
            Provider::Ollama(p) => p.send_chat_turn(system_prompt, transcript).await,
            Provider::OpenAICompat(p) => p.send_chat_turn(system_prompt, transcript).await,
            Provider::Remote(p) => p.send_chat_turn(system_prompt, transcript).await,
        }
    }
}

fn http_client(timeout_secs: u64) -> Result<Client, ProviderError> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// Wire-level chat message shared by the Ollama and OpenAI formats
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
struct WireMessage {
    role: String,
    content: String,
}

impl From<&Message> for WireMessage {
    fn from(msg: &Message) -> Self {
        Self {
            role: msg.role.as_str().to_string(),
            content: msg.content.clone(),
        }
    }
}

/// System prompt first, then the transcript in order
fn wire_messages(system_prompt: &str, transcript: &[Message]) -> Vec<WireMessage> {
    std::iter::once(WireMessage {
        role: "system".to_string(),
        content: system_prompt.to_string(),
    })
    .chain(transcript.iter().map(WireMessage::from))
    .collect()
}

/// Turn a raw reply body into an assistant message, rejecting empty content
fn assistant_reply(content: Option<String>) -> Result<Message, ProviderError> {
    match content {
        Some(content) if !content.trim().is_empty() => Ok(Message::assistant(content)),
        _ => Err(ProviderError::InvalidResponse(
            "Empty response from model".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_messages_prepend_system_prompt() {
        let transcript = vec![Message::user("Hello"), Message::assistant("Hi there")];
        let wire = wire_messages("Be brief.", &transcript);

        let roles: Vec<&str> = wire.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, ["system", "user", "assistant"]);
        assert_eq!(wire[0].content, "Be brief.");
        assert_eq!(wire[2].content, "Hi there");
    }

    #[test]
    fn test_assistant_reply_rejects_blank() {
        assert!(assistant_reply(Some("  ".into())).is_err());
        assert!(assistant_reply(None).is_err());
        assert_eq!(
            assistant_reply(Some("Hi".into())).unwrap(),
            Message::assistant("Hi")
        );
    }

    #[test]
    fn test_from_config() {
        let config = Config::default();
        assert_eq!(Provider::from_config(&config).unwrap().name(), "ollama");

        let config = Config {
            provider: "openai".into(),
            ..Config::default()
        };
        assert!(matches!(
            Provider::from_config(&config),
            Err(ProviderError::NotConfigured(_))
        ));

        let config = Config {
            provider: "remote".into(),
            remote_url: Some("http://127.0.0.1:3000".into()),
            ..Config::default()
        };
        assert_eq!(Provider::from_config(&config).unwrap().name(), "remote");

        let config = Config {
            provider: "carrier-pigeon".into(),
            ..Config::default()
        };
        assert!(matches!(
            Provider::from_config(&config),
            Err(ProviderError::UnknownProvider(_))
        ));
    }

    #[test]
    fn test_transport_error_displays_bare_message() {
        assert_eq!(ProviderError::Transport("timeout".into()).to_string(), "timeout");
    }
}
