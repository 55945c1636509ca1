//! Ollama provider implementation

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::conversation::Message;

use super::{assistant_reply, wire_messages, CompletionTransport, ProviderError, WireMessage};

const DEFAULT_MODEL: &str = "llama3.2";

pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<WireMessage>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: Option<WireMessage>,
    #[serde(default)]
    error: Option<String>,
}

impl OllamaProvider {
    pub fn new(base_url: impl Into<String>, model: &str) -> Self {
        Self::with_client(Client::new(), base_url, model)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>, model: &str) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: if model.is_empty() {
                DEFAULT_MODEL.to_string()
            } else {
                model.to_string()
            },
        }
    }
}

#[async_trait]
impl CompletionTransport for OllamaProvider {
    async fn send_chat_turn(
        &self,
        system_prompt: &str,
        transcript: &[Message],
    ) -> Result<Message, ProviderError> {
        let request = OllamaRequest {
            model: self.model.clone(),
            messages: wire_messages(system_prompt, transcript),
            stream: false,
        };

        tracing::debug!(model = %self.model, turns = transcript.len(), "ollama chat request");

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        let parsed = serde_json::from_str::<OllamaResponse>(&body);

        if !status.is_success() {
            if let Ok(OllamaResponse {
                error: Some(message),
                ..
            }) = parsed
            {
                return Err(ProviderError::Api(message));
            }
            return Err(ProviderError::InvalidResponse(format!("{}: {}", status, body)));
        }

        let ollama_response = parsed
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        if let Some(message) = ollama_response.error {
            return Err(ProviderError::Api(message));
        }

        assistant_reply(ollama_response.message.map(|m| m.content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_sends_full_transcript() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({
                "model": "llama3.2",
                "stream": false,
                "messages": [
                    {"role": "system", "content": "You are terse."},
                    {"role": "user", "content": "Hello"},
                    {"role": "assistant", "content": "Hi"},
                    {"role": "user", "content": "How are you?"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": {"role": "assistant", "content": "Fine."},
                "done": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = OllamaProvider::new(server.uri(), "");
        let transcript = vec![
            Message::user("Hello"),
            Message::assistant("Hi"),
            Message::user("How are you?"),
        ];

        let reply = provider
            .send_chat_turn("You are terse.", &transcript)
            .await
            .unwrap();
        assert_eq!(reply, Message::assistant("Fine."));
    }

    #[tokio::test]
    async fn test_error_body_becomes_api_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(json!({"error": "model \"nope\" not found"})),
            )
            .mount(&server)
            .await;

        let provider = OllamaProvider::new(server.uri(), "nope");
        let err = provider
            .send_chat_turn("You are terse.", &[Message::user("Hello")])
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Api(_)));
        assert_eq!(err.to_string(), "model \"nope\" not found");
    }
}
