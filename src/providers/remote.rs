//! Client for the `/v1/chat` endpoint of a running agent-chat server

use async_trait::async_trait;
use reqwest::Client;

use crate::conversation::Message;
use crate::routes::{ChatTurnRequest, ChatTurnResponse, ErrorBody};

use super::{assistant_reply, CompletionTransport, ProviderError};

pub struct RemoteProvider {
    client: Client,
    base_url: String,
}

impl RemoteProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl CompletionTransport for RemoteProvider {
    async fn send_chat_turn(
        &self,
        system_prompt: &str,
        transcript: &[Message],
    ) -> Result<Message, ProviderError> {
        let request = ChatTurnRequest {
            system_prompt: system_prompt.to_string(),
            messages: transcript.to_vec(),
        };

        let response = self
            .client
            .post(format!("{}/v1/chat", self.base_url))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<ErrorBody>(&body) {
                return Err(ProviderError::Api(error.error));
            }
            return Err(ProviderError::InvalidResponse(format!("{}: {}", status, body)));
        }

        let turn: ChatTurnResponse = serde_json::from_str(&body).map_err(|e| {
            ProviderError::InvalidResponse(format!("Failed to parse response: {}", e))
        })?;

        assistant_reply(Some(turn.message.content))
    }
}
