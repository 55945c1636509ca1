//! API routes

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};

use crate::agent::{Agent, AgentError, AgentField};
use crate::config::presets_builtin;
use crate::conversation::Message;
use crate::providers::ProviderError;
use crate::AppState;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// One stateless chat turn: the whole transcript under a system prompt
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurnRequest {
    pub system_prompt: String,
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatTurnResponse {
    pub message: Message,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAgentRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub system_prompt: String,
}

#[derive(Debug, Serialize)]
struct PresetSummary {
    key: &'static str,
    name: String,
    description: String,
}

/// JSON body of every error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<AgentField>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Validation(#[from] AgentError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, field) = match &self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, None),
            ApiError::Validation(err) => (StatusCode::UNPROCESSABLE_ENTITY, Some(err.field())),
            ApiError::Provider(_) => (StatusCode::BAD_GATEWAY, None),
        };

        let body = ErrorBody {
            error: self.to_string(),
            field,
        };
        (status, Json(body)).into_response()
    }
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatTurnRequest>,
) -> Result<Json<ChatTurnResponse>, ApiError> {
    if request.system_prompt.trim().is_empty() {
        return Err(ApiError::BadRequest("systemPrompt is required".into()));
    }
    if request.messages.is_empty() {
        return Err(ApiError::BadRequest("messages must not be empty".into()));
    }

    let message = state
        .provider
        .send_chat_turn(&request.system_prompt, &request.messages)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "completion provider failed");
            e
        })?;

    Ok(Json(ChatTurnResponse { message }))
}

async fn create_agent(
    Json(request): Json<CreateAgentRequest>,
) -> Result<(StatusCode, Json<Agent>), ApiError> {
    let agent = Agent::create(&request.name, &request.system_prompt)?;
    tracing::info!(id = %agent.id, name = %agent.name, "created agent");
    Ok((StatusCode::CREATED, Json(agent)))
}

async fn list_presets() -> Json<Vec<PresetSummary>> {
    let presets = presets_builtin::all()
        .into_iter()
        .map(|(key, preset)| PresetSummary {
            key,
            name: preset.agent.name,
            description: preset.agent.description,
        })
        .collect();
    Json(presets)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/v1/chat", post(chat))
        .route("/v1/agents", post(create_agent))
        .route("/v1/agents/presets", get(list_presets))
}
