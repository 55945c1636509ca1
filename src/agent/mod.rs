//! Agent definitions
//!
//! An [`Agent`] is a named system prompt. Agents are only ever produced by
//! [`Agent::create`], which trims and validates both fields, so every agent a
//! session receives already satisfies the length limits below.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const NAME_MIN_CHARS: usize = 2;
pub const NAME_MAX_CHARS: usize = 50;
pub const SYSTEM_PROMPT_MIN_CHARS: usize = 10;
pub const SYSTEM_PROMPT_MAX_CHARS: usize = 1000;

/// Length of the random part of an agent id
const ID_SUFFIX_LEN: usize = 9;

/// A named agent configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub system_prompt: String,
    pub created_at: DateTime<Utc>,
}

/// Which agent field failed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AgentField {
    Name,
    SystemPrompt,
}

/// Validation errors from agent creation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AgentError {
    #[error("Agent name is required")]
    NameRequired,

    #[error("System prompt is required")]
    SystemPromptRequired,

    #[error("Agent name must be at least {min} characters long")]
    NameTooShort { min: usize },

    #[error("System prompt must be at least {min} characters long")]
    SystemPromptTooShort { min: usize },

    #[error("Agent name must be at most {max} characters long")]
    NameTooLong { max: usize },

    #[error("System prompt must be at most {max} characters long")]
    SystemPromptTooLong { max: usize },
}

impl AgentError {
    pub fn field(&self) -> AgentField {
        match self {
            AgentError::NameRequired
            | AgentError::NameTooShort { .. }
            | AgentError::NameTooLong { .. } => AgentField::Name,
            AgentError::SystemPromptRequired
            | AgentError::SystemPromptTooShort { .. }
            | AgentError::SystemPromptTooLong { .. } => AgentField::SystemPrompt,
        }
    }
}

impl Agent {
    /// Validate the raw form input and build a new agent with a fresh id
    pub fn create(name: &str, system_prompt: &str) -> Result<Self, AgentError> {
        let name = name.trim();
        let system_prompt = system_prompt.trim();

        validate(name, system_prompt)?;

        Ok(Self {
            id: generate_id(),
            name: name.to_string(),
            system_prompt: system_prompt.to_string(),
            created_at: Utc::now(),
        })
    }
}

/// Checks are ordered: presence of both fields first, then minimums, then maximums
fn validate(name: &str, system_prompt: &str) -> Result<(), AgentError> {
    let name_len = name.chars().count();
    let prompt_len = system_prompt.chars().count();

    if name_len == 0 {
        return Err(AgentError::NameRequired);
    }
    if prompt_len == 0 {
        return Err(AgentError::SystemPromptRequired);
    }
    if name_len < NAME_MIN_CHARS {
        return Err(AgentError::NameTooShort {
            min: NAME_MIN_CHARS,
        });
    }
    if prompt_len < SYSTEM_PROMPT_MIN_CHARS {
        return Err(AgentError::SystemPromptTooShort {
            min: SYSTEM_PROMPT_MIN_CHARS,
        });
    }
    if name_len > NAME_MAX_CHARS {
        return Err(AgentError::NameTooLong {
            max: NAME_MAX_CHARS,
        });
    }
    if prompt_len > SYSTEM_PROMPT_MAX_CHARS {
        return Err(AgentError::SystemPromptTooLong {
            max: SYSTEM_PROMPT_MAX_CHARS,
        });
    }

    Ok(())
}

/// Millisecond timestamp followed by a short random suffix
fn generate_id() -> String {
    let suffix: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(ID_SUFFIX_LEN)
        .collect();
    format!("{}{}", Utc::now().timestamp_millis(), suffix)
}
