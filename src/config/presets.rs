//! Agent presets
//!
//! Ready-made agents, either built in or loaded from TOML files. A preset is
//! only a suggestion: it becomes an [`Agent`] through the same validation as
//! hand-entered input.
//!
//! # Example Preset File
//!
//! ```toml
//! [agent]
//! name = "Creative Writer"
//! description = "Storytelling and character development"
//!
//! [system_prompt]
//! content = """
//! You are a helpful creative writing assistant...
//! """
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::agent::{Agent, AgentError};

/// A preset agent definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentPreset {
    pub agent: PresetInfo,
    pub system_prompt: SystemPrompt,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresetInfo {
    pub name: String,

    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemPrompt {
    pub content: String,
}

impl AgentPreset {
    pub fn new(name: &str, description: &str, system_prompt: &str) -> Self {
        Self {
            agent: PresetInfo {
                name: name.to_string(),
                description: description.to_string(),
            },
            system_prompt: SystemPrompt {
                content: system_prompt.to_string(),
            },
        }
    }

    pub fn to_agent(&self) -> Result<Agent, AgentError> {
        Agent::create(&self.agent.name, &self.system_prompt.content)
    }
}

/// Loads preset files from a directory, caching them by key
#[derive(Debug)]
pub struct PresetManager {
    presets_dir: PathBuf,
    cache: HashMap<String, AgentPreset>,
}

impl PresetManager {
    pub fn new(presets_dir: impl Into<PathBuf>) -> Self {
        Self {
            presets_dir: presets_dir.into(),
            cache: HashMap::new(),
        }
    }

    /// Look up a preset by key: built-ins first, then `{presets_dir}/{key}.toml`
    pub async fn load(&mut self, key: &str) -> Result<AgentPreset, PresetError> {
        if let Some(preset) = builtin::get(key) {
            return Ok(preset);
        }

        if let Some(preset) = self.cache.get(key) {
            return Ok(preset.clone());
        }

        let path = self.presets_dir.join(format!("{}.toml", key));
        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(PresetError::NotFound(key.to_string()));
        }

        let preset = Self::load_from_file(&path).await?;
        tracing::debug!(key, path = %path.display(), "loaded agent preset");

        self.cache.insert(key.to_string(), preset.clone());
        Ok(preset)
    }

    pub async fn load_from_file(path: &Path) -> Result<AgentPreset, PresetError> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| PresetError::IoError(e.to_string()))?;

        toml::from_str(&content).map_err(|e| PresetError::ParseError(e.to_string()))
    }

    /// Keys of the preset files in the directory
    pub async fn list_available(&self) -> Result<Vec<String>, PresetError> {
        let mut keys = Vec::new();

        let mut entries = fs::read_dir(&self.presets_dir)
            .await
            .map_err(|e| PresetError::IoError(e.to_string()))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PresetError::IoError(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == "toml") {
                if let Some(stem) = path.file_stem() {
                    keys.push(stem.to_string_lossy().to_string());
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PresetError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Preset not found: {0}")]
    NotFound(String),
}

/// Presets that don't require files
pub mod builtin {
    use super::AgentPreset;

    pub const KEYS: [&str; 3] = ["math_tutor", "creative_writer", "code_assistant"];

    pub const MATH_TUTOR: &str = "You are a patient math tutor. Explain each step of a solution, check the student's reasoning before giving answers, and prefer small worked examples over long lectures.";

    pub const CREATIVE_WRITER: &str = "You are a helpful creative writing assistant who specializes in storytelling and character development. Always provide constructive feedback and encourage creativity.";

    pub const CODE_ASSISTANT: &str = "You are a careful programming assistant. Answer with working code, point out edge cases, and keep explanations short unless asked for more detail.";

    pub fn get(key: &str) -> Option<AgentPreset> {
        let preset = match key {
            "math_tutor" => AgentPreset::new("Math Tutor", "Step-by-step math help", MATH_TUTOR),
            "creative_writer" => AgentPreset::new(
                "Creative Writer",
                "Storytelling and character development",
                CREATIVE_WRITER,
            ),
            "code_assistant" => AgentPreset::new(
                "Code Assistant",
                "Programming questions and code review",
                CODE_ASSISTANT,
            ),
            _ => return None,
        };
        Some(preset)
    }

    pub fn all() -> Vec<(&'static str, AgentPreset)> {
        KEYS.iter()
            .filter_map(|key| get(key).map(|preset| (*key, preset)))
            .collect()
    }
}
