use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub mod images;
pub mod models;

pub const ROLE_USER: &str = "user";

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ROLE_USER.to_string(),
            content: content.into(),
        }
    }
}

/// One entry of the remote model catalog.
///
/// Only `id` and `name` are interpreted; every other provider field
/// (pricing, context length, architecture, ...) is carried through
/// untouched so the persisted catalog matches what the API returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl Model {
    pub fn new(id: impl Into<String>, name: Option<&str>) -> Self {
        Self {
            id: id.into(),
            name: name.map(str::to_string),
            metadata: Map::new(),
        }
    }

    /// Name shown to users: the model name when present and non-empty,
    /// otherwise the identifier.
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ModelsResponse {
    pub data: Vec<Model>,
}

// Streaming chunks. Every level defaults so a chunk without the expected
// path simply contributes nothing.

#[derive(Debug, Default, Deserialize)]
pub struct ChatResponseDelta {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatResponseChoice {
    #[serde(default)]
    pub delta: ChatResponseDelta,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatResponseChoice>,
}

impl ChatResponse {
    pub fn first_delta(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.delta.content.as_deref())
    }
}

// Non-streaming completions. `content` and `images` stay as raw JSON
// because image-capable models return several shapes for both.

#[derive(Debug, Deserialize)]
pub struct CompletionMessage {
    #[serde(default)]
    pub content: Option<Value>,
    #[serde(default)]
    pub images: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct CompletionChoice {
    #[serde(default)]
    pub message: Option<CompletionMessage>,
}

#[derive(Debug, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub choices: Vec<CompletionChoice>,
}

impl CompletionResponse {
    pub fn into_first_message(self) -> Option<CompletionMessage> {
        self.choices.into_iter().next().and_then(|choice| choice.message)
    }
}
