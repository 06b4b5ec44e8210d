//! Message types exchanged with the agent.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// A message in a conversation.
///
/// Serializes to the exact wire shape sent in the `messages` array.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentItem>,
}

impl Message {
    /// Create a system message.
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: vec![ContentItem::text(text)],
        }
    }

    /// Create a user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentItem::text(text)],
        }
    }

    /// Create an assistant message.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![ContentItem::text(text)],
        }
    }

    /// Create the `user` message that reports a tool outcome.
    pub fn tool_results(tool_use_id: impl Into<String>, result: ToolOutcome) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentItem::ToolResults {
                tool_results: ToolResults {
                    tool_use_id: tool_use_id.into(),
                    result,
                },
            }],
        }
    }

    /// Concatenate all text items.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|item| match item {
                ContentItem::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Tool invocations carried by this message.
    pub fn tool_uses(&self) -> Vec<&ToolUse> {
        self.content
            .iter()
            .filter_map(|item| match item {
                ContentItem::ToolUse { tool_use } => Some(tool_use),
                _ => None,
            })
            .collect()
    }

    /// Whether any item is a `tool_results` entry.
    pub fn has_tool_results(&self) -> bool {
        self.content
            .iter()
            .any(|item| matches!(item, ContentItem::ToolResults { .. }))
    }

    /// Whether a `tool_results` item in this message answers `tool_use_id`.
    pub fn answers(&self, tool_use_id: &str) -> bool {
        self.content.iter().any(|item| match item {
            ContentItem::ToolResults { tool_results } => tool_results.tool_use_id == tool_use_id,
            _ => false,
        })
    }
}

/// Conversation role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single content item. Exactly one variant is populated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentItem {
    Text { text: String },
    ToolUse { tool_use: ToolUse },
    ToolResults { tool_results: ToolResults },
}

impl ContentItem {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

/// A tool invocation requested by the agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolUse {
    pub tool_use_id: String,
    pub name: String,
    #[serde(default)]
    pub input: serde_json::Value,
}

impl ToolUse {
    /// The SQL text carried in `input.query` (or `input.sql`).
    pub fn query(&self) -> Option<&str> {
        self.input
            .get("query")
            .or_else(|| self.input.get("sql"))
            .and_then(|q| q.as_str())
    }
}

/// Outcome of a client-executed tool, correlated by `tool_use_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResults {
    pub tool_use_id: String,
    pub result: ToolOutcome,
}

/// Either a statement handle or inline data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ToolOutcome {
    Query { query_id: String },
    Data(serde_json::Value),
}

impl ToolOutcome {
    pub fn query_id(id: impl Into<String>) -> Self {
        Self::Query {
            query_id: id.into(),
        }
    }
}
