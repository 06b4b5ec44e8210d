//! Streaming types.

use serde::{Deserialize, Serialize};

use super::message::{Role, ToolUse};

/// One decoded `data:` record, normalized from either wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamChunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    pub deltas: Vec<Delta>,
}

impl StreamChunk {
    /// Concatenated text of this chunk.
    pub fn text(&self) -> String {
        self.deltas
            .iter()
            .filter_map(|d| match d {
                Delta::Text(text) => Some(text.as_str()),
                Delta::ToolUse(_) => None,
            })
            .collect()
    }
}

/// An incremental piece of the assistant's reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Delta {
    /// Text appended to the running answer.
    Text(String),
    /// A tool invocation, surfaced as soon as it is decoded.
    ToolUse(ToolUse),
}

/// Per-stream decode counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeStats {
    /// `data:` records decoded into a chunk.
    pub chunks: u64,
    /// Records whose payload failed to parse.
    pub malformed: u64,
    /// Well-formed records of an unrecognized shape.
    pub ignored: u64,
    /// Whether the `[DONE]` sentinel was seen.
    pub saw_done: bool,
}

impl DecodeStats {
    /// Fold the counters of a later stream into this one.
    pub fn merge(&mut self, other: DecodeStats) {
        self.chunks += other.chunks;
        self.malformed += other.malformed;
        self.ignored += other.ignored;
        self.saw_done = other.saw_done;
    }
}
