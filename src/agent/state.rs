//! Turn state machine, results, and events.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::error::AgentError;
use crate::tools::QueryId;
use crate::types::DecodeStats;

/// Protocol state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Idle,
    CallSent,
    Streaming,
    ToolPending,
    ToolExecuting,
    FollowupSent,
    Done,
    Error,
}

impl SessionState {
    /// Whether a turn may begin from this state.
    pub fn is_ready(self) -> bool {
        matches!(self, Self::Idle | Self::Done | Self::Error)
    }

    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (_, Error) => !matches!(self, Idle | Done | Error),
            (Idle | Done | Error, CallSent) => true,
            (CallSent, Streaming) => true,
            (Streaming, ToolPending | Done) => true,
            (ToolPending, ToolExecuting) => true,
            (ToolExecuting, FollowupSent) => true,
            (FollowupSent, Streaming) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TurnStatus {
    Complete,
    Error,
}

/// The tool round trip performed during a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRoundTrip {
    pub tool_use_id: String,
    pub query: String,
    pub query_id: QueryId,
}

/// Outcome of [`AgentSession::send_message`](super::AgentSession::send_message).
#[derive(Debug)]
pub struct TurnResult {
    pub status: TurnStatus,
    pub text: Option<String>,
    pub error: Option<AgentError>,
    pub tool: Option<ToolRoundTrip>,
    pub stats: DecodeStats,
}

impl TurnResult {
    pub fn complete(text: String, tool: Option<ToolRoundTrip>, stats: DecodeStats) -> Self {
        Self {
            status: TurnStatus::Complete,
            text: Some(text),
            error: None,
            tool,
            stats,
        }
    }

    pub fn failed(error: AgentError, tool: Option<ToolRoundTrip>, stats: DecodeStats) -> Self {
        Self {
            status: TurnStatus::Error,
            text: None,
            error: Some(error),
            tool,
            stats,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == TurnStatus::Complete
    }

    /// Error message, if the turn failed.
    pub fn message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }

    pub fn into_result(self) -> Result<String, AgentError> {
        match (self.error, self.text) {
            (Some(err), _) => Err(err),
            (None, Some(text)) => Ok(text),
            (None, None) => Err(AgentError::InvalidState("turn produced no text".into())),
        }
    }
}

/// Progress notifications emitted during a turn.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateChanged {
        from: SessionState,
        to: SessionState,
    },
    TextDelta(String),
    /// A tool the service runs itself (e.g. text-to-SQL).
    ServerToolUse {
        tool_use_id: String,
        name: String,
    },
    ToolRequested {
        tool_use_id: String,
        query: String,
    },
    ToolCompleted {
        tool_use_id: String,
        query_id: QueryId,
    },
    ToolFailed {
        tool_use_id: String,
        message: String,
    },
}

pub type EventSink = Arc<dyn Fn(SessionEvent) + Send + Sync>;
