//! Conversation message history and its shape rules.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AgentError;
use crate::types::{Message, Role, ToolOutcome};

/// Opaque identifier of one conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered history sent verbatim as the `messages` array.
///
/// Never holds two adjacent `user` messages: appending a user message after a
/// user message replaces its content, or extends it when the earlier message
/// carries tool results that must stay correlated.
#[derive(Debug, Clone)]
pub struct ConversationState {
    id: ConversationId,
    messages: Vec<Message>,
}

impl ConversationState {
    /// New conversation seeded with the system preamble.
    pub fn new(system_prompt: &str) -> Self {
        Self {
            id: ConversationId::new(),
            messages: vec![Message::system(system_prompt)],
        }
    }

    /// Drop all history and allocate a fresh id.
    pub fn reset(&mut self, system_prompt: &str) {
        *self = Self::new(system_prompt);
    }

    pub fn id(&self) -> &ConversationId {
        &self.id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn last_n(&self, n: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Append a message, enforcing user-role alternation.
    pub fn append(&mut self, message: Message) {
        if message.role == Role::User {
            if let Some(last) = self.messages.last_mut() {
                if last.role == Role::User {
                    if last.has_tool_results() {
                        debug!(conversation_id = %self.id, "merging user text into tool results message");
                        last.content.extend(message.content);
                    } else {
                        debug!(conversation_id = %self.id, "replacing previous user message");
                        last.content = message.content;
                    }
                    return;
                }
            }
        }
        self.messages.push(message);
    }

    /// Append the `user` message answering `tool_use_id`.
    ///
    /// The last message must be the assistant message that requested the tool.
    pub fn append_tool_result(
        &mut self,
        tool_use_id: &str,
        result: ToolOutcome,
    ) -> Result<(), AgentError> {
        let requested = self.messages.last().is_some_and(|last| {
            last.role == Role::Assistant
                && last
                    .tool_uses()
                    .iter()
                    .any(|tool_use| tool_use.tool_use_id == tool_use_id)
        });
        if !requested {
            return Err(AgentError::ProtocolViolation(format!(
                "tool result for '{tool_use_id}' does not follow its tool_use"
            )));
        }
        if self.references(tool_use_id) > 0 {
            return Err(AgentError::ProtocolViolation(format!(
                "tool '{tool_use_id}' already has a result"
            )));
        }
        self.messages.push(Message::tool_results(tool_use_id, result));
        Ok(())
    }

    /// Number of messages whose `tool_results` answer `tool_use_id`.
    pub fn references(&self, tool_use_id: &str) -> usize {
        self.messages
            .iter()
            .filter(|message| message.answers(tool_use_id))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContentItem, ToolUse};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn assistant_with_tool(id: &str) -> Message {
        Message {
            role: Role::Assistant,
            content: vec![
                ContentItem::text("Running a query."),
                ContentItem::ToolUse {
                    tool_use: ToolUse {
                        tool_use_id: id.to_string(),
                        name: "sql_exec".to_string(),
                        input: json!({"query": "SELECT 1"}),
                    },
                },
            ],
        }
    }

    fn roles(state: &ConversationState) -> Vec<Role> {
        state.messages().iter().map(|m| m.role).collect()
    }

    #[test]
    fn starts_with_system_preamble() {
        let state = ConversationState::new("preamble");
        assert_eq!(state.len(), 1);
        assert_eq!(state.messages()[0], Message::system("preamble"));
    }

    #[test]
    fn consecutive_user_messages_replace() {
        let mut state = ConversationState::new("p");
        state.append(Message::user("first"));
        state.append(Message::user("second"));

        assert_eq!(roles(&state), vec![Role::System, Role::User]);
        assert_eq!(state.last().unwrap().text(), "second");
    }

    #[test]
    fn alternating_messages_append() {
        let mut state = ConversationState::new("p");
        state.append(Message::user("q"));
        state.append(Message::assistant("a"));
        state.append(Message::user("q2"));

        assert_eq!(
            roles(&state),
            vec![Role::System, Role::User, Role::Assistant, Role::User]
        );
    }

    #[test]
    fn user_text_after_tool_results_is_merged() {
        let mut state = ConversationState::new("p");
        state.append(Message::user("q"));
        state.append(assistant_with_tool("t1"));
        state
            .append_tool_result("t1", ToolOutcome::query_id("01ab"))
            .unwrap();
        state.append(Message::user("try again"));

        let last = state.last().unwrap();
        assert_eq!(state.len(), 4);
        assert!(last.answers("t1"));
        assert_eq!(last.text(), "try again");
        assert_eq!(state.references("t1"), 1);
    }

    #[test]
    fn tool_result_must_follow_matching_tool_use() {
        let mut state = ConversationState::new("p");
        state.append(Message::user("q"));

        let err = state
            .append_tool_result("t1", ToolOutcome::query_id("x"))
            .unwrap_err();
        assert!(matches!(err, AgentError::ProtocolViolation(_)));

        state.append(assistant_with_tool("t1"));
        assert!(state
            .append_tool_result("other", ToolOutcome::query_id("x"))
            .is_err());
        assert_eq!(state.len(), 3);
    }

    #[test]
    fn reset_allocates_new_id() {
        let mut state = ConversationState::new("p");
        let first = state.id().clone();
        state.append(Message::user("q"));
        state.reset("p2");

        assert_ne!(state.id(), &first);
        assert_eq!(state.messages(), &[Message::system("p2")]);
    }

    #[test]
    fn last_n_saturates() {
        let state = ConversationState::new("p");
        assert_eq!(state.last_n(5).len(), 1);
    }
}
