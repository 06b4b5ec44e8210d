//! Protocol driver for one conversation.
//!
//! A turn is: append the user message, mint a token, stream the agent's reply,
//! and either finish with text or run exactly one SQL tool round trip followed
//! by a follow-up call that produces the final answer.

use std::collections::VecDeque;
use std::sync::Arc;

use futures::StreamExt;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use super::conversation::{ConversationId, ConversationState};
use super::state::{EventSink, SessionEvent, SessionState, ToolRoundTrip, TurnResult};
use crate::auth::{AuthToken, CredentialIssuer, CredentialStore};
use crate::config::SessionConfig;
use crate::error::AgentError;
use crate::provider::{AgentProvider, AgentRequest, CortexProvider, StreamDecoder};
use crate::tools::{SqlApiExecutor, ToolExecutor};
use crate::types::{ContentItem, DecodeStats, Delta, Message, Role, StreamChunk, ToolOutcome, ToolUse};
use crate::util::timeout::with_timeout;

/// Text and the SQL tool request collected from one response stream.
#[derive(Debug, Default)]
struct Reply {
    text: String,
    sql_tool: Option<ToolUse>,
    duplicate_tool: bool,
}

impl Reply {
    fn absorb(&mut self, chunk: StreamChunk, sql_tool_name: Option<&str>, emit: &dyn Fn(SessionEvent)) {
        if let Some(role) = chunk.role {
            if role != Role::Assistant {
                debug!(%role, "chunk with non-assistant role");
            }
        }
        for delta in chunk.deltas {
            match delta {
                Delta::Text(text) => {
                    if self.sql_tool.is_some() {
                        debug!("ignoring text after tool_use");
                        continue;
                    }
                    emit(SessionEvent::TextDelta(text.clone()));
                    self.text.push_str(&text);
                }
                Delta::ToolUse(tool_use) if Some(tool_use.name.as_str()) == sql_tool_name => {
                    if self.sql_tool.is_some() {
                        warn!(tool_use_id = %tool_use.tool_use_id, "second SQL tool_use in one response");
                        self.duplicate_tool = true;
                    } else {
                        self.sql_tool = Some(tool_use);
                    }
                }
                Delta::ToolUse(tool_use) => {
                    debug!(tool_use_id = %tool_use.tool_use_id, name = %tool_use.name, "server-side tool_use");
                    emit(SessionEvent::ServerToolUse {
                        tool_use_id: tool_use.tool_use_id,
                        name: tool_use.name,
                    });
                }
            }
        }
    }
}

/// Drives the agent protocol for one conversation at a time.
///
/// Turns are serialized by `&mut self`; wrap in a
/// [`SessionHandle`](super::SessionHandle) to share across tasks.
pub struct AgentSession {
    config: SessionConfig,
    issuer: CredentialIssuer,
    credentials: Arc<dyn CredentialStore>,
    provider: Arc<dyn AgentProvider>,
    executor: Arc<dyn ToolExecutor>,
    conversation: ConversationState,
    state: SessionState,
    events: Option<EventSink>,
    debug_chunks: VecDeque<String>,
    last_stats: DecodeStats,
    turn_tool: Option<ToolRoundTrip>,
}

impl AgentSession {
    pub fn new(
        config: SessionConfig,
        credentials: Arc<dyn CredentialStore>,
        provider: Arc<dyn AgentProvider>,
        executor: Arc<dyn ToolExecutor>,
    ) -> Result<Self, AgentError> {
        config.validate()?;
        Ok(Self {
            issuer: config.issuer(),
            conversation: ConversationState::new(&config.system_prompt),
            debug_chunks: VecDeque::with_capacity(config.debug_buffer),
            config,
            credentials,
            provider,
            executor,
            state: SessionState::Idle,
            events: None,
            last_stats: DecodeStats::default(),
            turn_tool: None,
        })
    }

    /// Session against the Cortex endpoint using the configured key files.
    pub fn connect(
        config: SessionConfig,
        executor: Arc<dyn ToolExecutor>,
    ) -> Result<Self, AgentError> {
        let credentials: Arc<dyn CredentialStore> = Arc::new(config.credential_store()?);
        let provider = Arc::new(CortexProvider::new(
            &config.account,
            config.base_url.clone(),
            config.request_timeout,
        )?);
        Self::new(config, credentials, provider, executor)
    }

    /// [`connect`](Self::connect) with statements submitted through the SQL API.
    pub fn from_config(config: SessionConfig) -> Result<Self, AgentError> {
        let credentials: Arc<dyn CredentialStore> = Arc::new(config.credential_store()?);
        let executor = Arc::new(SqlApiExecutor::from_config(&config, credentials.clone())?);
        let provider = Arc::new(CortexProvider::new(
            &config.account,
            config.base_url.clone(),
            config.request_timeout,
        )?);
        Self::new(config, credentials, provider, executor)
    }

    pub fn with_event_sink(mut self, sink: EventSink) -> Self {
        self.events = Some(sink);
        self
    }

    /// Reset history to the system preamble under a new id.
    pub fn start_conversation(&mut self) -> ConversationId {
        self.conversation.reset(&self.config.system_prompt);
        self.state = SessionState::Idle;
        self.last_stats = DecodeStats::default();
        self.turn_tool = None;
        info!(conversation_id = %self.conversation.id(), "conversation started");
        self.conversation.id().clone()
    }

    pub fn conversation_id(&self) -> &ConversationId {
        self.conversation.id()
    }

    pub fn history(&self) -> &[Message] {
        self.conversation.messages()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Most recent raw chunk payloads, oldest first.
    pub fn debug_chunks(&self) -> impl Iterator<Item = &str> {
        self.debug_chunks.iter().map(String::as_str)
    }

    /// Decode counters of the last turn, summed over both calls.
    pub fn last_stats(&self) -> DecodeStats {
        self.last_stats
    }

    /// Run one user turn to completion.
    ///
    /// Failures are reported in the result; history keeps every message that
    /// was committed before the failure.
    pub async fn send_message(&mut self, text: impl Into<String>) -> TurnResult {
        let text = text.into();
        if text.trim().is_empty() {
            return TurnResult::failed(
                AgentError::InvalidState("message text is empty".into()),
                None,
                DecodeStats::default(),
            );
        }
        if !self.state.is_ready() {
            warn!(state = %self.state, "previous turn was interrupted");
            self.state = SessionState::Error;
        }

        self.last_stats = DecodeStats::default();
        self.turn_tool = None;
        self.conversation.append(Message::user(text));
        info!(conversation_id = %self.conversation.id(), messages = self.conversation.len(), "turn started");

        match self.run_turn().await {
            Ok(text) => {
                self.transition(SessionState::Done);
                info!(conversation_id = %self.conversation.id(), "turn complete");
                TurnResult::complete(text, self.turn_tool.take(), self.last_stats)
            }
            Err(err) => {
                self.transition(SessionState::Error);
                warn!(conversation_id = %self.conversation.id(), error = %err, "turn failed");
                TurnResult::failed(err, self.turn_tool.take(), self.last_stats)
            }
        }
    }

    async fn run_turn(&mut self) -> Result<String, AgentError> {
        let first = self.call(SessionState::CallSent).await?;
        if first.duplicate_tool {
            return Err(AgentError::ProtocolViolation(
                "more than one SQL tool call in a single response".into(),
            ));
        }

        let Some(tool_use) = first.sql_tool else {
            self.commit_answer(&first.text);
            return Ok(first.text);
        };

        self.transition(SessionState::ToolPending);
        let query = tool_use
            .query()
            .map(str::to_string)
            .ok_or_else(|| {
                AgentError::ProtocolViolation(format!(
                    "tool_use '{}' carries no query",
                    tool_use.tool_use_id
                ))
            })?;

        let mut partial = Vec::with_capacity(2);
        if !first.text.is_empty() {
            partial.push(ContentItem::text(first.text));
        }
        partial.push(ContentItem::ToolUse {
            tool_use: tool_use.clone(),
        });
        self.conversation.append(Message {
            role: Role::Assistant,
            content: partial,
        });
        self.emit(SessionEvent::ToolRequested {
            tool_use_id: tool_use.tool_use_id.clone(),
            query: query.clone(),
        });

        self.transition(SessionState::ToolExecuting);
        let query_id = match self.execute_tool(&tool_use, &query).await {
            Ok(query_id) => query_id,
            Err(err) => {
                self.emit(SessionEvent::ToolFailed {
                    tool_use_id: tool_use.tool_use_id.clone(),
                    message: err.to_string(),
                });
                return Err(err);
            }
        };
        self.emit(SessionEvent::ToolCompleted {
            tool_use_id: tool_use.tool_use_id.clone(),
            query_id: query_id.clone(),
        });

        self.conversation.append_tool_result(
            &tool_use.tool_use_id,
            ToolOutcome::query_id(query_id.as_str()),
        )?;
        self.turn_tool = Some(ToolRoundTrip {
            tool_use_id: tool_use.tool_use_id,
            query,
            query_id,
        });

        let followup = self.call(SessionState::FollowupSent).await?;
        if followup.sql_tool.is_some() || followup.duplicate_tool {
            return Err(AgentError::ProtocolViolation(
                "tool call requested inside the follow-up response".into(),
            ));
        }
        self.commit_answer(&followup.text);
        Ok(followup.text)
    }

    /// Persist the final assistant message. A reply with no text keeps its
    /// place in the alternation with empty content.
    fn commit_answer(&mut self, text: &str) {
        if text.is_empty() {
            warn!(conversation_id = %self.conversation.id(), "response carried no text");
            self.conversation.append(Message {
                role: Role::Assistant,
                content: Vec::new(),
            });
        } else {
            self.conversation.append(Message::assistant(text));
        }
    }

    async fn execute_tool(
        &self,
        tool_use: &ToolUse,
        query: &str,
    ) -> Result<crate::tools::QueryId, AgentError> {
        let name = tool_use.name.as_str();
        info!(tool_use_id = %tool_use.tool_use_id, tool = name, "dispatching statement");
        let executor = self.executor.clone();

        with_timeout(self.config.tool_timeout, async {
            executor
                .execute(query)
                .await
                .map_err(|e| AgentError::tool_execution(name, e.to_string()))
        })
        .await
        .map_err(|err| match err {
            AgentError::Timeout(ms) => {
                AgentError::tool_execution(name, format!("timed out after {ms}ms"))
            }
            other => other,
        })
    }

    /// Send the current history and collect the streamed reply.
    async fn call(&mut self, sent: SessionState) -> Result<Reply, AgentError> {
        self.transition(sent);
        let creds = self.credentials.credentials()?;
        let token = self.issuer.issue(&creds.identity, &creds.key)?;
        let request = AgentRequest::new(
            self.config.model.clone(),
            self.conversation.messages().to_vec(),
            &self.config.tools,
        )
        .with_response_instruction(self.config.response_instruction.clone());

        let deadline = Instant::now() + self.config.request_timeout;
        self.stream_reply(token, request, deadline).await
    }

    /// Drain one response body, stopping at `deadline`.
    ///
    /// Decode counters and raw payloads are recorded on every exit path.
    async fn stream_reply(
        &mut self,
        token: AuthToken,
        request: AgentRequest,
        deadline: Instant,
    ) -> Result<Reply, AgentError> {
        let timeout_ms = self.config.request_timeout.as_millis() as u64;
        let mut body = timeout_at(deadline, self.provider.run(&token, &request))
            .await
            .map_err(|_| AgentError::Timeout(timeout_ms))??;
        self.transition(SessionState::Streaming);

        let sql_tool_name = self.config.tools.sql_exec_tool().map(str::to_string);
        let events = self.events.clone();
        let emit = move |event: SessionEvent| {
            if let Some(sink) = &events {
                sink(event);
            }
        };

        let mut decoder = StreamDecoder::new().with_debug_capacity(self.config.debug_buffer);
        let mut reply = Reply::default();
        let mut failure = None;

        loop {
            let next = match timeout_at(deadline, body.next()).await {
                Ok(Some(next)) => next,
                Ok(None) => break,
                Err(_) => {
                    warn!(timeout_ms, "response stream stalled past the request timeout");
                    failure = Some(AgentError::Timeout(timeout_ms));
                    break;
                }
            };
            match next {
                Ok(bytes) => {
                    for chunk in decoder.feed(&bytes) {
                        reply.absorb(chunk, sql_tool_name.as_deref(), &emit);
                    }
                    if decoder.is_finished() {
                        break;
                    }
                }
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }
        if failure.is_none() {
            for chunk in decoder.finish() {
                reply.absorb(chunk, sql_tool_name.as_deref(), &emit);
            }
        }

        let stats = decoder.stats();
        self.last_stats.merge(stats);
        self.remember_chunks(decoder.take_recent());
        debug!(
            chunks = stats.chunks,
            malformed = stats.malformed,
            saw_done = stats.saw_done,
            "stream drained"
        );

        match failure {
            Some(err) => Err(err),
            None => Ok(reply),
        }
    }

    fn remember_chunks(&mut self, payloads: Vec<String>) {
        let capacity = self.config.debug_buffer;
        if capacity == 0 {
            return;
        }
        for payload in payloads {
            if self.debug_chunks.len() == capacity {
                self.debug_chunks.pop_front();
            }
            self.debug_chunks.push_back(payload);
        }
    }

    fn transition(&mut self, next: SessionState) {
        let from = self.state;
        if !from.can_transition_to(next) {
            warn!(%from, to = %next, "unexpected state transition");
        }
        debug!(conversation_id = %self.conversation.id(), %from, to = %next, "state");
        self.state = next;
        self.emit(SessionEvent::StateChanged { from, to: next });
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(sink) = &self.events {
            sink(event);
        }
    }
}

impl std::fmt::Debug for AgentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentSession")
            .field("conversation_id", self.conversation.id())
            .field("state", &self.state)
            .field("messages", &self.conversation.len())
            .field("provider", &self.provider.provider_name())
            .finish_non_exhaustive()
    }
}
