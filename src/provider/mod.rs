//! Agent endpoint trait and the Cortex implementation.

pub mod cortex;
pub mod http;
pub mod sse;

pub use cortex::CortexProvider;
pub use sse::{decode, StreamDecoder};

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde::Serialize;

use crate::auth::AuthToken;
use crate::error::AgentError;
use crate::types::{Message, ToolResource, ToolSet, ToolSpec};

/// Default model for agent orchestration.
pub const DEFAULT_MODEL: &str = "llama3.1-70b";

/// Raw response body of a streamed call.
pub type ByteStream = BoxStream<'static, Result<Bytes, AgentError>>;

/// Body of one `agent:run` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentRequest {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_instruction: Option<String>,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolSpec>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub tool_resources: BTreeMap<String, ToolResource>,
}

impl AgentRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>, tools: &ToolSet) -> Self {
        Self {
            model: model.into(),
            response_instruction: None,
            messages,
            tools: tools.tools().to_vec(),
            tool_resources: tools.resources().clone(),
        }
    }

    pub fn with_response_instruction(mut self, instruction: Option<String>) -> Self {
        self.response_instruction = instruction;
        self
    }
}

/// A remote agent endpoint that answers with a server-sent event stream.
#[async_trait]
pub trait AgentProvider: Send + Sync {
    /// Provider name (e.g., "cortex").
    fn provider_name(&self) -> &str;

    /// Issue one call authenticated with `token` and return the raw body stream.
    ///
    /// Non-2xx responses are returned as errors before any body is streamed.
    async fn run(&self, token: &AuthToken, request: &AgentRequest)
        -> Result<ByteStream, AgentError>;
}
