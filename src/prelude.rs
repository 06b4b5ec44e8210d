//! Convenience re-exports for common use.

pub use crate::agent::{
    AgentSession, ConversationId, SessionEvent, SessionHandle, SessionState, TurnResult,
    TurnStatus,
};
pub use crate::auth::{
    AuthToken, CredentialIssuer, CredentialStore, Identity, KeyFileCredentialStore, KeyMaterial,
    StaticCredentialStore,
};
pub use crate::config::SessionConfig;
pub use crate::error::{AgentError, Result};
pub use crate::provider::{AgentProvider, CortexProvider, StreamDecoder};
pub use crate::tools::{ExecutionError, FnExecutor, QueryId, SqlApiExecutor, ToolExecutor};
pub use crate::types::{ContentItem, Message, Role, StreamChunk, ToolSet};
