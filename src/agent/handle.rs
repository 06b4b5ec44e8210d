//! Shared, task-safe access to a session.

use std::sync::Arc;

use tokio::sync::Mutex;

use super::conversation::ConversationId;
use super::session::AgentSession;
use super::state::{SessionState, TurnResult};
use crate::types::Message;

/// Cloneable handle; turns on the same session are serialized by a mutex.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    inner: Arc<Mutex<AgentSession>>,
}

impl SessionHandle {
    pub fn new(session: AgentSession) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    pub async fn start_conversation(&self) -> ConversationId {
        self.inner.lock().await.start_conversation()
    }

    /// Waits for any in-flight turn on this session to finish first.
    pub async fn send_message(&self, text: impl Into<String>) -> TurnResult {
        self.inner.lock().await.send_message(text).await
    }

    /// Snapshot of the current history.
    pub async fn history(&self) -> Vec<Message> {
        self.inner.lock().await.history().to_vec()
    }

    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state()
    }

    /// Run `f` with exclusive access to the session.
    pub async fn with_session<R>(&self, f: impl FnOnce(&mut AgentSession) -> R) -> R {
        let mut guard = self.inner.lock().await;
        f(&mut guard)
    }
}

impl From<AgentSession> for SessionHandle {
    fn from(session: AgentSession) -> Self {
        Self::new(session)
    }
}
