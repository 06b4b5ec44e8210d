//! Statement executor seam and closure-based executor.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::CredentialError;

/// Opaque handle of a submitted statement. Only the id is round-tripped to
/// the agent; rows stay in the warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryId(String);

impl QueryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QueryId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for QueryId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Why a statement could not be executed.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Statement rejected: {0}")]
    Rejected(String),
    #[error("Executor transport failure: {0}")]
    Transport(String),
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error("{0}")]
    Failed(String),
}

/// Executes a SQL string and returns the statement handle.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, sql: &str) -> Result<QueryId, ExecutionError>;
}

type ExecHandler = dyn Fn(String) -> Pin<Box<dyn Future<Output = Result<QueryId, ExecutionError>> + Send>>
    + Send
    + Sync;

/// Closure-based executor.
///
/// ```
/// use cortex_agent::tools::{FnExecutor, QueryId};
///
/// let executor = FnExecutor::new(|_sql| async { Ok(QueryId::new("01ab")) });
/// # let _ = executor;
/// ```
#[derive(Clone)]
pub struct FnExecutor {
    handler: Arc<ExecHandler>,
}

impl FnExecutor {
    pub fn new<F, Fut>(handler: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<QueryId, ExecutionError>> + Send + 'static,
    {
        Self {
            handler: Arc::new(move |sql| Box::pin(handler(sql))),
        }
    }
}

#[async_trait]
impl ToolExecutor for FnExecutor {
    async fn execute(&self, sql: &str) -> Result<QueryId, ExecutionError> {
        (self.handler)(sql.to_string()).await
    }
}

impl fmt::Debug for FnExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnExecutor").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[tokio::test]
    async fn fn_executor_passes_sql_through() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let executor = FnExecutor::new(move |sql| {
            sink.lock().unwrap().push(sql);
            async { Ok(QueryId::new("01ab")) }
        });

        let id = executor.execute("SELECT 1").await.unwrap();
        assert_eq!(id.as_str(), "01ab");
        assert_eq!(*seen.lock().unwrap(), vec!["SELECT 1".to_string()]);
    }

    #[tokio::test]
    async fn fn_executor_propagates_failure() {
        let executor = FnExecutor::new(|_| async {
            Err(ExecutionError::Rejected("SQL compilation error".into()))
        });
        let err = executor.execute("SELEC").await.unwrap_err();
        assert_eq!(err.to_string(), "Statement rejected: SQL compilation error");
    }

    #[test]
    fn query_id_serializes_as_plain_string() {
        let id = QueryId::from("01b2");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"01b2\"");
        assert_eq!(id.to_string(), "01b2");
    }
}
