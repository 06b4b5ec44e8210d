//! Executor backed by the SQL API (`POST /api/v2/statements`).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, ACCEPT};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::executor::{ExecutionError, QueryId, ToolExecutor};
use crate::auth::{CredentialIssuer, CredentialStore};
use crate::config::{SessionConfig, StatementContext};
use crate::error::{AgentError, ErrorDetails};
use crate::provider::cortex::account_base_url;
use crate::provider::http::{build_client, keypair_headers};

pub const STATEMENTS_PATH: &str = "/api/v2/statements";

#[derive(Serialize)]
struct StatementRequest<'a> {
    statement: &'a str,
    timeout: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    database: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    schema: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warehouse: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatementResponse {
    statement_handle: Option<String>,
    message: Option<String>,
}

/// Submits statements asynchronously and returns their handle without
/// fetching rows. Each submission is signed with a freshly minted token.
pub struct SqlApiExecutor {
    client: reqwest::Client,
    base_url: String,
    credentials: Arc<dyn CredentialStore>,
    issuer: CredentialIssuer,
    context: StatementContext,
    timeout: Duration,
}

impl SqlApiExecutor {
    pub fn new(
        base_url: impl Into<String>,
        credentials: Arc<dyn CredentialStore>,
        context: StatementContext,
        timeout: Duration,
    ) -> Result<Self, AgentError> {
        Ok(Self {
            client: build_client(timeout + Duration::from_secs(10))?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
            issuer: CredentialIssuer::new(),
            context,
            timeout,
        })
    }

    /// Executor sharing the session's host, statement context, and token lifetime.
    pub fn from_config(
        config: &SessionConfig,
        credentials: Arc<dyn CredentialStore>,
    ) -> Result<Self, AgentError> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| account_base_url(&config.account));
        let mut executor = Self::new(
            base_url,
            credentials,
            config.statement.clone(),
            config.tool_timeout,
        )?;
        executor.issuer = config.issuer();
        Ok(executor)
    }

    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, STATEMENTS_PATH)
    }
}

#[async_trait]
impl ToolExecutor for SqlApiExecutor {
    async fn execute(&self, sql: &str) -> Result<QueryId, ExecutionError> {
        let creds = self.credentials.credentials()?;
        let token = self.issuer.issue(&creds.identity, &creds.key)?;

        let mut headers =
            keypair_headers(&token).map_err(|e| ExecutionError::Failed(e.to_string()))?;
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let body = StatementRequest {
            statement: sql,
            timeout: self.timeout.as_secs(),
            database: self.context.database.as_deref(),
            schema: self.context.schema.as_deref(),
            warehouse: self.context.warehouse.as_deref(),
            role: self.context.role.as_deref(),
        };
        let request_id = uuid::Uuid::new_v4().to_string();

        debug!(request_id = %request_id, "submitting statement");
        let resp = self
            .client
            .post(self.endpoint())
            .query(&[("async", "true"), ("requestId", request_id.as_str())])
            .headers(headers)
            .json(&body)
            .send()
            .await
            .map_err(|e| ExecutionError::Transport(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| ExecutionError::Transport(e.to_string()))?;

        if !status.is_success() {
            let message = ErrorDetails::from_body(&text)
                .and_then(|d| d.message)
                .unwrap_or(text);
            warn!(status = status.as_u16(), "statement submission failed");
            return Err(ExecutionError::Rejected(message));
        }

        let parsed: StatementResponse = serde_json::from_str(&text)
            .map_err(|e| ExecutionError::Failed(format!("unreadable SQL API response: {e}")))?;
        match parsed.statement_handle {
            Some(handle) if !handle.is_empty() => Ok(QueryId::new(handle)),
            _ => Err(ExecutionError::Failed(parsed.message.unwrap_or_else(|| {
                "SQL API response carried no statementHandle".to_string()
            }))),
        }
    }
}

impl std::fmt::Debug for SqlApiExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlApiExecutor")
            .field("base_url", &self.base_url)
            .field("context", &self.context)
            .field("timeout", &self.timeout)
            .finish()
    }
}
