//! Shared test helpers: fixture keys, SSE bodies, and recording executors.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use wiremock::{MockServer, Request, ResponseTemplate};

use cortex_agent::agent::AgentSession;
use cortex_agent::auth::{
    CredentialError, CredentialStore, Credentials, Identity, KeyFileCredentialStore,
};
use cortex_agent::config::SessionConfig;
use cortex_agent::provider::CortexProvider;
use cortex_agent::tools::{ExecutionError, QueryId, ToolExecutor};
use cortex_agent::types::ToolSet;

pub const ACCOUNT: &str = "xy12345";
pub const USER: &str = "analyst";

pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// Fingerprint of `rsa_key.pub` as computed by openssl.
pub fn expected_fingerprint() -> String {
    let digest = std::fs::read_to_string(fixture("fingerprint.txt")).unwrap();
    format!("SHA256:{}", digest.trim())
}

pub fn credentials() -> Arc<dyn CredentialStore> {
    Arc::new(
        KeyFileCredentialStore::open(
            Identity::new(ACCOUNT, USER),
            &fixture("rsa_key.p8"),
            None,
            Some(&fixture("rsa_key.pub")),
        )
        .unwrap(),
    )
}

pub fn config_for(server: &MockServer) -> SessionConfig {
    SessionConfig::builder()
        .account(ACCOUNT)
        .user(USER)
        .response_instruction("Be concise.")
        .tools(ToolSet::superstore(
            "SUPERSTOREDB",
            "DATA",
            "SUPERSTORE_STAGE",
            "superstore_semantic_model.yaml",
            Some("COMPUTE_WH".to_string()),
        ))
        .base_url(server.uri())
        .build()
}

pub fn session_with(config: SessionConfig, executor: Arc<dyn ToolExecutor>) -> AgentSession {
    session_with_credentials(config, credentials(), executor)
}

pub fn session_with_credentials(
    config: SessionConfig,
    credentials: Arc<dyn CredentialStore>,
    executor: Arc<dyn ToolExecutor>,
) -> AgentSession {
    let provider = Arc::new(
        CortexProvider::new(&config.account, config.base_url.clone(), config.request_timeout)
            .unwrap(),
    );
    AgentSession::new(config, credentials, provider, executor).unwrap()
}

/// Credential store that counts how often a token had to be signed.
pub struct CountingCredentials {
    inner: Arc<dyn CredentialStore>,
    fetches: AtomicUsize,
}

impl CountingCredentials {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: credentials(),
            fetches: AtomicUsize::new(0),
        })
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl CredentialStore for CountingCredentials {
    fn credentials(&self) -> Result<Credentials, CredentialError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.inner.credentials()
    }
}

pub fn session_for(server: &MockServer, executor: Arc<dyn ToolExecutor>) -> AgentSession {
    session_with(config_for(server), executor)
}

/// `data:` line carrying a delta with the given content items.
pub fn delta_line(content: serde_json::Value) -> String {
    format!(
        "data: {}\n\n",
        json!({"delta": {"role": "assistant", "content": content}})
    )
}

pub fn text_line(text: &str) -> String {
    delta_line(json!([{"type": "text", "text": text}]))
}

pub fn tool_use_line(tool_use_id: &str, name: &str, query: &str) -> String {
    delta_line(json!([{
        "type": "tool_use",
        "tool_use": {"tool_use_id": tool_use_id, "name": name, "input": {"query": query}}
    }]))
}

pub const DONE: &str = "data: [DONE]\n\n";

pub fn text_body(parts: &[&str]) -> String {
    let mut body: String = parts.iter().map(|p| text_line(p)).collect();
    body.push_str(DONE);
    body
}

pub fn sse(body: impl Into<String>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.into(), "text/event-stream")
}

pub fn json_body(request: &Request) -> serde_json::Value {
    serde_json::from_slice(&request.body).unwrap()
}

/// Executor that records every statement and answers with a fixed outcome.
pub struct RecordingExecutor {
    outcome: Result<String, String>,
    calls: Mutex<Vec<String>>,
}

impl RecordingExecutor {
    pub fn returning(query_id: &str) -> Arc<Self> {
        Arc::new(Self {
            outcome: Ok(query_id.to_string()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            outcome: Err(message.to_string()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolExecutor for RecordingExecutor {
    async fn execute(&self, sql: &str) -> Result<QueryId, ExecutionError> {
        self.calls.lock().unwrap().push(sql.to_string());
        match &self.outcome {
            Ok(id) => Ok(QueryId::new(id.clone())),
            Err(message) => Err(ExecutionError::Rejected(message.clone())),
        }
    }
}
