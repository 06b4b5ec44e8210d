//! Unified error classification and recovery.

use serde::{Deserialize, Serialize};

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Credential,
    Authentication,
    RateLimit,
    Network,
    Timeout,
    Server,
    Api,
    Decode,
    ToolExecution,
    Protocol,
    Configuration,
    Serialization,
    Unknown,
}

/// Structured error body returned by the Snowflake REST endpoints.
///
/// ```json
/// {"code": "390144", "message": "JWT token is invalid.", "request_id": "..."}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetails {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
}

impl ErrorDetails {
    /// Parse an error body, returning `None` when it is not the expected JSON shape.
    pub fn from_body(body: &str) -> Option<Self> {
        let details: Self = serde_json::from_str(body).ok()?;
        if details.code.is_none() && details.message.is_none() {
            return None;
        }
        Some(details)
    }
}

/// Suggested recovery action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverySuggestion {
    RetryTurn,
    CheckKeyMaterial,
    CheckCredentials,
    CheckConfiguration,
    IncreaseTimeout,
    CheckStatement,
    StartNewConversation,
    ContactSupport,
}
