//! Error types for the agent engine.

pub mod unified;

pub use unified::{ErrorCategory, ErrorDetails, RecoverySuggestion};

use thiserror::Error;

use crate::auth::CredentialError;

/// Primary error type for all engine operations.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("API error (status {status}): {message}")]
    Api {
        status: u16,
        message: String,
        details: Option<ErrorDetails>,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Tool execution error ({tool_name}): {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl AgentError {
    /// Create an API error from a status and raw response body.
    pub fn api(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        let details = ErrorDetails::from_body(&body);
        let message = details
            .as_ref()
            .and_then(|d| d.message.clone())
            .unwrap_or(body);
        Self::Api {
            status,
            message,
            details,
        }
    }

    /// Create a tool execution error.
    pub fn tool_execution(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }

    /// Whether this is a transport-level failure (network, timeout, non-2xx).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Timeout(_) | Self::Api { .. }
        )
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Credential(_) => ErrorCategory::Credential,
            Self::Network(_) => ErrorCategory::Network,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::Decode(_) => ErrorCategory::Decode,
            Self::ToolExecution { .. } => ErrorCategory::ToolExecution,
            Self::ProtocolViolation(_) => ErrorCategory::Protocol,
            Self::Api { status, .. } => match status {
                401 | 403 => ErrorCategory::Authentication,
                429 => ErrorCategory::RateLimit,
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Api,
            },
            Self::Io(_) | Self::InvalidState(_) => ErrorCategory::Unknown,
        }
    }

    /// Whether the caller may safely resend the same user turn.
    ///
    /// Tool execution failures are never retryable here: the statement may have
    /// side effects.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::RateLimit
                | ErrorCategory::Network
                | ErrorCategory::Timeout
                | ErrorCategory::Server
        )
    }

    /// Suggest recovery actions.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self.category() {
            ErrorCategory::Credential => RecoverySuggestion::CheckKeyMaterial,
            ErrorCategory::Authentication => RecoverySuggestion::CheckCredentials,
            ErrorCategory::RateLimit
            | ErrorCategory::Network
            | ErrorCategory::Server => RecoverySuggestion::RetryTurn,
            ErrorCategory::Timeout => RecoverySuggestion::IncreaseTimeout,
            ErrorCategory::Configuration => RecoverySuggestion::CheckConfiguration,
            ErrorCategory::ToolExecution => RecoverySuggestion::CheckStatement,
            ErrorCategory::Protocol => RecoverySuggestion::StartNewConversation,
            _ => RecoverySuggestion::ContactSupport,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, AgentError>;
