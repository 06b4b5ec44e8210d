//! Shared HTTP client construction, header composition, and status mapping.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};

use crate::auth::{AuthToken, CredentialError};
use crate::error::AgentError;

pub const TOKEN_TYPE_HEADER: &str = "X-Snowflake-Authorization-Token-Type";
pub const KEYPAIR_JWT: &str = "KEYPAIR_JWT";

const CLIENT_USER_AGENT: &str = concat!("cortex-agent/", env!("CARGO_PKG_VERSION"));

/// Build an HTTP client whose overall request timeout covers the streamed body.
pub fn build_client(request_timeout: Duration) -> Result<reqwest::Client, AgentError> {
    reqwest::Client::builder()
        .timeout(request_timeout)
        .connect_timeout(Duration::from_secs(30))
        .pool_max_idle_per_host(4)
        .build()
        .map_err(AgentError::from)
}

/// Headers for a key-pair authenticated JSON call.
///
/// The `Authorization` value is composed here and nowhere else.
pub fn keypair_headers(token: &AuthToken) -> Result<HeaderMap, AgentError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));
    headers.insert(TOKEN_TYPE_HEADER, HeaderValue::from_static(KEYPAIR_JWT));

    let mut bearer =
        HeaderValue::from_str(&token.bearer()).map_err(|_| CredentialError::MalformedToken)?;
    bearer.set_sensitive(true);
    headers.insert(AUTHORIZATION, bearer);
    Ok(headers)
}

/// [`keypair_headers`] plus `Accept: text/event-stream`.
pub fn agent_headers(token: &AuthToken) -> Result<HeaderMap, AgentError> {
    let mut headers = keypair_headers(token)?;
    headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
    Ok(headers)
}

/// Map a non-success status and its body to an error.
pub fn status_to_error(status: u16, body: &str) -> AgentError {
    AgentError::api(status, body)
}

/// Map a reqwest failure, surfacing client timeouts as [`AgentError::Timeout`].
pub fn transport_error(err: reqwest::Error, timeout: Duration) -> AgentError {
    if err.is_timeout() {
        AgentError::Timeout(timeout.as_millis() as u64)
    } else {
        AgentError::Network(err)
    }
}
