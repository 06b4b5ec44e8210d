//! Cortex Agents `agent:run` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tracing::debug;

use super::http::{agent_headers, build_client, status_to_error, transport_error};
use super::{AgentProvider, AgentRequest, ByteStream};
use crate::auth::AuthToken;
use crate::error::AgentError;

pub const AGENT_RUN_PATH: &str = "/api/v2/cortex/agent:run";

/// `https://<account>.snowflakecomputing.com`
pub fn account_base_url(account: &str) -> String {
    format!("https://{}.snowflakecomputing.com", account.trim().to_lowercase())
}

/// Streaming client for the Cortex Agents API.
#[derive(Debug, Clone)]
pub struct CortexProvider {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl CortexProvider {
    /// `base_url` overrides the account host (tests, private link).
    pub fn new(
        account: &str,
        base_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self, AgentError> {
        let base_url = base_url
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| account_base_url(account));
        Ok(Self {
            client: build_client(timeout)?,
            base_url,
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, AGENT_RUN_PATH)
    }
}

#[async_trait]
impl AgentProvider for CortexProvider {
    fn provider_name(&self) -> &str {
        "cortex"
    }

    async fn run(
        &self,
        token: &AuthToken,
        request: &AgentRequest,
    ) -> Result<ByteStream, AgentError> {
        let url = self.endpoint();
        debug!(
            url = %url,
            token = %token.redacted(),
            messages = request.messages.len(),
            "POST agent:run"
        );

        let resp = self
            .client
            .post(&url)
            .headers(agent_headers(token)?)
            .json(request)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body_text));
        }

        let timeout = self.timeout;
        let body = resp
            .bytes_stream()
            .map(move |chunk| chunk.map_err(|e| transport_error(e, timeout)));
        Ok(body.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_endpoint_uses_account_host() {
        let provider = CortexProvider::new("MyOrg-Acct", None, Duration::from_secs(60)).unwrap();
        assert_eq!(
            provider.endpoint(),
            "https://myorg-acct.snowflakecomputing.com/api/v2/cortex/agent:run"
        );
    }

    #[test]
    fn base_url_override_drops_trailing_slash() {
        let provider = CortexProvider::new(
            "acct",
            Some("http://127.0.0.1:9999/".to_string()),
            Duration::from_secs(60),
        )
        .unwrap();
        assert_eq!(provider.endpoint(), "http://127.0.0.1:9999/api/v2/cortex/agent:run");
    }
}
