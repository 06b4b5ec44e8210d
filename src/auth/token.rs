use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::CredentialError;

/// Claim set signed into every key-pair token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// A short-lived signed credential for exactly one outbound request.
///
/// `token` is the bare compact JWT. Use [`AuthToken::bearer`] to build the
/// `Authorization` header value.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken {
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub issuer: String,
    pub subject: String,
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthToken")
            .field("token", &self.redacted())
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .field("issuer", &self.issuer)
            .field("subject", &self.subject)
            .finish()
    }
}

impl AuthToken {
    /// `Authorization` header value.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }

    /// Short prefix safe to log.
    pub fn redacted(&self) -> String {
        let prefix: String = self.token.chars().take(10).collect();
        format!("{prefix}...")
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    /// Lifetime in whole seconds.
    pub fn lifetime_secs(&self) -> i64 {
        (self.expires_at - self.issued_at).num_seconds()
    }

    /// Decode the payload segment without verifying the signature.
    pub fn claims(&self) -> Result<Claims, CredentialError> {
        let payload = self
            .token
            .split('.')
            .nth(1)
            .ok_or(CredentialError::MalformedToken)?;
        let raw = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| CredentialError::MalformedToken)?;
        serde_json::from_slice(&raw).map_err(|_| CredentialError::MalformedToken)
    }
}
