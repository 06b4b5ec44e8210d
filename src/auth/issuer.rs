//! Key-pair JWT issuance.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, Header};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::CredentialError;
use super::key::KeyMaterial;
use super::token::{AuthToken, Claims};

/// Default token lifetime. The service rejects anything above 60 minutes.
pub const DEFAULT_LIFETIME_MINUTES: i64 = 59;
const MAX_LIFETIME_MINUTES: i64 = 59;

/// Account and user the token is issued for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub account: String,
    pub user: String,
}

impl Identity {
    pub fn new(account: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            user: user.into(),
        }
    }

    /// `ACCOUNT.USER`, upper-cased.
    pub fn qualified_user(&self) -> String {
        format!(
            "{}.{}",
            self.account.trim().to_uppercase(),
            self.user.trim().to_uppercase()
        )
    }

    fn validate(&self) -> Result<(), CredentialError> {
        if self.account.trim().is_empty() {
            return Err(CredentialError::MissingIdentity("account"));
        }
        if self.user.trim().is_empty() {
            return Err(CredentialError::MissingIdentity("user"));
        }
        Ok(())
    }
}

/// Mints RS256 tokens from an [`Identity`] and [`KeyMaterial`].
///
/// Stateless apart from the configured lifetime; call [`issue`](Self::issue)
/// once per outbound request.
#[derive(Debug, Clone)]
pub struct CredentialIssuer {
    lifetime: Duration,
}

impl Default for CredentialIssuer {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialIssuer {
    pub fn new() -> Self {
        Self {
            lifetime: Duration::minutes(DEFAULT_LIFETIME_MINUTES),
        }
    }

    /// Override the lifetime, clamped to 1..=59 minutes.
    pub fn with_lifetime_minutes(mut self, minutes: i64) -> Self {
        self.lifetime = Duration::minutes(minutes.clamp(1, MAX_LIFETIME_MINUTES));
        self
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Issue a token valid from now.
    pub fn issue(
        &self,
        identity: &Identity,
        key: &KeyMaterial,
    ) -> Result<AuthToken, CredentialError> {
        self.issue_at(identity, key, Utc::now())
    }

    /// Issue a token as of `now`.
    pub fn issue_at(
        &self,
        identity: &Identity,
        key: &KeyMaterial,
        now: DateTime<Utc>,
    ) -> Result<AuthToken, CredentialError> {
        identity.validate()?;

        let subject = identity.qualified_user();
        let issuer = format!("{subject}.{}", key.fingerprint());
        let iat = now.timestamp();
        let exp = iat + self.lifetime.num_seconds();

        let claims = Claims {
            iss: issuer.clone(),
            sub: subject.clone(),
            iat,
            exp,
        };
        let token = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, key.encoding_key())?;

        if token.starts_with("Bearer ") || token.split('.').count() != 3 {
            return Err(CredentialError::MalformedToken);
        }

        let issued_at = DateTime::<Utc>::from_timestamp(iat, 0)
            .ok_or_else(|| CredentialError::Signing(format!("timestamp out of range: {iat}")))?;
        let expires_at = DateTime::<Utc>::from_timestamp(exp, 0)
            .ok_or_else(|| CredentialError::Signing(format!("timestamp out of range: {exp}")))?;

        debug!(subject = %subject, fingerprint = key.fingerprint(), exp, "issued key-pair token");

        Ok(AuthToken {
            token,
            issued_at,
            expires_at,
            issuer,
            subject,
        })
    }
}
