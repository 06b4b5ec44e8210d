//! Key-pair authentication: key loading, fingerprinting and token issuance.

pub mod error;
pub mod issuer;
pub mod key;
pub mod store;
pub mod token;

pub use error::CredentialError;
pub use issuer::{CredentialIssuer, Identity, DEFAULT_LIFETIME_MINUTES};
pub use key::{fingerprint_der, KeyMaterial};
pub use store::{CredentialStore, Credentials, KeyFileCredentialStore, StaticCredentialStore};
pub use token::{AuthToken, Claims};
