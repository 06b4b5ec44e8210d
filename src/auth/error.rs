use std::path::PathBuf;

use thiserror::Error;

/// Failures while loading key material or signing a token.
///
/// All variants are deterministic for a given input: retrying with the same key
/// material cannot succeed.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Cannot read key file {path}: {message}")]
    KeyUnreadable { path: PathBuf, message: String },
    #[error("Malformed private key: {0}")]
    MalformedPrivateKey(String),
    #[error("Malformed public key: {0}")]
    MalformedPublicKey(String),
    #[error("Private key is encrypted but no passphrase was supplied")]
    PassphraseRequired,
    #[error("Could not decrypt private key: {0}")]
    Decryption(String),
    #[error("Public key does not match private key")]
    KeyMismatch,
    #[error("RSA key too small: {bits} bits (minimum 2048)")]
    WeakKey { bits: usize },
    #[error("Missing identity field: {0}")]
    MissingIdentity(&'static str),
    #[error("Signing failed: {0}")]
    Signing(String),
    #[error("Signed token is not a bare compact JWT")]
    MalformedToken,
}

impl From<jsonwebtoken::errors::Error> for CredentialError {
    fn from(error: jsonwebtoken::errors::Error) -> Self {
        Self::Signing(error.to_string())
    }
}
