use std::path::{Path, PathBuf};

use super::error::CredentialError;
use super::issuer::Identity;
use super::key::KeyMaterial;

/// Identity plus the key used to sign its tokens.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub identity: Identity,
    pub key: KeyMaterial,
}

/// Source of the account identity and key material.
///
/// Implementations are read-only after construction and shared across sessions.
pub trait CredentialStore: Send + Sync {
    fn credentials(&self) -> Result<Credentials, CredentialError>;
}

/// In-memory credentials.
#[derive(Debug, Clone)]
pub struct StaticCredentialStore {
    credentials: Credentials,
}

impl StaticCredentialStore {
    pub fn new(identity: Identity, key: KeyMaterial) -> Self {
        Self {
            credentials: Credentials { identity, key },
        }
    }
}

impl CredentialStore for StaticCredentialStore {
    fn credentials(&self) -> Result<Credentials, CredentialError> {
        Ok(self.credentials.clone())
    }
}

/// Credentials loaded once from PEM files on disk.
///
/// # Example
/// ```no_run
/// use std::path::Path;
/// use cortex_agent::auth::{CredentialStore, Identity, KeyFileCredentialStore};
///
/// let store = KeyFileCredentialStore::open(
///     Identity::new("xy12345", "analyst"),
///     Path::new("rsa_key.p8"),
///     None,
///     Some(Path::new("rsa_key.pub")),
/// )?;
/// println!("{}", store.credentials()?.key.fingerprint());
/// # Ok::<(), cortex_agent::auth::CredentialError>(())
/// ```
#[derive(Debug, Clone)]
pub struct KeyFileCredentialStore {
    private_key_path: PathBuf,
    public_key_path: Option<PathBuf>,
    credentials: Credentials,
}

impl KeyFileCredentialStore {
    pub fn open(
        identity: Identity,
        private_key_path: &Path,
        passphrase: Option<&str>,
        public_key_path: Option<&Path>,
    ) -> Result<Self, CredentialError> {
        let key = KeyMaterial::from_files(private_key_path, passphrase, public_key_path)?;
        Ok(Self {
            private_key_path: private_key_path.to_path_buf(),
            public_key_path: public_key_path.map(Path::to_path_buf),
            credentials: Credentials { identity, key },
        })
    }

    pub fn private_key_path(&self) -> &Path {
        &self.private_key_path
    }

    pub fn public_key_path(&self) -> Option<&Path> {
        self.public_key_path.as_deref()
    }
}

impl CredentialStore for KeyFileCredentialStore {
    fn credentials(&self) -> Result<Credentials, CredentialError> {
        Ok(self.credentials.clone())
    }
}
