//! Session configuration (explicit struct, loadable from env or a TOML file).

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bon::Builder;
use serde::Deserialize;
use tracing::warn;

use crate::auth::{CredentialIssuer, Identity, KeyFileCredentialStore, DEFAULT_LIFETIME_MINUTES};
use crate::error::AgentError;
use crate::provider::DEFAULT_MODEL;
use crate::types::ToolSet;

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You're a helpful assistant for analyzing Superstore retail data.";
pub const DEFAULT_RESPONSE_INSTRUCTION: &str =
    "You will always maintain a friendly tone and provide concise response.";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_DEBUG_BUFFER: usize = 64;

pub const DEFAULT_PRIVATE_KEY_PATH: &str = "rsa_key.p8";
pub const DEFAULT_DATABASE: &str = "SUPERSTOREDB";
pub const DEFAULT_SCHEMA: &str = "DATA";
pub const DEFAULT_STAGE: &str = "SUPERSTORE_STAGE";
pub const DEFAULT_SEMANTIC_MODEL: &str = "superstore_semantic_model.yaml";

const RECOMMENDED_MIN_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Where the key pair lives on disk.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyFiles {
    pub private_key: PathBuf,
    /// Derived from the private key when absent.
    pub public_key: Option<PathBuf>,
    pub passphrase: Option<String>,
}

impl Default for KeyFiles {
    fn default() -> Self {
        Self {
            private_key: PathBuf::from(DEFAULT_PRIVATE_KEY_PATH),
            public_key: None,
            passphrase: None,
        }
    }
}

impl fmt::Debug for KeyFiles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyFiles")
            .field("private_key", &self.private_key)
            .field("public_key", &self.public_key)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Database context for client-side statement execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatementContext {
    pub database: Option<String>,
    pub schema: Option<String>,
    pub warehouse: Option<String>,
    pub role: Option<String>,
}

/// Everything one [`AgentSession`](crate::agent::AgentSession) needs, fixed at
/// construction.
#[derive(Debug, Clone, Builder)]
pub struct SessionConfig {
    #[builder(into)]
    pub account: String,
    #[builder(into)]
    pub user: String,
    #[builder(into, default = DEFAULT_MODEL.to_string())]
    pub model: String,
    #[builder(into, default = DEFAULT_SYSTEM_PROMPT.to_string())]
    pub system_prompt: String,
    #[builder(into)]
    pub response_instruction: Option<String>,
    #[builder(default)]
    pub tools: ToolSet,
    /// Overrides `https://<account>.snowflakecomputing.com`.
    #[builder(into)]
    pub base_url: Option<String>,
    #[builder(default = DEFAULT_REQUEST_TIMEOUT)]
    pub request_timeout: Duration,
    #[builder(default = DEFAULT_TOOL_TIMEOUT)]
    pub tool_timeout: Duration,
    /// Raw chunks retained for inspection; 0 disables.
    #[builder(default = DEFAULT_DEBUG_BUFFER)]
    pub debug_buffer: usize,
    #[builder(default = DEFAULT_LIFETIME_MINUTES)]
    pub token_lifetime_minutes: i64,
    #[builder(default)]
    pub statement: StatementContext,
    #[builder(default)]
    pub keys: KeyFiles,
}

impl SessionConfig {
    /// Load `.env` (if present) and read settings from the process environment.
    pub fn from_env() -> Result<Self, AgentError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AgentError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let secs = |name: &str| -> Result<Option<u64>, AgentError> {
            var(name)
                .map(|v| {
                    v.trim().parse::<u64>().map_err(|_| {
                        AgentError::Configuration(format!("{name} must be a number of seconds"))
                    })
                })
                .transpose()
        };

        let raw = RawConfig {
            account: var("SNOWFLAKE_ACCOUNT"),
            user: var("SNOWFLAKE_USER"),
            model: var("CORTEX_MODEL"),
            base_url: var("CORTEX_BASE_URL"),
            request_timeout_secs: secs("CORTEX_REQUEST_TIMEOUT_SECS")?,
            tool_timeout_secs: secs("CORTEX_TOOL_TIMEOUT_SECS")?,
            database: var("SNOWFLAKE_DATABASE"),
            schema: var("SNOWFLAKE_SCHEMA"),
            warehouse: var("SNOWFLAKE_WAREHOUSE"),
            role: var("SNOWFLAKE_ROLE"),
            stage: var("SNOWFLAKE_STAGE"),
            semantic_model: var("SNOWFLAKE_SEMANTIC_MODEL"),
            keys: RawKeys {
                private_key: var("SNOWFLAKE_PRIVATE_KEY_PATH").map(PathBuf::from),
                public_key: var("SNOWFLAKE_PUBLIC_KEY_PATH").map(PathBuf::from),
                passphrase: var("SNOWFLAKE_PRIVATE_KEY_PASSPHRASE"),
            },
            ..RawConfig::default()
        };
        raw.into_config(None)
    }

    /// Read settings from a TOML file. Relative key paths resolve against the
    /// file's directory.
    pub fn from_toml_file(path: &Path) -> Result<Self, AgentError> {
        let raw = std::fs::read_to_string(path)?;
        let parsed: RawConfig = toml::from_str(&raw).map_err(|e| {
            AgentError::Configuration(format!("invalid config file {}: {e}", path.display()))
        })?;
        parsed.into_config(path.parent())
    }

    /// Default location of the config file: `~/.cortex-agent/config.toml`.
    pub fn default_path() -> PathBuf {
        directories::UserDirs::new()
            .map(|dirs| dirs.home_dir().join(".cortex-agent"))
            .unwrap_or_else(|| PathBuf::from(".cortex-agent"))
            .join("config.toml")
    }

    pub fn identity(&self) -> Identity {
        Identity::new(&self.account, &self.user)
    }

    pub fn issuer(&self) -> CredentialIssuer {
        CredentialIssuer::new().with_lifetime_minutes(self.token_lifetime_minutes)
    }

    /// Open the configured key files.
    pub fn credential_store(&self) -> Result<KeyFileCredentialStore, AgentError> {
        Ok(KeyFileCredentialStore::open(
            self.identity(),
            &self.keys.private_key,
            self.keys.passphrase.as_deref(),
            self.keys.public_key.as_deref(),
        )?)
    }

    pub fn validate(&self) -> Result<(), AgentError> {
        if self.account.trim().is_empty() {
            return Err(AgentError::Configuration("account is required".into()));
        }
        if self.user.trim().is_empty() {
            return Err(AgentError::Configuration("user is required".into()));
        }
        if self.model.trim().is_empty() {
            return Err(AgentError::Configuration("model must not be empty".into()));
        }
        if self.request_timeout.is_zero() || self.tool_timeout.is_zero() {
            return Err(AgentError::Configuration("timeouts must be non-zero".into()));
        }
        if self.request_timeout < RECOMMENDED_MIN_REQUEST_TIMEOUT {
            warn!(
                timeout_secs = self.request_timeout.as_secs(),
                "request timeout below 60s; long agent responses may be cut off"
            );
        }
        self.tools.validate()
    }
}

/// On-disk and environment shape before defaults are applied.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawConfig {
    account: Option<String>,
    user: Option<String>,
    model: Option<String>,
    system_prompt: Option<String>,
    response_instruction: Option<String>,
    base_url: Option<String>,
    request_timeout_secs: Option<u64>,
    tool_timeout_secs: Option<u64>,
    debug_buffer: Option<usize>,
    token_lifetime_minutes: Option<i64>,
    database: Option<String>,
    schema: Option<String>,
    warehouse: Option<String>,
    role: Option<String>,
    stage: Option<String>,
    semantic_model: Option<String>,
    keys: RawKeys,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawKeys {
    private_key: Option<PathBuf>,
    public_key: Option<PathBuf>,
    passphrase: Option<String>,
}

impl RawConfig {
    fn into_config(self, base_dir: Option<&Path>) -> Result<SessionConfig, AgentError> {
        let account = self
            .account
            .ok_or_else(|| AgentError::Configuration("SNOWFLAKE_ACCOUNT is not set".into()))?;
        let user = self
            .user
            .ok_or_else(|| AgentError::Configuration("SNOWFLAKE_USER is not set".into()))?;

        let resolve = |path: PathBuf| match base_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path,
        };
        let keys = KeyFiles {
            private_key: resolve(
                self.keys
                    .private_key
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_PRIVATE_KEY_PATH)),
            ),
            public_key: self.keys.public_key.map(resolve),
            passphrase: self.keys.passphrase,
        };

        let database = self.database.unwrap_or_else(|| DEFAULT_DATABASE.to_string());
        let schema = self.schema.unwrap_or_else(|| DEFAULT_SCHEMA.to_string());
        let tools = ToolSet::superstore(
            &database,
            &schema,
            self.stage.as_deref().unwrap_or(DEFAULT_STAGE),
            self.semantic_model.as_deref().unwrap_or(DEFAULT_SEMANTIC_MODEL),
            self.warehouse.clone(),
        );

        let config = SessionConfig::builder()
            .account(account)
            .user(user)
            .model(self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()))
            .system_prompt(
                self.system_prompt
                    .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            )
            .response_instruction(
                self.response_instruction
                    .unwrap_or_else(|| DEFAULT_RESPONSE_INSTRUCTION.to_string()),
            )
            .tools(tools)
            .maybe_base_url(self.base_url)
            .request_timeout(
                self.request_timeout_secs
                    .map(Duration::from_secs)
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            )
            .tool_timeout(
                self.tool_timeout_secs
                    .map(Duration::from_secs)
                    .unwrap_or(DEFAULT_TOOL_TIMEOUT),
            )
            .debug_buffer(self.debug_buffer.unwrap_or(DEFAULT_DEBUG_BUFFER))
            .token_lifetime_minutes(
                self.token_lifetime_minutes
                    .unwrap_or(DEFAULT_LIFETIME_MINUTES),
            )
            .statement(StatementContext {
                database: Some(database),
                schema: Some(schema),
                warehouse: self.warehouse,
                role: self.role,
            })
            .keys(keys)
            .build();

        config.validate()?;
        Ok(config)
    }
}
