use std::collections::HashMap;
use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use oas_core::AuthError;
use pipeline_logging::pipeline_debug;

use crate::token::Credentials;

/// Key/value lookup of client credentials by logical name.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// `Ok(None)` when no secret exists under `name`.
    async fn get_secret(&self, name: &str) -> Result<Option<Credentials>, AuthError>;
}

/// Reads credentials from two environment variables; the secret name is ignored.
#[derive(Debug, Clone)]
pub struct EnvSecretStore {
    id_var: String,
    secret_var: String,
}

impl Default for EnvSecretStore {
    fn default() -> Self {
        Self::new("CLIENT_ID", "CLIENT_SECRET")
    }
}

impl EnvSecretStore {
    pub fn new(id_var: impl Into<String>, secret_var: impl Into<String>) -> Self {
        Self {
            id_var: id_var.into(),
            secret_var: secret_var.into(),
        }
    }
}

#[async_trait]
impl SecretStore for EnvSecretStore {
    async fn get_secret(&self, _name: &str) -> Result<Option<Credentials>, AuthError> {
        let id = std::env::var(&self.id_var).ok().filter(|v| !v.is_empty());
        let secret = std::env::var(&self.secret_var).ok().filter(|v| !v.is_empty());
        Ok(match (id, secret) {
            (Some(id), Some(secret)) => Some(Credentials::new(id, secret)),
            _ => None,
        })
    }
}

/// One JSON document per secret: `{dir}/{name}.json` holding
/// `{"client_id": ..., "client_secret": ...}`.
#[derive(Debug, Clone)]
pub struct FileSecretStore {
    dir: PathBuf,
}

impl FileSecretStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl SecretStore for FileSecretStore {
    async fn get_secret(&self, name: &str) -> Result<Option<Credentials>, AuthError> {
        let path = self.dir.join(format!("{name}.json"));
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                pipeline_debug!("No secret file at {:?}", path);
                return Ok(None);
            }
            Err(err) => {
                return Err(AuthError::MissingCredentials(format!(
                    "{name}: cannot read {}: {err}",
                    path.display()
                )));
            }
        };
        let credentials: Credentials = serde_json::from_str(&text).map_err(|err| {
            AuthError::MissingCredentials(format!(
                "{name}: secret must contain client_id and client_secret ({err})"
            ))
        })?;
        Ok(Some(credentials))
    }
}

/// In-memory secrets, for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticSecretStore {
    secrets: HashMap<String, Credentials>,
}

impl StaticSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(mut self, name: impl Into<String>, credentials: Credentials) -> Self {
        self.secrets.insert(name.into(), credentials);
        self
    }
}

#[async_trait]
impl SecretStore for StaticSecretStore {
    async fn get_secret(&self, name: &str) -> Result<Option<Credentials>, AuthError> {
        Ok(self.secrets.get(name).cloned())
    }
}
