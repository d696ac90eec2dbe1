//! File-backed and in-memory secret stores.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use async_trait::async_trait;
use secrecy::SecretString;

use super::SecretStore;
use crate::error::CredentialError;

/// Secrets kept in a JSON file keyed by secret name.
///
/// ```json
/// {
///   "/email-bot/telegram": { "bot_token": "123:ABC" },
///   "/email-bot/openai": "{\"OPENAI_API_KEY\": \"sk-...\"}"
/// }
/// ```
///
/// A value may be the secret object itself or its JSON-encoded string form.
/// The file is re-read on every lookup.
pub struct FileSecretStore {
    path: PathBuf,
}

impl FileSecretStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SecretStore for FileSecretStore {
    async fn get_secret(&self, name: &str) -> Result<SecretString, CredentialError> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            CredentialError::StoreUnavailable(format!("{}: {e}", self.path.display()))
        })?;

        let secrets: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&raw)
            .map_err(|e| {
                CredentialError::StoreUnavailable(format!("{}: {e}", self.path.display()))
            })?;

        match secrets.get(name) {
            Some(serde_json::Value::String(s)) => Ok(SecretString::from(s.clone())),
            Some(other) => Ok(SecretString::from(other.to_string())),
            None => Err(CredentialError::SecretNotFound {
                name: name.to_string(),
            }),
        }
    }
}

/// In-memory secret store.
#[derive(Default)]
pub struct MemorySecretStore {
    secrets: RwLock<HashMap<String, String>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a secret.
    pub fn insert(&self, name: impl Into<String>, value: impl Into<String>) {
        if let Ok(mut guard) = self.secrets.write() {
            guard.insert(name.into(), value.into());
        }
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn get_secret(&self, name: &str) -> Result<SecretString, CredentialError> {
        let guard = self
            .secrets
            .read()
            .map_err(|e| CredentialError::StoreUnavailable(e.to_string()))?;
        guard
            .get(name)
            .map(|s| SecretString::from(s.clone()))
            .ok_or_else(|| CredentialError::SecretNotFound {
                name: name.to_string(),
            })
    }
}
