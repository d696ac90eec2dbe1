//! Secret store access and the per-invocation credential provider.

pub mod file;

pub use file::{FileSecretStore, MemorySecretStore};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::CredentialRef;
use crate::error::CredentialError;

/// A store of named secrets. Each secret is a string holding a JSON object.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch the raw secret string for `name`.
    async fn get_secret(&self, name: &str) -> Result<SecretString, CredentialError>;
}

/// Resolves credential fields out of named secrets.
///
/// One provider is created per invocation; resolved values are cached for
/// its lifetime only, so a rotated secret is picked up on the next trigger.
pub struct CredentialProvider {
    store: Arc<dyn SecretStore>,
    cache: Mutex<HashMap<CredentialRef, SecretString>>,
}

impl CredentialProvider {
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self {
            store,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve one required string field of a named secret.
    pub async fn get_credential(
        &self,
        credential: &CredentialRef,
    ) -> Result<SecretString, CredentialError> {
        let mut cache = self.cache.lock().await;
        if let Some(value) = cache.get(credential) {
            return Ok(value.clone());
        }

        let raw = self.store.get_secret(&credential.secret_name).await?;
        let value = extract_field(&credential.secret_name, &raw, &credential.field)?;
        debug!(secret = %credential.secret_name, field = %credential.field, "Credential resolved");

        cache.insert(credential.clone(), value.clone());
        Ok(value)
    }
}

/// Parse a secret string as a JSON object and pull out a non-empty string field.
fn extract_field(
    name: &str,
    raw: &SecretString,
    field: &str,
) -> Result<SecretString, CredentialError> {
    let parsed: serde_json::Value =
        serde_json::from_str(raw.expose_secret()).map_err(|e| CredentialError::Malformed {
            name: name.to_string(),
            reason: e.to_string(),
        })?;

    let object = parsed.as_object().ok_or_else(|| CredentialError::Malformed {
        name: name.to_string(),
        reason: "expected a JSON object".to_string(),
    })?;

    object
        .get(field)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(|s| SecretString::from(s.to_string()))
        .ok_or_else(|| CredentialError::MissingField {
            name: name.to_string(),
            field: field.to_string(),
        })
}
