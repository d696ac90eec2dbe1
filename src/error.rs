//! Error types for mailbrief.

use std::time::Duration;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Object storage errors. Fatal for the record being read.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Object not found: {container}/{locator}")]
    NotFound { container: String, locator: String },

    #[error("Invalid object locator {locator:?}: {reason}")]
    InvalidLocator { locator: String, reason: String },

    #[error("Failed to read {container}/{locator}: {source}")]
    Read {
        container: String,
        locator: String,
        #[source]
        source: std::io::Error,
    },
}

/// Secret resolution errors (`CredentialUnavailable`).
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("Secret {name} not found")]
    SecretNotFound { name: String },

    #[error("Secret {name} is not a JSON object: {reason}")]
    Malformed { name: String, reason: String },

    #[error("Secret {name} has no usable field {field}")]
    MissingField { name: String, field: String },

    #[error("Secret store unavailable: {0}")]
    StoreUnavailable(String),
}

/// MIME parsing errors (`UnparsableMessage`).
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Unparsable message: {0}")]
    UnparsableMessage(String),
}

/// Recipient resolution errors (`AddressUnresolvable`).
#[derive(Debug, thiserror::Error)]
pub enum AddressError {
    #[error("No recipient header")]
    MissingHeader,

    #[error("Could not resolve an address from {header:?}")]
    Unresolvable { header: String },
}

/// Subscriber directory errors.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Invalid table name: {0}")]
    InvalidTable(String),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} returned status {status}: {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Provider {provider} timed out after {timeout:?}")]
    Timeout { provider: String, timeout: Duration },

    #[error("Credential unavailable: {0}")]
    Credential(#[from] CredentialError),
}

/// Messaging channel errors (`DeliveryFailed`).
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Failed to send on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("Channel {name} timed out after {timeout:?}")]
    Timeout { name: String, timeout: Duration },

    #[error("Credential unavailable: {0}")]
    Credential(#[from] CredentialError),
}
