//! Subscriber directory: who may receive summaries, and where.

pub mod libsql_backend;

pub use libsql_backend::LibSqlDirectory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::email::CanonicalAddress;
use crate::error::DirectoryError;

/// A directory entry keyed by canonical email address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberRecord {
    pub email_address: String,
    pub active: bool,
    pub telegram_user_id: String,
}

/// Read-only point lookups against the subscriber directory.
#[async_trait]
pub trait SubscriberDirectory: Send + Sync {
    /// `Ok(None)` when no entry exists for `address`.
    async fn lookup(
        &self,
        address: &CanonicalAddress,
    ) -> Result<Option<SubscriberRecord>, DirectoryError>;
}
