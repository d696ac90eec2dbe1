//! Shared types for the email processing pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::channels::DeliveryReceipt;
use crate::llm::SummarySource;

// ── Trigger event ───────────────────────────────────────────────────

/// A storage notification batch: `{"Records": [{"s3": {...}}]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<TriggerRecord>,
}

impl TriggerEvent {
    pub fn new(records: Vec<TriggerRecord>) -> Self {
        Self { records }
    }
}

/// One stored raw email object to process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerRecord {
    #[serde(default)]
    pub s3: ObjectRef,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectRef {
    #[serde(default)]
    pub bucket: BucketRef,
    #[serde(default)]
    pub object: ObjectKey,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BucketRef {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectKey {
    #[serde(default)]
    pub key: String,
}

impl TriggerRecord {
    pub fn new(container: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            s3: ObjectRef {
                bucket: BucketRef {
                    name: container.into(),
                },
                object: ObjectKey {
                    key: locator.into(),
                },
            },
        }
    }

    /// Container name; may be empty, in which case a configured default applies.
    pub fn container(&self) -> &str {
        &self.s3.bucket.name
    }

    pub fn locator(&self) -> &str {
        &self.s3.object.key
    }
}

// ── Outcomes ────────────────────────────────────────────────────────

/// Why a record ended without a notification attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// The message has no `To` header.
    NoRecipientHeader,
    /// The `To` header holds no usable address.
    AddressUnresolvable { header: String },
    /// No directory entry for the address.
    NotSubscribed { address: String },
    /// Directory entry exists but is switched off.
    Inactive { address: String },
    /// Directory entry has no Telegram user id to send to.
    NoChatId { address: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoRecipientHeader => write!(f, "no To header"),
            Self::AddressUnresolvable { header } => write!(f, "unresolvable To header {header:?}"),
            Self::NotSubscribed { address } => write!(f, "no subscriber entry for {address}"),
            Self::Inactive { address } => write!(f, "{address} is inactive"),
            Self::NoChatId { address } => write!(f, "{address} has no telegram user id"),
        }
    }
}

/// Stage at which a record was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetch,
    Extract,
    Gate,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Extract => "extract",
            Self::Gate => "gate",
        }
    }
}

/// Terminal status of one record. Logged, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Skipped {
        reason: SkipReason,
    },
    Delivered {
        receipt: DeliveryReceipt,
        summary_source: SummarySource,
    },
    DeliveryFailed {
        reason: String,
        summary_source: SummarySource,
    },
    /// A fatal error for this record only (storage, parse, directory).
    Aborted {
        stage: Stage,
        reason: String,
    },
}

impl DispatchOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Skipped { .. } => "skipped",
            Self::Delivered { .. } => "delivered",
            Self::DeliveryFailed { .. } => "delivery_failed",
            Self::Aborted { .. } => "aborted",
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }
}

// ── Acknowledgement ─────────────────────────────────────────────────

/// Fixed-shape reply returned once per invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl InvocationResponse {
    pub fn ok() -> Self {
        Self {
            status_code: 200,
            body: "ok".to_string(),
        }
    }
}
