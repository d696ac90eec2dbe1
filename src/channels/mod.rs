//! Outbound notification channels.

pub mod telegram;

pub use telegram::TelegramNotifier;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ChannelError;
use crate::secrets::CredentialProvider;

/// Acknowledgement from the messaging provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub chat_id: String,
    /// Provider-side message id, when the response carried one.
    pub message_id: Option<i64>,
}

/// Sends a summary notification to one recipient. Exactly one attempt.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    async fn notify(
        &self,
        credentials: &CredentialProvider,
        recipient_id: &str,
        subject: &str,
        summary: &str,
    ) -> Result<DeliveryReceipt, ChannelError>;
}
