//! Email pipeline: turns one stored email into at most one notification.
//!
//! Per record:
//! 1. Fetch the raw object from storage
//! 2. Extract subject / `To` / body
//! 3. Resolve the recipient address
//! 4. Gate on the subscriber directory (exists and active)
//! 5. Summarize (never fails, falls back to fixed text)
//! 6. Notify (one attempt, failures are logged)
//!
//! Every failure is contained in its record; a batch is always processed
//! to the end.

use std::sync::Arc;

use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::channels::Notifier;
use crate::directory::SubscriberDirectory;
use crate::email::{self, RawEmailObject};
use crate::error::AddressError;
use crate::llm::Summarizer;
use crate::pipeline::types::{
    DispatchOutcome, InvocationResponse, SkipReason, Stage, TriggerEvent, TriggerRecord,
};
use crate::secrets::{CredentialProvider, SecretStore};
use crate::storage::ObjectStore;

/// The external collaborators a pipeline is built from.
pub struct PipelineDeps {
    pub storage: Arc<dyn ObjectStore>,
    pub secrets: Arc<dyn SecretStore>,
    pub directory: Arc<dyn SubscriberDirectory>,
    pub summarizer: Summarizer,
    pub notifier: Arc<dyn Notifier>,
}

/// Per-record email pipeline.
pub struct EmailPipeline {
    storage: Arc<dyn ObjectStore>,
    secrets: Arc<dyn SecretStore>,
    directory: Arc<dyn SubscriberDirectory>,
    summarizer: Summarizer,
    notifier: Arc<dyn Notifier>,
    default_container: String,
}

impl EmailPipeline {
    pub fn new(deps: PipelineDeps, default_container: impl Into<String>) -> Self {
        Self {
            storage: deps.storage,
            secrets: deps.secrets,
            directory: deps.directory,
            summarizer: deps.summarizer,
            notifier: deps.notifier,
            default_container: default_container.into(),
        }
    }

    /// Handle one trigger invocation and acknowledge it.
    pub async fn handle_event(&self, event: &TriggerEvent) -> InvocationResponse {
        self.process_event(event).await;
        InvocationResponse::ok()
    }

    /// Process every record of an event, in order, returning one outcome each.
    ///
    /// Credentials resolved while processing are shared by the batch and
    /// dropped when it ends.
    pub async fn process_event(&self, event: &TriggerEvent) -> Vec<DispatchOutcome> {
        let invocation = Uuid::new_v4();
        let count = event.records.len();
        info!(%invocation, records = count, "Processing trigger event");

        let credentials = CredentialProvider::new(Arc::clone(&self.secrets));
        let mut outcomes = Vec::with_capacity(count);

        for record in &event.records {
            let container = self.container_for(record).to_string();
            let span = info_span!(
                "record",
                %invocation,
                container = %container,
                locator = %record.locator()
            );
            let outcome = self
                .process_record(&container, record.locator(), &credentials)
                .instrument(span)
                .await;
            outcomes.push(outcome);
        }

        let delivered = outcomes.iter().filter(|o| o.is_delivered()).count();
        let skipped = outcomes.iter().filter(|o| o.is_skipped()).count();
        info!(
            %invocation,
            total = count,
            delivered,
            skipped,
            failed = count - delivered - skipped,
            "Trigger event processed"
        );
        outcomes
    }

    fn container_for<'a>(&'a self, record: &'a TriggerRecord) -> &'a str {
        if record.container().is_empty() {
            &self.default_container
        } else {
            record.container()
        }
    }

    /// Fetch and process one stored object.
    pub async fn process_record(
        &self,
        container: &str,
        locator: &str,
        credentials: &CredentialProvider,
    ) -> DispatchOutcome {
        info!("Processing new email from {container}/{locator}");

        let raw = match self.storage.get_object(container, locator).await {
            Ok(bytes) => RawEmailObject {
                container: container.to_string(),
                locator: locator.to_string(),
                bytes,
            },
            Err(e) => {
                error!(error = %e, "Failed to read email object");
                return DispatchOutcome::Aborted {
                    stage: Stage::Fetch,
                    reason: e.to_string(),
                };
            }
        };

        let outcome = self.process_message(&raw, credentials).await;
        log_outcome(&outcome);
        outcome
    }

    /// Run an already-fetched raw message through extract → resolve → gate →
    /// summarize → notify.
    pub async fn process_message(
        &self,
        raw: &RawEmailObject,
        credentials: &CredentialProvider,
    ) -> DispatchOutcome {
        debug!(
            container = %raw.container,
            locator = %raw.locator,
            size = raw.bytes.len(),
            "Extracting email"
        );
        let parsed = match email::extract(&raw.bytes) {
            Ok(parsed) => parsed,
            Err(e) => {
                return DispatchOutcome::Aborted {
                    stage: Stage::Extract,
                    reason: format!("{}/{}: {e}", raw.container, raw.locator),
                };
            }
        };
        debug!(subject = %parsed.subject, body_len = parsed.body.len(), "Extracted subject/body");

        let address = match email::resolve(parsed.to_header.as_deref()) {
            Ok(address) => address,
            Err(AddressError::MissingHeader) => {
                return DispatchOutcome::Skipped {
                    reason: SkipReason::NoRecipientHeader,
                };
            }
            Err(AddressError::Unresolvable { header }) => {
                return DispatchOutcome::Skipped {
                    reason: SkipReason::AddressUnresolvable { header },
                };
            }
        };
        debug!(recipient = %address, "Resolved recipient");

        let subscriber = match self.directory.lookup(&address).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                return DispatchOutcome::Skipped {
                    reason: SkipReason::NotSubscribed {
                        address: address.to_string(),
                    },
                };
            }
            Err(e) => {
                return DispatchOutcome::Aborted {
                    stage: Stage::Gate,
                    reason: e.to_string(),
                };
            }
        };

        if !subscriber.active {
            return DispatchOutcome::Skipped {
                reason: SkipReason::Inactive {
                    address: address.to_string(),
                },
            };
        }
        let chat_id = subscriber.telegram_user_id.trim();
        if chat_id.is_empty() {
            return DispatchOutcome::Skipped {
                reason: SkipReason::NoChatId {
                    address: address.to_string(),
                },
            };
        }

        let summary = self
            .summarizer
            .summarize(credentials, &parsed.subject, &parsed.body)
            .await;

        match self
            .notifier
            .notify(credentials, chat_id, &parsed.subject, &summary.text)
            .await
        {
            Ok(receipt) => DispatchOutcome::Delivered {
                receipt,
                summary_source: summary.source,
            },
            Err(e) => DispatchOutcome::DeliveryFailed {
                reason: e.to_string(),
                summary_source: summary.source,
            },
        }
    }
}

fn log_outcome(outcome: &DispatchOutcome) {
    match outcome {
        DispatchOutcome::Skipped { reason } => {
            info!(outcome = outcome.label(), %reason, "Skipping email");
        }
        DispatchOutcome::Delivered { summary_source, .. } => {
            info!(outcome = outcome.label(), summary_source = ?summary_source, "Email delivered");
        }
        DispatchOutcome::DeliveryFailed { reason, .. } => {
            warn!(outcome = outcome.label(), %reason, "Notification failed");
        }
        DispatchOutcome::Aborted { stage, reason } => {
            error!(outcome = outcome.label(), stage = stage.label(), %reason, "Email abandoned");
        }
    }
}
