//! Email processing pipeline.
//!
//! Every record of a trigger event flows through:
//! 1. `ObjectStore::get_object()`: raw bytes
//! 2. `email::extract()` / `email::resolve()`: subject, body, recipient
//! 3. `SubscriberDirectory::lookup()`: the subscription gate
//! 4. `Summarizer::summarize()`: LLM summary or fixed fallback
//! 5. `Notifier::notify()`: one delivery attempt
//!
//! **No record can fail the batch.** Each one ends in a `DispatchOutcome`.

pub mod processor;
pub mod types;

pub use processor::{EmailPipeline, PipelineDeps};
pub use types::{
    DispatchOutcome, InvocationResponse, SkipReason, Stage, TriggerEvent, TriggerRecord,
};
