//! mailbrief: summarize inbound email and notify subscribers on Telegram.

pub mod channels;
pub mod config;
pub mod directory;
pub mod email;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod secrets;
pub mod server;
pub mod storage;
