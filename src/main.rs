use std::io::Read;
use std::sync::Arc;

use anyhow::Context;

use mailbrief::channels::TelegramNotifier;
use mailbrief::config::AppConfig;
use mailbrief::directory::LibSqlDirectory;
use mailbrief::llm::{Summarizer, create_provider};
use mailbrief::pipeline::{EmailPipeline, PipelineDeps, TriggerEvent};
use mailbrief::secrets::FileSecretStore;
use mailbrief::server::invoke_routes;
use mailbrief::storage::LocalObjectStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the acknowledgement in one-shot mode.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::from_env()?;

    let directory = LibSqlDirectory::new_local(&config.db_path, &config.subscriber_table)
        .await
        .with_context(|| format!("opening subscriber directory {}", config.db_path.display()))?;

    let deps = PipelineDeps {
        storage: Arc::new(LocalObjectStore::new(&config.object_root)),
        secrets: Arc::new(FileSecretStore::new(&config.secrets_file)),
        directory: Arc::new(directory),
        summarizer: Summarizer::new(create_provider(&config.summarizer), &config.summarizer),
        notifier: Arc::new(TelegramNotifier::new(&config.telegram)),
    };
    let pipeline = Arc::new(EmailPipeline::new(deps, config.default_container.clone()));

    if let Some(addr) = &config.listen {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding {addr}"))?;
        tracing::info!(%addr, "Trigger host listening");
        axum::serve(listener, invoke_routes(pipeline)).await?;
        return Ok(());
    }

    let raw = match std::env::args().nth(1) {
        Some(path) => {
            std::fs::read_to_string(&path).with_context(|| format!("reading event file {path}"))?
        }
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading event from stdin")?;
            buf
        }
    };
    let event: TriggerEvent = serde_json::from_str(&raw).context("parsing trigger event")?;

    let ack = pipeline.handle_event(&event).await;
    println!("{}", serde_json::to_string(&ack)?);
    Ok(())
}
