//! End-to-end tests for the email pipeline.
//!
//! Each test spins up Axum servers on random ports standing in for the chat
//! completion endpoint and the Telegram Bot API, then drives real raw emails
//! from a local object store through the real directory, summarizer, and
//! notifier.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;

use mailbrief::channels::{Notifier, TelegramNotifier};
use mailbrief::config::{SummarizerConfig, TelegramConfig};
use mailbrief::directory::LibSqlDirectory;
use mailbrief::error::ChannelError;
use mailbrief::llm::{FALLBACK_SUMMARY, Summarizer, SummarySource, create_provider};
use mailbrief::pipeline::{
    DispatchOutcome, EmailPipeline, InvocationResponse, PipelineDeps, SkipReason, Stage,
    TriggerEvent, TriggerRecord,
};
use mailbrief::secrets::{CredentialProvider, FileSecretStore, MemorySecretStore};
use mailbrief::storage::LocalObjectStore;

const BOT_TOKEN: &str = "test-token";
const API_KEY: &str = "sk-test";
const CONTAINER: &str = "inbound-mail";

// ── Fake upstreams ──────────────────────────────────────────────────

#[derive(Clone, Default)]
struct Recorded {
    completions: Arc<Mutex<Vec<(Option<String>, Value)>>>,
    messages: Arc<Mutex<Vec<Value>>>,
}

impl Recorded {
    fn completions(&self) -> Vec<(Option<String>, Value)> {
        self.completions.lock().unwrap().clone()
    }

    fn messages(&self) -> Vec<Value> {
        self.messages.lock().unwrap().clone()
    }
}

/// How the fake chat completion endpoint answers.
#[derive(Clone, Copy)]
enum Completion {
    Reply,
    ServerError,
}

async fn fake_completion(
    State((recorded, mode)): State<(Recorded, Completion)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    recorded.completions.lock().unwrap().push((auth, body));

    match mode {
        Completion::Reply => (
            StatusCode::OK,
            Json(json!({
                "choices": [{"message": {"role": "assistant", "content": "Generated summary."}}]
            })),
        ),
        Completion::ServerError => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": {"message": "upstream exploded"}})),
        ),
    }
}

async fn fake_send_message(
    State(recorded): State<Recorded>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    recorded.messages.lock().unwrap().push(body.clone());

    if body["chat_id"] == "slow" {
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    if body["chat_id"] == "blocked" {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({
                "ok": false,
                "error_code": 403,
                "description": "Forbidden: bot was blocked by the user"
            })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({"ok": true, "result": {"message_id": 42}})),
    )
}

/// Start both fake upstreams on one random port, return its base URL.
async fn start_upstreams(recorded: Recorded, mode: Completion) -> String {
    let completions = Router::new()
        .route("/v1/chat/completions", post(fake_completion))
        .with_state((recorded.clone(), mode));
    let telegram = Router::new()
        .route(&format!("/bot{BOT_TOKEN}/sendMessage"), post(fake_send_message))
        .with_state(recorded);
    let app = completions.merge(telegram);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;
    format!("http://127.0.0.1:{port}")
}

// ── Fixtures ────────────────────────────────────────────────────────

fn write_object(root: &Path, key: &str, raw: &str) {
    let path = root.join(CONTAINER).join(key);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, raw).unwrap();
}

fn write_secrets(path: &Path) {
    let secrets = json!({
        "/email-bot/telegram": {"bot_token": BOT_TOKEN},
        "/email-bot/openai": format!("{{\"OPENAI_API_KEY\": \"{API_KEY}\"}}"),
    });
    std::fs::write(path, secrets.to_string()).unwrap();
}

async fn seed_directory(path: &Path, rows: &[(&str, i64, &str)]) {
    let db = libsql::Builder::new_local(path).build().await.unwrap();
    let conn = db.connect().unwrap();
    conn.execute(
        r#"CREATE TABLE IF NOT EXISTS "EmailBotAddresses" (
            email_address TEXT PRIMARY KEY,
            active INTEGER NOT NULL DEFAULT 0,
            telegram_user_id TEXT NOT NULL DEFAULT ''
        )"#,
        (),
    )
    .await
    .unwrap();
    for (email, active, chat) in rows {
        conn.execute(
            r#"INSERT INTO "EmailBotAddresses" VALUES (?1, ?2, ?3)"#,
            libsql::params![*email, *active, *chat],
        )
        .await
        .unwrap();
    }
}

fn multipart_email(to: &str, subject: &str) -> String {
    format!(
        "From: Billing <billing@vendor.example>\r\n\
         To: {to}\r\n\
         Subject: {subject}\r\n\
         MIME-Version: 1.0\r\n\
         Content-Type: multipart/alternative; boundary=\"XYZ\"\r\n\
         \r\n\
         --XYZ\r\n\
         Content-Type: text/plain; charset=utf-8\r\n\
         \r\n\
         Plain invoice text\r\n\
         --XYZ\r\n\
         Content-Type: text/html; charset=utf-8\r\n\
         \r\n\
         <p>HTML invoice text</p>\r\n\
         --XYZ--\r\n"
    )
}

fn plain_email(to: &str, subject: &str, body: &str) -> String {
    format!("From: a@b.example\r\nTo: {to}\r\nSubject: {subject}\r\n\r\n{body}\r\n")
}

struct Env {
    _dir: tempfile::TempDir,
    pipeline: EmailPipeline,
    recorded: Recorded,
}

async fn setup(
    objects: &[(&str, String)],
    subscribers: &[(&str, i64, &str)],
    mode: Completion,
) -> Env {
    setup_with_send_timeout(objects, subscribers, mode, Duration::from_secs(5)).await
}

async fn setup_with_send_timeout(
    objects: &[(&str, String)],
    subscribers: &[(&str, i64, &str)],
    mode: Completion,
    send_timeout: Duration,
) -> Env {
    let dir = tempfile::tempdir().unwrap();
    let object_root = dir.path().join("objects");
    let secrets_file = dir.path().join("secrets.json");
    let db_path = dir.path().join("subscribers.db");

    for (key, raw) in objects {
        write_object(&object_root, key, raw);
    }
    write_secrets(&secrets_file);
    seed_directory(&db_path, subscribers).await;

    let recorded = Recorded::default();
    let base = start_upstreams(recorded.clone(), mode).await;

    let summarizer_config = SummarizerConfig {
        endpoint: format!("{base}/v1/chat/completions"),
        timeout: Duration::from_secs(5),
        ..SummarizerConfig::default()
    };
    let telegram_config = TelegramConfig {
        api_base: base,
        timeout: send_timeout,
        ..TelegramConfig::default()
    };

    let deps = PipelineDeps {
        storage: Arc::new(LocalObjectStore::new(object_root)),
        secrets: Arc::new(FileSecretStore::new(secrets_file)),
        directory: Arc::new(
            LibSqlDirectory::new_local(&db_path, "EmailBotAddresses")
                .await
                .unwrap(),
        ),
        summarizer: Summarizer::new(create_provider(&summarizer_config), &summarizer_config),
        notifier: Arc::new(TelegramNotifier::new(&telegram_config)),
    };

    Env {
        _dir: dir,
        pipeline: EmailPipeline::new(deps, CONTAINER),
        recorded,
    }
}

fn event(keys: &[&str]) -> TriggerEvent {
    TriggerEvent::new(
        keys.iter()
            .map(|key| TriggerRecord::new(CONTAINER, *key))
            .collect(),
    )
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn html_body_is_summarized_and_delivered() {
    let env = setup(
        &[("emails/1", multipart_email("Alice <Alice@Example.com>", "Invoice 7"))],
        &[("alice@example.com", 1, "1001")],
        Completion::Reply,
    )
    .await;

    let outcomes = env.pipeline.process_event(&event(&["emails/1"])).await;
    assert_eq!(outcomes.len(), 1);
    match &outcomes[0] {
        DispatchOutcome::Delivered {
            receipt,
            summary_source,
        } => {
            assert_eq!(receipt.chat_id, "1001");
            assert_eq!(receipt.message_id, Some(42));
            assert_eq!(*summary_source, SummarySource::Generated);
        }
        other => panic!("expected delivery, got {other:?}"),
    }

    let completions = env.recorded.completions();
    assert_eq!(completions.len(), 1);
    let (auth, body) = &completions[0];
    assert_eq!(auth.as_deref(), Some("Bearer sk-test"));
    assert_eq!(body["model"], "gpt-4o-mini");
    assert_eq!(body["messages"][0]["role"], "system");
    let prompt = body["messages"][1]["content"].as_str().unwrap();
    assert!(prompt.contains("Subject: Invoice 7"));
    assert!(prompt.contains("<p>HTML invoice text</p>"));
    assert!(!prompt.contains("Plain invoice text"));

    let messages = env.recorded.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["chat_id"], "1001");
    assert_eq!(messages[0]["parse_mode"], "HTML");
    assert_eq!(
        messages[0]["text"],
        "<b>Invoice 7</b>\n\nGenerated summary."
    );
}

#[tokio::test]
async fn gated_recipients_cause_no_upstream_calls() {
    let env = setup(
        &[
            ("off", plain_email("off@example.com", "Hi", "x")),
            ("stranger", plain_email("stranger@example.com", "Hi", "x")),
        ],
        &[("off@example.com", 0, "2002")],
        Completion::Reply,
    )
    .await;

    let outcomes = env.pipeline.process_event(&event(&["off", "stranger"])).await;
    assert!(matches!(
        &outcomes[0],
        DispatchOutcome::Skipped { reason: SkipReason::Inactive { .. } }
    ));
    assert!(matches!(
        &outcomes[1],
        DispatchOutcome::Skipped { reason: SkipReason::NotSubscribed { .. } }
    ));
    assert!(env.recorded.completions().is_empty());
    assert!(env.recorded.messages().is_empty());
}

#[tokio::test]
async fn failed_summarization_sends_fallback_once() {
    let env = setup(
        &[("k", plain_email("bob@example.com", "Status", "All good"))],
        &[("bob@example.com", 1, "3003")],
        Completion::ServerError,
    )
    .await;

    let outcomes = env.pipeline.process_event(&event(&["k"])).await;
    assert!(matches!(
        &outcomes[0],
        DispatchOutcome::Delivered { summary_source: SummarySource::Fallback, .. }
    ));

    let messages = env.recorded.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(
        messages[0]["text"],
        format!("<b>Status</b>\n\n{FALLBACK_SUMMARY}")
    );
}

#[tokio::test]
async fn bad_record_mid_batch_does_not_stop_the_rest() {
    let env = setup(
        &[
            ("a", plain_email("carol@example.com", "First", "1")),
            ("b", "   \r\n".to_string()),
            ("c", plain_email("carol@example.com", "Third", "3")),
        ],
        &[("carol@example.com", 1, "4004")],
        Completion::Reply,
    )
    .await;

    let outcomes = env
        .pipeline
        .process_event(&event(&["a", "b", "missing", "c"]))
        .await;
    assert_eq!(outcomes.len(), 4);
    assert!(outcomes[0].is_delivered());
    assert!(matches!(&outcomes[1], DispatchOutcome::Aborted { stage: Stage::Extract, .. }));
    assert!(matches!(&outcomes[2], DispatchOutcome::Aborted { stage: Stage::Fetch, .. }));
    assert!(outcomes[3].is_delivered());

    let texts: Vec<String> = env
        .recorded
        .messages()
        .iter()
        .map(|m| m["text"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(texts.len(), 2);
    assert!(texts[0].starts_with("<b>First</b>"));
    assert!(texts[1].starts_with("<b>Third</b>"));
}

#[tokio::test]
async fn delivery_rejection_is_reported_not_retried() {
    let env = setup(
        &[("k", plain_email("dave@example.com", "Hi", "x"))],
        &[("dave@example.com", 1, "blocked")],
        Completion::Reply,
    )
    .await;

    let outcomes = env.pipeline.process_event(&event(&["k"])).await;
    match &outcomes[0] {
        DispatchOutcome::DeliveryFailed { reason, .. } => {
            assert!(reason.contains("bot was blocked"));
            assert!(!reason.contains(BOT_TOKEN));
        }
        other => panic!("expected delivery failure, got {other:?}"),
    }
    assert_eq!(env.recorded.messages().len(), 1);
}

#[tokio::test]
async fn slow_delivery_times_out_once_and_batch_continues() {
    let env = setup_with_send_timeout(
        &[
            ("slow", plain_email("erin@example.com", "Late", "x")),
            ("fast", plain_email("frank@example.com", "On time", "y")),
        ],
        &[("erin@example.com", 1, "slow"), ("frank@example.com", 1, "5005")],
        Completion::Reply,
        Duration::from_millis(200),
    )
    .await;

    let outcomes = env.pipeline.process_event(&event(&["slow", "fast"])).await;
    assert_eq!(outcomes.len(), 2);
    match &outcomes[0] {
        DispatchOutcome::DeliveryFailed {
            reason,
            summary_source,
        } => {
            assert!(reason.contains("timed out"), "unexpected reason: {reason}");
            assert_eq!(*summary_source, SummarySource::Generated);
        }
        other => panic!("expected delivery failure, got {other:?}"),
    }
    assert!(outcomes[1].is_delivered());

    let chats: Vec<Value> = env
        .recorded
        .messages()
        .iter()
        .map(|m| m["chat_id"].clone())
        .collect();
    assert_eq!(chats, vec![json!("slow"), json!("5005")]);
}

#[tokio::test]
async fn handle_event_returns_fixed_acknowledgement() {
    let env = setup(&[], &[], Completion::Reply).await;
    let ack = env.pipeline.handle_event(&event(&["nothing-here"])).await;
    assert_eq!(ack, InvocationResponse::ok());
}

#[tokio::test]
async fn telegram_notifier_unreachable_host_fails_without_leaking_token() {
    let secrets = MemorySecretStore::new();
    secrets.insert(
        "/email-bot/telegram",
        format!("{{\"bot_token\": \"{BOT_TOKEN}\"}}"),
    );
    let credentials = CredentialProvider::new(Arc::new(secrets));

    // Bind then drop a listener so the port is closed.
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let notifier = TelegramNotifier::new(&TelegramConfig {
        api_base: format!("http://127.0.0.1:{port}"),
        timeout: Duration::from_secs(2),
        ..TelegramConfig::default()
    });

    let err = notifier
        .notify(&credentials, "1", "subject", "summary")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ChannelError::SendFailed { .. } | ChannelError::Timeout { .. }
    ));
    assert!(!err.to_string().contains(BOT_TOKEN));
}
