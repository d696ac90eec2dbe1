//! Configuration types, built from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_TELEGRAM_SECRET_NAME: &str = "/email-bot/telegram";
pub const DEFAULT_OPENAI_SECRET_NAME: &str = "/email-bot/openai";
pub const DEFAULT_SUBSCRIBER_TABLE: &str = "EmailBotAddresses";

/// Field inside the Telegram secret that holds the bot token.
pub const TELEGRAM_TOKEN_FIELD: &str = "bot_token";
/// Field inside the summarizer secret that holds the API key.
pub const OPENAI_KEY_FIELD: &str = "OPENAI_API_KEY";

/// Names a single field inside a named secret.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CredentialRef {
    pub secret_name: String,
    pub field: String,
}

impl CredentialRef {
    pub fn new(secret_name: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            secret_name: secret_name.into(),
            field: field.into(),
        }
    }
}

/// Summarization provider settings.
#[derive(Debug, Clone)]
pub struct SummarizerConfig {
    pub endpoint: String,
    pub model: String,
    pub timeout: Duration,
    /// Bodies longer than this (in chars) are cut before prompting.
    pub max_body_chars: usize,
    pub credential: CredentialRef,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout: Duration::from_secs(30),
            max_body_chars: 50_000,
            credential: CredentialRef::new(DEFAULT_OPENAI_SECRET_NAME, OPENAI_KEY_FIELD),
        }
    }
}

/// Telegram Bot API settings.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub api_base: String,
    pub timeout: Duration,
    pub credential: CredentialRef,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.telegram.org".to_string(),
            timeout: Duration::from_secs(15),
            credential: CredentialRef::new(DEFAULT_TELEGRAM_SECRET_NAME, TELEGRAM_TOKEN_FIELD),
        }
    }
}

/// Full application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Container used for trigger records that don't name one.
    pub default_container: String,
    pub subscriber_table: String,
    pub db_path: PathBuf,
    pub object_root: PathBuf,
    pub secrets_file: PathBuf,
    pub summarizer: SummarizerConfig,
    pub telegram: TelegramConfig,
    /// Address for the HTTP trigger host. `None` means one-shot mode.
    pub listen: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_container: String::new(),
            subscriber_table: DEFAULT_SUBSCRIBER_TABLE.to_string(),
            db_path: PathBuf::from("./data/subscribers.db"),
            object_root: PathBuf::from("./data/objects"),
            secrets_file: PathBuf::from("./data/secrets.json"),
            summarizer: SummarizerConfig::default(),
            telegram: TelegramConfig::default(),
            listen: None,
        }
    }
}

impl AppConfig {
    /// Build config from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup. Unset keys take defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let telegram_secret =
            get("TELEGRAM_SECRET_NAME").unwrap_or_else(|| DEFAULT_TELEGRAM_SECRET_NAME.to_string());
        let openai_secret =
            get("OPENAI_SECRET_NAME").unwrap_or_else(|| DEFAULT_OPENAI_SECRET_NAME.to_string());

        let summarizer = SummarizerConfig {
            endpoint: get("SUMMARIZER_ENDPOINT").unwrap_or(defaults.summarizer.endpoint),
            model: get("SUMMARIZER_MODEL").unwrap_or(defaults.summarizer.model),
            timeout: parse_secs(&get, "SUMMARIZER_TIMEOUT_SECS")?
                .unwrap_or(defaults.summarizer.timeout),
            max_body_chars: parse_num(&get, "SUMMARIZER_MAX_BODY_CHARS")?
                .unwrap_or(defaults.summarizer.max_body_chars),
            credential: CredentialRef::new(openai_secret, OPENAI_KEY_FIELD),
        };

        let telegram = TelegramConfig {
            api_base: get("TELEGRAM_API_BASE")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or(defaults.telegram.api_base),
            timeout: parse_secs(&get, "TELEGRAM_TIMEOUT_SECS")?
                .unwrap_or(defaults.telegram.timeout),
            credential: CredentialRef::new(telegram_secret, TELEGRAM_TOKEN_FIELD),
        };

        Ok(Self {
            default_container: get("EMAIL_BUCKET").unwrap_or_default(),
            subscriber_table: get("DDB_TABLE").unwrap_or(defaults.subscriber_table),
            db_path: get("MAILBRIEF_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            object_root: get("MAILBRIEF_OBJECT_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.object_root),
            secrets_file: get("MAILBRIEF_SECRETS_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.secrets_file),
            summarizer,
            telegram,
            listen: get("MAILBRIEF_LISTEN"),
        })
    }
}

fn parse_num<F>(get: &F, key: &str) -> Result<Option<usize>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|raw| {
            raw.trim()
                .parse::<usize>()
                .map_err(|e| ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: format!("{raw:?}: {e}"),
                })
        })
        .transpose()
}

fn parse_secs<F>(get: &F, key: &str) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match parse_num(get, key)? {
        Some(0) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "timeout must be at least one second".to_string(),
        }),
        Some(secs) => Ok(Some(Duration::from_secs(secs as u64))),
        None => Ok(None),
    }
}
