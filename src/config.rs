//! Environment configuration.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::session::DEFAULT_STALL_TIMEOUT;

pub const DEFAULT_BASE_URL: &str = chat_api::DEFAULT_BASE_URL;
pub const DATA_DIR_NAME: &str = ".term_chat";
pub const LOG_FILE_NAME: &str = "term-chat.log";

/// Which transport backs the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Http,
    Mock,
}

impl ProviderKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "http" => Some(Self::Http),
            chat_transport_mock::MOCK_PROVIDER_ID => Some(Self::Mock),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Mock => chat_transport_mock::MOCK_PROVIDER_ID,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub provider: ProviderKind,
    pub base_url: String,
    pub data_dir: PathBuf,
    pub stall_timeout: Duration,
    pub connect_timeout: Option<Duration>,
    pub log_file: PathBuf,
    pub debug: bool,
}

impl EnvConfig {
    /// Reads `TERM_CHAT_*` variables. Unset, empty, or invalid values fall back
    /// to defaults.
    pub fn from_env() -> Self {
        let data_dir = env_string_opt("TERM_CHAT_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);
        let log_file = env_string_opt("TERM_CHAT_LOG")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join(LOG_FILE_NAME));

        Self {
            provider: env_string_opt("TERM_CHAT_PROVIDER")
                .and_then(|value| ProviderKind::parse(&value))
                .unwrap_or(ProviderKind::Http),
            base_url: env_string_opt("TERM_CHAT_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            data_dir,
            stall_timeout: env_millis_opt("TERM_CHAT_STALL_TIMEOUT_MS")
                .unwrap_or(DEFAULT_STALL_TIMEOUT),
            connect_timeout: env_millis_opt("TERM_CHAT_CONNECT_TIMEOUT_MS"),
            log_file,
            debug: env_flag("TERM_CHAT_DEBUG"),
        }
    }
}

fn default_data_dir() -> PathBuf {
    env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(DATA_DIR_NAME)
}

fn env_flag(key: &str) -> bool {
    env::var(key).map(|value| value == "1").unwrap_or(false)
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}

// Zero is treated as unset.
fn env_millis_opt(key: &str) -> Option<Duration> {
    env_string_opt(key)
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|millis| *millis > 0)
        .map(Duration::from_millis)
}
