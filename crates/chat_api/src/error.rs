use chat_transport::TransportError;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatApiError {
    #[error("invalid base URL {url}: {message}")]
    InvalidBaseUrl { url: String, message: String },

    #[error("invalid header {name}")]
    InvalidHeader { name: String },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request error: {0}")]
    Request(#[source] reqwest::Error),

    #[error("HTTP {status} {message}")]
    Status { status: StatusCode, message: String },

    #[error("stream read failed: {0}")]
    Body(#[source] reqwest::Error),
}

impl From<ChatApiError> for TransportError {
    fn from(error: ChatApiError) -> Self {
        match error {
            ChatApiError::Status { status, message } => TransportError::Status {
                status: status.as_u16(),
                message,
            },
            ChatApiError::Body(source) => TransportError::Read(source.to_string()),
            other => TransportError::Connect(other.to_string()),
        }
    }
}

/// FastAPI-style error body: `{"detail": "..."}` or `{"detail": [{"msg": "..."}]}`.
#[derive(Debug, Deserialize)]
struct ErrorPayload {
    detail: Option<Value>,
}

impl ErrorPayload {
    fn detail_message(&self) -> Option<String> {
        match self.detail.as_ref()? {
            Value::String(message) => non_empty(message),
            Value::Array(items) => {
                let messages = items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(Value::as_str))
                    .filter(|message| !message.trim().is_empty())
                    .collect::<Vec<_>>();
                if messages.is_empty() {
                    None
                } else {
                    Some(messages.join("; "))
                }
            }
            _ => None,
        }
    }
}

/// Builds the human-readable part of a non-success response.
///
/// Shape: `<reason phrase>[ - <detail or raw body>]`.
pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    let reason = status.canonical_reason().unwrap_or("request failed");
    let body = body.trim();
    if body.is_empty() {
        return reason.to_string();
    }

    let detail = serde_json::from_str::<ErrorPayload>(body)
        .ok()
        .and_then(|payload| payload.detail_message())
        .unwrap_or_else(|| body.to_string());

    format!("{reason} - {detail}")
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
