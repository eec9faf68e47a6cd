use std::collections::BTreeMap;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::config::ChatApiConfig;
use crate::error::ChatApiError;

pub const HEADER_ACCEPT: &str = "accept";
pub const HEADER_CACHE_CONTROL: &str = "cache-control";
pub const HEADER_CONTENT_TYPE: &str = "content-type";
pub const HEADER_USER_AGENT: &str = "user-agent";
/// Response header carrying the resume token of a stream attempt.
pub const HEADER_STREAM_ID: &str = "x-stream-id";

/// Which endpoint a header set is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// `POST /api/chat` with a JSON body.
    Chat,
    /// `GET /api/recover/{token}` without a body.
    Recover,
}

/// Build a deterministic header map for a backend request.
pub fn build_headers(config: &ChatApiConfig, kind: RequestKind) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();

    headers.insert(HEADER_ACCEPT.to_owned(), "text/event-stream".to_owned());
    headers.insert(HEADER_CACHE_CONTROL.to_owned(), "no-store".to_owned());
    if kind == RequestKind::Chat {
        headers.insert(
            HEADER_CONTENT_TYPE.to_owned(),
            "application/json".to_owned(),
        );
    }

    let user_agent = config
        .user_agent
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .unwrap_or_else(default_user_agent);
    headers.insert(HEADER_USER_AGENT.to_owned(), user_agent);

    for (key, value) in &config.extra_headers {
        headers.insert(key.trim().to_ascii_lowercase(), value.trim().to_owned());
    }

    headers
}

/// Converts a built header set into a reqwest [`HeaderMap`].
pub fn to_header_map(headers: BTreeMap<String, String>) -> Result<HeaderMap, ChatApiError> {
    let mut out = HeaderMap::new();
    for (key, value) in headers {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|_| ChatApiError::InvalidHeader { name: key.clone() })?;
        let value = HeaderValue::from_str(&value)
            .map_err(|_| ChatApiError::InvalidHeader { name: key.clone() })?;
        out.insert(name, value);
    }
    Ok(out)
}

/// Reads the resume token from response headers, ignoring blank values.
pub fn resume_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(HEADER_STREAM_ID)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

fn default_user_agent() -> String {
    format!("term-chat/{}", env!("CARGO_PKG_VERSION"))
}
