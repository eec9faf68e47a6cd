use url::Url;

use crate::error::ChatApiError;

/// Default base URL for chat backend requests.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:3000";

const CHAT_PATH: [&str; 2] = ["api", "chat"];
const RECOVER_PATH: [&str; 2] = ["api", "recover"];

/// Resolves the primary chat endpoint: `{base}/api/chat?protocol=data`.
pub fn chat_url(base: &str) -> Result<Url, ChatApiError> {
    let mut url = endpoint(base, &CHAT_PATH)?;
    url.query_pairs_mut().append_pair("protocol", "data");
    Ok(url)
}

/// Resolves the resume endpoint for `resume_token`: `{base}/api/recover/{token}`.
///
/// The token is percent-encoded as a single path segment.
pub fn recover_url(base: &str, resume_token: &str) -> Result<Url, ChatApiError> {
    let mut segments = RECOVER_PATH.to_vec();
    segments.push(resume_token);
    endpoint(base, &segments)
}

fn endpoint(base: &str, segments: &[&str]) -> Result<Url, ChatApiError> {
    let base = if base.trim().is_empty() {
        DEFAULT_BASE_URL
    } else {
        base.trim()
    };

    let mut url = Url::parse(base).map_err(|error| ChatApiError::InvalidBaseUrl {
        url: base.to_string(),
        message: error.to_string(),
    })?;
    url.set_query(None);
    url.set_fragment(None);

    {
        let mut path = url
            .path_segments_mut()
            .map_err(|()| ChatApiError::InvalidBaseUrl {
                url: base.to_string(),
                message: "URL cannot be used as a base".to_string(),
            })?;
        path.pop_if_empty();
        path.extend(segments);
    }

    Ok(url)
}
