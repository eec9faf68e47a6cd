use serde::{Deserialize, Serialize};

/// JSON body of the primary chat request.
///
/// `thread_id` is always serialized, as `null` when the caller has none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatPayload {
    pub content: String,
    pub thread_id: Option<String>,
}

impl ChatPayload {
    pub fn new(content: impl Into<String>, thread_id: Option<String>) -> Self {
        Self {
            content: content.into(),
            thread_id,
        }
    }
}

impl From<&chat_transport::ChatRequest> for ChatPayload {
    fn from(request: &chat_transport::ChatRequest) -> Self {
        Self::new(request.content.clone(), request.thread_id.clone())
    }
}
