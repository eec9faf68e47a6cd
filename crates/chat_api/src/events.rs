/// Payload sentinel marking normal completion of a stream.
pub const END_OF_STREAM: &str = "[END_OF_STREAM]";

const ERROR_PREFIX: &str = "[Error:";
const STREAM_TIMEOUT_PREFIX: &str = "[Stream timeout:";
const SERVICE_UNAVAILABLE_PREFIX: &str = "[Backend service unavailable";

/// Backend-signalled failure classes. All of them end the turn and are shown verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    /// Validation or content rejection.
    Error,
    /// Backend gave up waiting on the model.
    Timeout,
    /// Upstream generation service could not be reached.
    ServiceUnavailable,
}

impl SignalKind {
    /// Classifies a payload by its reserved prefix.
    #[must_use]
    pub fn from_payload(payload: &str) -> Option<Self> {
        if payload.starts_with(ERROR_PREFIX) {
            return Some(Self::Error);
        }
        if payload.starts_with(STREAM_TIMEOUT_PREFIX) {
            return Some(Self::Timeout);
        }
        // The backend emits both `[Backend service unavailable: ...]` and
        // `[Backend service unavailable]:...`.
        let rest = payload.strip_prefix(SERVICE_UNAVAILABLE_PREFIX)?;
        if rest.starts_with(':') || rest.starts_with(']') {
            Some(Self::ServiceUnavailable)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Timeout => "timeout",
            Self::ServiceUnavailable => "service_unavailable",
        }
    }
}

/// One decoded `data:` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamRecord {
    /// Literal model output, appended verbatim.
    Content(String),
    /// Control signal that terminates the turn; `message` is the full payload.
    Signal { kind: SignalKind, message: String },
    /// Normal completion sentinel.
    EndOfStream,
}

impl StreamRecord {
    /// Classifies a record payload (the text after the `data:` marker).
    #[must_use]
    pub fn classify(payload: &str) -> Self {
        if payload.trim() == END_OF_STREAM {
            return Self::EndOfStream;
        }

        match SignalKind::from_payload(payload) {
            Some(kind) => Self::Signal {
                kind,
                message: payload.to_string(),
            },
            None => Self::Content(payload.to_string()),
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Content(_))
    }
}
