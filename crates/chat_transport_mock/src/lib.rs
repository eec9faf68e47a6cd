//! Deterministic scripted implementation of the `chat_transport` contract.
//!
//! Scripts describe exactly what each open returns and what each reader pull
//! yields, including delays and stalls, so session behavior can be exercised
//! without a backend. The demo script backs the `mock` provider mode.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chat_transport::{ChatRequest, ChatTransport, ChunkReader, OpenedStream, TransportError};

/// Stable provider identifier used for explicit startup selection.
pub const MOCK_PROVIDER_ID: &str = "mock";

const DEMO_OPEN_DELAY_MS: u64 = 200;
const DEMO_TOKEN_DELAY_MS: u64 = 40;

/// One step of a scripted response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    /// Yield these bytes from the next pull.
    Chunk(Vec<u8>),
    /// Sleep before continuing with the next step.
    Delay(Duration),
    /// Never yield again; only cancellation ends the pull.
    Stall,
    /// Fail the pull.
    Fail(TransportError),
}

/// Scripted result of one open call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedOpen {
    Stream {
        resume_token: Option<String>,
        steps: Vec<ScriptStep>,
    },
    Fail(TransportError),
    /// The open never completes.
    Stall,
}

impl ScriptedOpen {
    #[must_use]
    pub fn stream(resume_token: Option<&str>, steps: Vec<ScriptStep>) -> Self {
        Self::Stream {
            resume_token: resume_token.map(ToOwned::to_owned),
            steps,
        }
    }
}

/// Record of an open call observed by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenRecord {
    Chat(ChatRequest),
    Resume(String),
}

#[derive(Debug, Default)]
struct ScriptState {
    chat: VecDeque<ScriptedOpen>,
    resume: VecDeque<ScriptedOpen>,
    fallback: Option<ScriptedOpen>,
    opens: Vec<OpenRecord>,
}

/// Transport that replays queued scripts in order.
///
/// Chat and resume opens consume separate queues. When a queue is empty the
/// fallback script is replayed, if any; otherwise the open fails.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    state: Mutex<ScriptState>,
    released: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Demo transport answering every message with the same canned reply.
    #[must_use]
    pub fn demo() -> Self {
        Self::default().with_fallback(ScriptedOpen::stream(Some("mock-stream"), demo_steps()))
    }

    #[must_use]
    pub fn with_chat(self, open: ScriptedOpen) -> Self {
        lock_unpoisoned(&self.state).chat.push_back(open);
        self
    }

    #[must_use]
    pub fn with_resume(self, open: ScriptedOpen) -> Self {
        lock_unpoisoned(&self.state).resume.push_back(open);
        self
    }

    #[must_use]
    pub fn with_fallback(self, open: ScriptedOpen) -> Self {
        lock_unpoisoned(&self.state).fallback = Some(open);
        self
    }

    /// Every open observed so far, in call order.
    pub fn opens(&self) -> Vec<OpenRecord> {
        lock_unpoisoned(&self.state).opens.clone()
    }

    /// Number of readers released so far.
    pub fn released_count(&self) -> usize {
        self.released.load(Ordering::Acquire)
    }

    fn next_open(&self, record: OpenRecord) -> ScriptedOpen {
        let mut state = lock_unpoisoned(&self.state);
        let queued = match &record {
            OpenRecord::Chat(_) => state.chat.pop_front(),
            OpenRecord::Resume(_) => state.resume.pop_front(),
        };
        state.opens.push(record);
        queued
            .or_else(|| state.fallback.clone())
            .unwrap_or_else(|| {
                ScriptedOpen::Fail(TransportError::Connect("no scripted response".to_string()))
            })
    }

    async fn play(&self, open: ScriptedOpen) -> Result<OpenedStream<ScriptedReader>, TransportError> {
        match open {
            ScriptedOpen::Stream {
                resume_token,
                steps,
            } => Ok(OpenedStream::new(
                resume_token,
                ScriptedReader::new(steps, Arc::clone(&self.released)),
            )),
            ScriptedOpen::Fail(error) => Err(error),
            ScriptedOpen::Stall => std::future::pending().await,
        }
    }
}

impl ChatTransport for ScriptedTransport {
    type Reader = ScriptedReader;

    async fn open_chat(
        &self,
        request: &ChatRequest,
    ) -> Result<OpenedStream<Self::Reader>, TransportError> {
        let open = self.next_open(OpenRecord::Chat(request.clone()));
        self.play(open).await
    }

    async fn open_resume(
        &self,
        resume_token: &str,
    ) -> Result<OpenedStream<Self::Reader>, TransportError> {
        let open = self.next_open(OpenRecord::Resume(resume_token.to_owned()));
        self.play(open).await
    }
}

/// Reader replaying a list of [`ScriptStep`]s.
#[derive(Debug)]
pub struct ScriptedReader {
    steps: VecDeque<ScriptStep>,
    released: Arc<AtomicUsize>,
    is_released: bool,
}

impl ScriptedReader {
    fn new(steps: Vec<ScriptStep>, released: Arc<AtomicUsize>) -> Self {
        Self {
            steps: steps.into(),
            released,
            is_released: false,
        }
    }
}

impl ChunkReader for ScriptedReader {
    async fn pull(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        while !self.is_released {
            match self.steps.pop_front() {
                Some(ScriptStep::Chunk(bytes)) => return Ok(Some(bytes)),
                Some(ScriptStep::Delay(delay)) => tokio::time::sleep(delay).await,
                Some(ScriptStep::Stall) => {
                    // Keep the stall in place for any later pull.
                    self.steps.push_front(ScriptStep::Stall);
                    std::future::pending::<()>().await;
                }
                Some(ScriptStep::Fail(error)) => return Err(error),
                None => return Ok(None),
            }
        }
        Ok(None)
    }

    fn release(&mut self) {
        if !self.is_released {
            self.is_released = true;
            self.steps.clear();
            self.released.fetch_add(1, Ordering::AcqRel);
        }
    }
}

/// Encodes payloads as `data: <payload>` records, one per blank-line separated frame.
#[must_use]
pub fn data_frames(payloads: &[&str]) -> Vec<u8> {
    let mut body = String::new();
    for payload in payloads {
        body.push_str("data: ");
        body.push_str(payload);
        body.push_str("\n\n");
    }
    body.into_bytes()
}

fn demo_steps() -> Vec<ScriptStep> {
    // Records cannot carry a newline, so the reply is one flowing paragraph.
    const REPLY: &str = "This is the mock backend answering from the terminal client. \
        Responses stream in small pieces, so the spinner stops at the first byte \
        and the text grows in place as more records arrive. \
        Press Ctrl-C while a reply is streaming to cancel it.";

    let mut steps = vec![ScriptStep::Delay(Duration::from_millis(DEMO_OPEN_DELAY_MS))];
    let mut pending_token = String::new();
    for ch in REPLY.chars() {
        pending_token.push(ch);
        if ch == ' ' {
            push_token(&mut steps, &std::mem::take(&mut pending_token));
        }
    }
    if !pending_token.is_empty() {
        push_token(&mut steps, &pending_token);
    }
    steps.push(ScriptStep::Chunk(data_frames(&["[END_OF_STREAM]"])));
    steps
}

fn push_token(steps: &mut Vec<ScriptStep>, token: &str) {
    steps.push(ScriptStep::Chunk(data_frames(&[token])));
    steps.push(ScriptStep::Delay(Duration::from_millis(DEMO_TOKEN_DELAY_MS)));
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
