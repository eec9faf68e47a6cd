//! Line-mode terminal front-end.
//!
//! Submitted prompts become messages, the transcript is printed incrementally
//! to stdout, and pending line edits are applied once per frame.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use chat_api::{ChatApiClient, ChatApiConfig};
use chat_transport::ChatTransport;
use chat_transport_mock::ScriptedTransport;
use signal_hook::consts::SIGINT;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use transcript_store::{FileStore, KeyValueStore, TranscriptStore};

use crate::config::{EnvConfig, ProviderKind};
use crate::history;
use crate::input::{EditorAction, InputEvent, InputReader, PromptEditor, RawModeGuard};
use crate::lines::{LineBuffer, LineSink, BUFFER_CAP};
use crate::render::{Footer, Screen};
use crate::session::{SendError, SessionController, SessionOutcome};
use crate::status::StatusTicker;

/// Pending edits are applied at most once per frame.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

type Turn = JoinHandle<Result<SessionOutcome, SendError>>;

pub async fn run(config: EnvConfig) -> anyhow::Result<()> {
    let mut store = TranscriptStore::new(FileStore::new(&config.data_dir));
    let thread_id = store.thread_id();
    let buffer = match history::load_buffer(&mut store, BUFFER_CAP) {
        Ok(buffer) => buffer,
        Err(error) => {
            warn!(%error, "failed to load history; starting empty");
            LineBuffer::new()
        }
    };
    info!(
        provider = config.provider.as_str(),
        base_url = %config.base_url,
        thread_id = %thread_id,
        restored_lines = buffer.len(),
        "starting"
    );

    match config.provider {
        ProviderKind::Mock => {
            run_with(ScriptedTransport::demo(), &config, thread_id, store, buffer).await
        }
        ProviderKind::Http => {
            let client = ChatApiClient::new(api_config(&config))
                .context("failed to build HTTP client")?;
            run_with(client, &config, thread_id, store, buffer).await
        }
    }
}

pub fn api_config(config: &EnvConfig) -> ChatApiConfig {
    let api = ChatApiConfig::new(config.base_url.clone());
    match config.connect_timeout {
        Some(timeout) => api.with_connect_timeout(timeout),
        None => api,
    }
}

async fn run_with<T, S>(
    transport: T,
    config: &EnvConfig,
    thread_id: String,
    mut store: TranscriptStore<S>,
    mut buffer: LineBuffer,
) -> anyhow::Result<()>
where
    T: ChatTransport,
    S: KeyValueStore,
{
    let sink = LineSink::new();
    let controller = Arc::new(
        SessionController::new(transport, sink.clone())
            .with_thread_id(thread_id)
            .with_stall_timeout(config.stall_timeout),
    );
    let handle = controller.handle();
    let interrupts = InterruptFlag::install().context("failed to install SIGINT handler")?;

    let mut input = InputReader::for_stdin();
    let _raw_mode = if input.is_interactive() {
        Some(RawModeGuard::enable().context("failed to enable raw mode")?)
    } else {
        None
    };
    let mut editor = PromptEditor::new();
    let mut input_closed = false;
    let mut turn: Option<Turn> = None;
    let mut screen = if input.is_interactive() {
        Screen::raw(io::stdout())
    } else {
        Screen::new(io::stdout())
    };
    let mut ticker = StatusTicker::new();
    let mut frames = tokio::time::interval(FRAME_INTERVAL);
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

    screen.render(&buffer, None)?;

    loop {
        let mut submitted = None;
        let mut interrupted = false;
        tokio::select! {
            _ = frames.tick() => {}
            event = input.next(), if !input_closed => match event {
                Some(InputEvent::Line(line)) if line.trim().is_empty() => {}
                Some(InputEvent::Line(_)) if turn.is_some() => {
                    warn!("input ignored while a reply is in progress");
                }
                Some(InputEvent::Line(line)) => submitted = Some(line),
                Some(InputEvent::Key(key)) => match editor.handle_key(key, turn.is_some()) {
                    EditorAction::Submit(text) => submitted = Some(text),
                    EditorAction::Interrupt => interrupted = true,
                    EditorAction::Eof => input_closed = true,
                    EditorAction::Edited | EditorAction::Ignored => {}
                },
                None => {
                    debug!("input closed");
                    input_closed = true;
                }
            },
        }

        if let Some(message) = submitted {
            let controller = Arc::clone(&controller);
            turn = Some(tokio::spawn(async move { controller.send(&message).await }));
        }

        if interrupts.take() || interrupted {
            if handle.is_busy() {
                info!("interrupt: cancelling active turn");
                handle.cancel();
            } else {
                break;
            }
        }

        let finished = turn.as_ref().is_some_and(JoinHandle::is_finished);
        buffer.apply_pending(&sink);
        if finished {
            if let Some(task) = turn.take() {
                report_turn(task.await);
            }
            buffer.apply_pending(&sink);
            persist(&mut store, &buffer);
        }

        let status = ticker.observe(handle.state(), Instant::now());
        let footer = match status {
            Some(status) => Some(Footer::status(status)),
            None if input.is_interactive() && !input_closed && turn.is_none() => {
                Some(editor.footer())
            }
            None => None,
        };
        screen.render(&buffer, footer.as_ref())?;

        if input_closed && turn.is_none() {
            break;
        }
    }

    if let Some(task) = turn.take() {
        handle.cancel();
        report_turn(task.await);
    }
    buffer.apply_pending(&sink);
    screen.render(&buffer, None)?;
    screen.finish()?;
    persist(&mut store, &buffer);
    info!("exiting");
    Ok(())
}

fn report_turn(result: Result<Result<SessionOutcome, SendError>, tokio::task::JoinError>) {
    match result {
        Ok(Ok(outcome)) => debug!(outcome = outcome.as_str(), "turn reported"),
        Ok(Err(error)) => warn!(%error, "message was not sent"),
        Err(error) => error!(%error, "turn task failed"),
    }
}

fn persist<S: KeyValueStore>(store: &mut TranscriptStore<S>, buffer: &LineBuffer) {
    if let Err(error) = history::save_buffer(store, buffer) {
        warn!(%error, "failed to save history");
    }
}

/// SIGINT latch polled once per frame. Unregistered on drop.
///
/// In raw mode Ctrl-C arrives as a key instead; this still catches an
/// interrupt sent from outside the terminal.
struct InterruptFlag {
    flag: Arc<AtomicBool>,
    id: signal_hook::SigId,
}

impl InterruptFlag {
    fn install() -> io::Result<Self> {
        let flag = Arc::new(AtomicBool::new(false));
        let id = signal_hook::flag::register(SIGINT, Arc::clone(&flag))?;
        Ok(Self { flag, id })
    }

    fn take(&self) -> bool {
        self.flag.swap(false, Ordering::SeqCst)
    }
}

impl Drop for InterruptFlag {
    fn drop(&mut self) {
        signal_hook::low_level::unregister(self.id);
    }
}
