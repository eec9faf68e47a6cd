use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use chat_api::SignalKind;
use chat_transport::{ChatRequest, TransportError};
use chat_transport_mock::{data_frames, OpenRecord, ScriptStep, ScriptedOpen, ScriptedTransport};
use pretty_assertions::assert_eq;
use term_chat::render::render_line;
use term_chat::session::{
    CANCELLED_NOTICE, CONNECTION_ERROR_NOTICE, RECOVERY_FAILED_NOTICE,
};
use term_chat::{
    LineBuffer, LineSink, Origin, SendError, SessionController, SessionOutcome, SessionState,
};

fn controller(transport: ScriptedTransport) -> SessionController<ScriptedTransport> {
    SessionController::new(transport, LineSink::new()).with_thread_id("thread-1")
}

fn chunk(payloads: &[&str]) -> ScriptStep {
    ScriptStep::Chunk(data_frames(payloads))
}

fn transcript(controller: &SessionController<ScriptedTransport>) -> Vec<(Origin, String)> {
    let mut buffer = LineBuffer::new();
    buffer.apply_pending(controller.sink());
    assert_eq!(controller.sink().pending_len(), 0);
    buffer
        .lines()
        .map(|line| (line.origin(), render_line(line)))
        .collect()
}

fn marker_count(lines: &[(Origin, String)]) -> usize {
    lines
        .iter()
        .filter(|(_, text)| text.starts_with('◆'))
        .count()
}

fn line(origin: Origin, text: &str) -> (Origin, String) {
    (origin, text.to_string())
}

#[tokio::test]
async fn end_of_stream_completes_and_returns_to_idle() {
    let controller = controller(ScriptedTransport::new().with_chat(ScriptedOpen::stream(
        Some("stream-1"),
        vec![chunk(&["Hello"]), chunk(&[" world", "[END_OF_STREAM]"])],
    )));

    let outcome = controller.send("hi").await;

    assert_eq!(outcome, Ok(SessionOutcome::Completed { recovered: false }));
    assert_eq!(
        transcript(&controller),
        vec![
            line(Origin::User, "> hi"),
            line(Origin::Ai, ""),
            line(Origin::Ai, "◆ Hello world"),
            line(Origin::Ai, ""),
        ]
    );
    assert_eq!(
        controller.transport().opens(),
        vec![OpenRecord::Chat(ChatRequest::new(
            "hi",
            Some("thread-1".to_string())
        ))]
    );
    assert_eq!(controller.transport().released_count(), 1);

    let handle = controller.handle();
    assert_eq!(handle.state(), SessionState::Idle);
    assert!(!handle.is_busy());
    assert!(!handle.cancel(), "no attempt remains after the turn");
}

#[tokio::test(start_paused = true)]
async fn stall_with_resume_token_recovers_once_without_second_marker() {
    let controller = controller(
        ScriptedTransport::new()
            .with_chat(ScriptedOpen::stream(
                Some("stream-1"),
                vec![chunk(&["Hel"]), ScriptStep::Stall],
            ))
            .with_resume(ScriptedOpen::stream(
                None,
                vec![chunk(&["lo", "[END_OF_STREAM]"])],
            )),
    );

    let outcome = controller.send("hi").await;

    assert_eq!(outcome, Ok(SessionOutcome::Completed { recovered: true }));
    let lines = transcript(&controller);
    assert_eq!(
        lines,
        vec![
            line(Origin::User, "> hi"),
            line(Origin::Ai, ""),
            line(Origin::Ai, "◆ Hel"),
            line(Origin::System, ""),
            line(Origin::System, "... "),
            line(Origin::Ai, "lo"),
            line(Origin::Ai, ""),
        ]
    );
    assert_eq!(marker_count(&lines), 1);
    assert_eq!(
        controller.transport().opens()[1],
        OpenRecord::Resume("stream-1".to_string())
    );
    assert_eq!(controller.transport().released_count(), 2);
    assert!(!controller.handle().is_busy());
}

#[tokio::test(start_paused = true)]
async fn stall_before_resume_token_fails_without_recovery() {
    let controller = controller(
        ScriptedTransport::new().with_chat(ScriptedOpen::stream(None, vec![ScriptStep::Stall])),
    );

    let outcome = controller.send("hi").await;

    assert_eq!(
        outcome,
        Ok(SessionOutcome::ConnectionFailed(
            CONNECTION_ERROR_NOTICE.to_string()
        ))
    );
    assert_eq!(controller.transport().opens().len(), 1);
    assert_eq!(
        transcript(&controller),
        vec![
            line(Origin::User, "> hi"),
            line(Origin::Ai, ""),
            line(Origin::System, CONNECTION_ERROR_NOTICE),
            line(Origin::System, ""),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn stalled_open_is_covered_by_the_watchdog() {
    let controller = controller(ScriptedTransport::new().with_chat(ScriptedOpen::Stall));

    let outcome = controller.send("hi").await;

    assert_eq!(
        outcome,
        Ok(SessionOutcome::ConnectionFailed(
            CONNECTION_ERROR_NOTICE.to_string()
        ))
    );
    assert_eq!(controller.transport().released_count(), 0);
    assert_eq!(controller.handle().state(), SessionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn failed_resume_reports_recovery_failure() {
    let controller = controller(
        ScriptedTransport::new()
            .with_chat(ScriptedOpen::stream(
                Some("stream-1"),
                vec![chunk(&["partial"]), ScriptStep::Stall],
            ))
            .with_resume(ScriptedOpen::Fail(TransportError::Status {
                status: 404,
                message: "Not Found".to_string(),
            })),
    );

    let outcome = controller.send("hi").await;

    assert_eq!(outcome, Ok(SessionOutcome::RecoveryFailed));
    let lines = transcript(&controller);
    assert_eq!(
        &lines[lines.len() - 2..],
        &[
            line(Origin::System, &format!("... {RECOVERY_FAILED_NOTICE}")),
            line(Origin::System, ""),
        ]
    );
    assert!(!controller.handle().is_busy());
}

#[tokio::test(start_paused = true)]
async fn resume_that_stalls_again_is_not_retried() {
    let controller = controller(
        ScriptedTransport::new()
            .with_chat(ScriptedOpen::stream(
                Some("stream-1"),
                vec![chunk(&["a"]), ScriptStep::Stall],
            ))
            .with_resume(ScriptedOpen::stream(
                Some("stream-2"),
                vec![chunk(&["b"]), ScriptStep::Stall],
            )),
    );

    let outcome = controller.send("hi").await;

    assert_eq!(outcome, Ok(SessionOutcome::RecoveryFailed));
    assert_eq!(controller.transport().opens().len(), 2);
    assert_eq!(controller.transport().released_count(), 2);
}

#[tokio::test]
async fn backend_signal_ends_turn_as_system_text() {
    let controller = controller(ScriptedTransport::new().with_chat(ScriptedOpen::stream(
        Some("stream-1"),
        vec![chunk(&[
            "partial",
            "[Error: Potentially malicious content detected]",
            "never shown",
        ])],
    )));

    let outcome = controller.send("hi").await;

    assert_eq!(outcome, Ok(SessionOutcome::Signalled(SignalKind::Error)));
    let lines = transcript(&controller);
    assert_eq!(
        &lines[2..],
        &[
            line(Origin::Ai, "◆ partial"),
            line(Origin::System, "[Error: Potentially malicious content detected]"),
            line(Origin::System, ""),
            line(Origin::Ai, ""),
        ]
    );
    assert_eq!(controller.transport().opens().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn signal_during_recovery_ends_like_primary_signal() {
    let controller = controller(
        ScriptedTransport::new()
            .with_chat(ScriptedOpen::stream(
                Some("stream-1"),
                vec![chunk(&["a"]), ScriptStep::Stall],
            ))
            .with_resume(ScriptedOpen::stream(
                None,
                vec![chunk(&["[Stream timeout: model did not answer]"])],
            )),
    );

    let outcome = controller.send("hi").await;

    assert_eq!(outcome, Ok(SessionOutcome::Signalled(SignalKind::Timeout)));
    let lines = transcript(&controller);
    assert_eq!(
        &lines[lines.len() - 3..],
        &[
            line(Origin::System, "... [Stream timeout: model did not answer]"),
            line(Origin::System, ""),
            line(Origin::Ai, ""),
        ]
    );
}

#[tokio::test]
async fn rejected_request_shows_server_error() {
    let controller = controller(ScriptedTransport::new().with_chat(ScriptedOpen::Fail(
        TransportError::Status {
            status: 429,
            message: "Too Many Requests - Rate limit exceeded.".to_string(),
        },
    )));

    let outcome = controller.send("hi").await;

    let expected = "Server error: 429 Too Many Requests - Rate limit exceeded.";
    assert_eq!(
        outcome,
        Ok(SessionOutcome::ConnectionFailed(expected.to_string()))
    );
    assert_eq!(
        &transcript(&controller)[2..],
        &[line(Origin::System, expected), line(Origin::System, "")]
    );
}

#[tokio::test]
async fn user_cancel_while_streaming_prints_caret_c_and_rejects_concurrent_send() {
    let controller = Arc::new(controller(ScriptedTransport::new().with_chat(
        ScriptedOpen::stream(Some("stream-1"), vec![chunk(&["partial"]), ScriptStep::Stall]),
    )));
    let handle = controller.handle();
    let mut states = handle.subscribe();

    let turn = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.send("hi").await }
    });

    states
        .wait_for(|state| *state == SessionState::Streaming)
        .await
        .expect("controller alive");
    assert_eq!(controller.send("again").await, Err(SendError::Busy));

    assert!(handle.cancel());
    let outcome = tokio::time::timeout(Duration::from_secs(5), turn)
        .await
        .expect("turn ends promptly")
        .expect("turn task");

    assert_eq!(outcome, Ok(SessionOutcome::Cancelled));
    let lines = transcript(&controller);
    assert_eq!(
        &lines[lines.len() - 2..],
        &[line(Origin::System, CANCELLED_NOTICE), line(Origin::System, "")]
    );
    assert_eq!(controller.transport().opens().len(), 1, "user cancel never recovers");
    assert_eq!(controller.transport().released_count(), 1);
    assert!(!handle.is_busy());
}

#[tokio::test]
async fn blank_message_is_rejected_without_side_effects() {
    let controller = controller(ScriptedTransport::new());

    assert_eq!(controller.send("  \t").await, Err(SendError::EmptyMessage));
    assert!(transcript(&controller).is_empty());
    assert!(controller.transport().opens().is_empty());
}

#[tokio::test]
async fn controller_accepts_a_new_turn_after_each_outcome() {
    let controller = controller(
        ScriptedTransport::new()
            .with_chat(ScriptedOpen::Fail(TransportError::Connect(
                "connection refused".to_string(),
            )))
            .with_chat(ScriptedOpen::stream(
                None,
                vec![chunk(&["ok", "[END_OF_STREAM]"])],
            )),
    );

    assert_eq!(
        controller.send("one").await,
        Ok(SessionOutcome::ConnectionFailed("connection refused".to_string()))
    );
    assert_eq!(
        controller.send("two").await,
        Ok(SessionOutcome::Completed { recovered: false })
    );
}

/// Records every state published after subscription, up to and including the
/// first `Idle`.
fn observe_until_idle(
    mut states: watch::Receiver<SessionState>,
) -> JoinHandle<(Vec<SessionState>, watch::Receiver<SessionState>)> {
    tokio::spawn(async move {
        let mut seen = Vec::new();
        while states.changed().await.is_ok() {
            let state = *states.borrow_and_update();
            seen.push(state);
            if state == SessionState::Idle {
                break;
            }
        }
        (seen, states)
    })
}

#[tokio::test(start_paused = true)]
async fn busy_clears_exactly_once_per_turn() {
    let controller = controller(ScriptedTransport::new().with_chat(ScriptedOpen::stream(
        Some("stream-1"),
        vec![
            ScriptStep::Delay(Duration::from_millis(50)),
            chunk(&["Hello"]),
            ScriptStep::Delay(Duration::from_millis(50)),
            chunk(&["[END_OF_STREAM]"]),
        ],
    )));
    let handle = controller.handle();
    let observer = observe_until_idle(handle.subscribe());

    let outcome = controller.send("hi").await;
    let (seen, states) = observer.await.expect("observer task");

    assert_eq!(outcome, Ok(SessionOutcome::Completed { recovered: false }));
    assert_eq!(seen, vec![SessionState::Sending, SessionState::Streaming, SessionState::Idle]);
    assert!(
        !states.has_changed().expect("handle alive"),
        "no state is published after the turn returns to idle"
    );
    assert!(!handle.is_busy());
}

#[tokio::test(start_paused = true)]
async fn user_cancel_during_recovery_prints_caret_c() {
    let controller = Arc::new(controller(
        ScriptedTransport::new()
            .with_chat(ScriptedOpen::stream(
                Some("stream-1"),
                vec![chunk(&["Hel"]), ScriptStep::Stall],
            ))
            .with_resume(ScriptedOpen::stream(
                None,
                vec![chunk(&["lo"]), ScriptStep::Stall],
            )),
    ));
    let handle = controller.handle();
    let mut states = handle.subscribe();

    let turn = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.send("hi").await }
    });

    states
        .wait_for(|state| *state == SessionState::Recovering)
        .await
        .expect("controller alive");
    assert!(handle.cancel(), "recovery attempt is cancellable");
    let outcome = turn.await.expect("turn task");

    assert_eq!(outcome, Ok(SessionOutcome::Cancelled));
    let lines = transcript(&controller);
    assert_eq!(
        &lines[lines.len() - 3..],
        &[
            line(Origin::Ai, "lo"),
            line(Origin::System, CANCELLED_NOTICE),
            line(Origin::System, ""),
        ]
    );
    assert_eq!(controller.transport().opens().len(), 2);
    assert_eq!(controller.transport().released_count(), 2);
    assert!(!handle.is_busy());
}

#[tokio::test(start_paused = true)]
async fn resume_open_that_stalls_reports_recovery_failure() {
    let controller = controller(
        ScriptedTransport::new()
            .with_chat(ScriptedOpen::stream(
                Some("stream-1"),
                vec![chunk(&["partial"]), ScriptStep::Stall],
            ))
            .with_resume(ScriptedOpen::Stall),
    );

    let outcome = controller.send("hi").await;

    assert_eq!(outcome, Ok(SessionOutcome::RecoveryFailed));
    let lines = transcript(&controller);
    assert_eq!(
        &lines[lines.len() - 2..],
        &[
            line(Origin::System, &format!("... {RECOVERY_FAILED_NOTICE}")),
            line(Origin::System, ""),
        ]
    );
    assert_eq!(
        controller.transport().opens(),
        vec![
            OpenRecord::Chat(ChatRequest::new("hi", Some("thread-1".to_string()))),
            OpenRecord::Resume("stream-1".to_string()),
        ]
    );
    assert_eq!(controller.transport().released_count(), 1);
    assert!(!controller.handle().is_busy());
}
