use pretty_assertions::assert_eq;
use term_chat::history::{load_buffer, save_buffer};
use term_chat::{LineBuffer, LineSink, Origin};
use transcript_store::{FileStore, KeyValueStore, TranscriptStore, HISTORY_KEY};

fn sample_buffer() -> LineBuffer {
    let sink = LineSink::new();
    sink.force_break(Origin::User);
    sink.append(Origin::User, "> hello");
    sink.force_break(Origin::Ai);
    sink.mark_structural();
    sink.append(Origin::Ai, "Hi there, 日本語 too.");
    sink.force_break(Origin::System);
    sink.append(Origin::System, "[recovery failed.]");

    let mut buffer = LineBuffer::new();
    buffer.apply_pending(&sink);
    buffer
}

#[test]
fn history_survives_a_restart() {
    let dir = tempfile::tempdir().expect("tempdir");
    let buffer = sample_buffer();

    let mut store = TranscriptStore::new(FileStore::new(dir.path()));
    save_buffer(&mut store, &buffer).expect("save");

    let mut reopened = TranscriptStore::new(FileStore::new(dir.path()));
    let restored = load_buffer(&mut reopened, buffer.cap()).expect("load");

    assert_eq!(restored.to_lines(), buffer.to_lines());
    assert_eq!(restored.total_chars(), buffer.total_chars());
    assert_eq!(
        restored.lines().filter(|line| line.has_marker()).count(),
        1
    );
}

#[test]
fn restored_history_respects_a_smaller_cap() {
    let dir = tempfile::tempdir().expect("tempdir");
    let buffer = sample_buffer();
    let mut store = TranscriptStore::new(FileStore::new(dir.path()));
    save_buffer(&mut store, &buffer).expect("save");

    let restored = load_buffer(&mut store, 20).expect("load");

    assert!(restored.total_chars() <= 20 || restored.len() == 1);
    assert_eq!(
        restored.get(restored.len() - 1).map(|line| line.text()),
        Some("[recovery failed.]".to_string())
    );
}

#[test]
fn legacy_history_starts_empty_and_is_removed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut kv = FileStore::new(dir.path());
    kv.set(HISTORY_KEY, r#"[["> hi"], ["Hello"]]"#).expect("seed");

    let mut store = TranscriptStore::new(kv);
    let restored = load_buffer(&mut store, 1024).expect("load");

    assert!(restored.is_empty());
    assert_eq!(store.kv().get(HISTORY_KEY).expect("read"), None);
}

#[test]
fn empty_buffer_does_not_overwrite_saved_history() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut store = TranscriptStore::new(FileStore::new(dir.path()));
    save_buffer(&mut store, &sample_buffer()).expect("save");

    save_buffer(&mut store, &LineBuffer::new()).expect("save empty");

    let restored = load_buffer(&mut store, 1024).expect("load");
    assert_eq!(restored.len(), 4);
}
