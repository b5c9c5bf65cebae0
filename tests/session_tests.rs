// End-to-end tests of the editor session against in-memory and local storage

use segedit::model::error::EditorError;
use segedit::model::gap_buffer::ContentOffset;
use segedit::model::search::SearchOutcome;
use segedit::model::segment::SegmentId;
use segedit::services::load_save::{IoSettings, LineEnding};
use segedit::services::storage::{LocalStorage, MemoryStorage, Storage};
use segedit::session::{EditorSession, SessionOptions};
use segedit::view::surface::GridSurface;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}

fn options(capacity: usize, segments: usize) -> SessionOptions {
    SessionOptions {
        segment_capacity: capacity,
        slots: vec![true; segments],
        preferred_row: 2,
        clipboard_file: "clip".to_string(),
        io: IoSettings {
            tab_width: 8,
            load_chunk_size: 8,
            save_chunk_size: 8,
            line_ending: LineEnding::LF,
        },
    }
}

fn session_on(storage: Box<dyn Storage>, capacity: usize, segments: usize) -> EditorSession {
    EditorSession::new(options(capacity, segments), storage, GridSurface::new(6, 20)).unwrap()
}

fn memory_session(storage: &MemoryStorage) -> EditorSession {
    session_on(Box::new(storage.clone()), 256, 4)
}

fn type_text(session: &mut EditorSession, text: &str) {
    for c in text.chars() {
        assert!(session.insert_char(c), "insert of {c:?} refused");
    }
}

fn content(session: &EditorSession) -> String {
    String::from_utf8(session.document().buffer.content()).unwrap()
}

fn select(session: &mut EditorSession, from: usize, to: usize) {
    assert!(session.seek(ContentOffset(from)));
    session.toggle_selection();
    assert!(session.seek(ContentOffset(to)));
    session.toggle_selection();
}

#[test]
fn test_typing_shows_on_screen() {
    let storage = MemoryStorage::new();
    let mut session = memory_session(&storage);
    type_text(&mut session, "hello\nworld");

    assert_eq!(session.surface().row_text(0).trim_end(), "hello");
    assert_eq!(session.surface().row_text(1).trim_end(), "world");
    assert_eq!(session.surface().cursor(), (1, 5));
    assert!(session.document().header.modified);
}

#[test]
fn test_cut_then_paste_at_start() {
    let storage = MemoryStorage::new();
    let mut session = memory_session(&storage);
    type_text(&mut session, "0123456789");

    select(&mut session, 3, 6);
    assert!(session.cut().unwrap());
    assert_eq!(content(&session), "0126789");
    assert_eq!(storage.file("clip").unwrap(), b"345");
    assert!(session.selection().range().is_none());

    assert!(session.document_start());
    session.paste().unwrap();
    assert_eq!(content(&session), "3450126789");
}

#[test]
fn test_copy_keeps_document() {
    let storage = MemoryStorage::new();
    let mut session = memory_session(&storage);
    type_text(&mut session, "abcdef");

    select(&mut session, 1, 4);
    assert!(session.copy().unwrap());
    assert_eq!(content(&session), "abcdef");
    assert_eq!(storage.file("clip").unwrap(), b"bcd");
}

#[test]
fn test_cut_without_selection_alerts() {
    let storage = MemoryStorage::new();
    let mut session = memory_session(&storage);
    type_text(&mut session, "abc");
    session.take_alert();

    assert!(!session.cut().unwrap());
    assert!(session.take_alert());
    assert_eq!(content(&session), "abc");
    assert!(storage.file("clip").is_none());
}

#[test]
fn test_repeated_search_wraps() {
    let storage = MemoryStorage::new();
    let mut session = memory_session(&storage);
    type_text(&mut session, "ABCXYZABC");
    session.document_start();

    let expected = [(0, false), (6, false), (0, true)];
    for (at, wrapped) in expected {
        assert_eq!(
            session.find(b"ABC"),
            SearchOutcome::Found {
                at: ContentOffset(at),
                wrapped
            }
        );
        assert_eq!(session.document().buffer.caret(), ContentOffset(at));
    }
    assert!(session.surface().is_reversed(0, 0));
    assert!(!session.surface().is_reversed(0, 3));
}

#[test]
fn test_search_not_found_alerts() {
    let storage = MemoryStorage::new();
    let mut session = memory_session(&storage);
    type_text(&mut session, "hello");
    session.take_alert();

    assert_eq!(session.find(b"xyz"), SearchOutcome::NotFound);
    assert!(session.take_alert());
    assert_eq!(session.document().buffer.caret(), ContentOffset(5));
}

#[test]
fn test_search_from_end_wraps_to_start() {
    let storage = MemoryStorage::new();
    let mut session = memory_session(&storage);
    type_text(&mut session, "ABCXYZABC");
    assert_eq!(session.document().buffer.caret(), ContentOffset(9));

    assert_eq!(
        session.find(b"ABC"),
        SearchOutcome::Found {
            at: ContentOffset(0),
            wrapped: true
        }
    );
    assert_eq!(session.document().buffer.caret(), ContentOffset(0));
    assert_eq!(session.status(), Some("Search wrapped"));
    session.take_alert();

    assert_eq!(session.find(b"QQQ"), SearchOutcome::NotFound);
    assert!(session.take_alert());
    assert_eq!(session.document().buffer.caret(), ContentOffset(0));
}

#[test]
fn test_replace_all_with_longer_text() {
    let storage = MemoryStorage::new();
    let mut session = memory_session(&storage);
    type_text(&mut session, "foo bar");
    session.document_start();

    match session.replace_all(b"foo", b"foofoo") {
        SearchOutcome::Finished(summary) => {
            assert_eq!(summary.matches, 1);
            assert_eq!(summary.replaced, 1);
            assert!(!summary.out_of_space);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(content(&session), "foofoo bar");
    assert_eq!(session.surface().row_text(0).trim_end(), "foofoo bar");
}

#[test]
fn test_open_and_save_round_trip() {
    let storage = MemoryStorage::new();
    storage.insert_file("notes", b"one\r\ntwo\r\n".to_vec());
    let mut session = memory_session(&storage);

    let report = session.open("notes").unwrap();
    assert_eq!(report.bytes_read, 10);
    assert_eq!(content(&session), "one\ntwo\n");
    assert_eq!(session.document().header.name, "notes");
    assert!(!session.document().header.modified);

    session.document_end();
    type_text(&mut session, "three\n");
    assert!(session.document().header.modified);

    assert_eq!(session.save().unwrap(), 14);
    assert_eq!(storage.file("notes").unwrap(), b"one\ntwo\nthree\n");
    assert!(!session.document().header.modified);
}

#[test]
fn test_save_unnamed_document_needs_a_name() {
    let storage = MemoryStorage::new();
    let mut session = memory_session(&storage);
    type_text(&mut session, "draft");

    assert!(matches!(session.save(), Err(EditorError::Unnamed)));
    assert!(session.document().header.modified);
}

#[test]
fn test_overwrite_needs_confirmation() {
    let storage = MemoryStorage::new();
    storage.insert_file("taken", b"precious".to_vec());
    let mut session = memory_session(&storage);
    type_text(&mut session, "x");

    let err = session.save_as("taken", false).unwrap_err();
    assert!(matches!(err, EditorError::OverwriteConfirmationRequired { ref name } if name == "taken"));
    assert!(session.document().header.needs_overwrite_confirm);
    assert_eq!(storage.file("taken").unwrap(), b"precious");

    assert_eq!(session.save_as("taken", false).unwrap(), 1);
    assert_eq!(storage.file("taken").unwrap(), b"x");
    let header = &session.document().header;
    assert_eq!(header.name, "taken");
    assert!(!header.modified);
    assert!(!header.needs_overwrite_confirm);
}

#[test]
fn test_forced_save_skips_confirmation() {
    let storage = MemoryStorage::new();
    storage.insert_file("taken", b"precious".to_vec());
    let mut session = memory_session(&storage);
    type_text(&mut session, "new");

    assert_eq!(session.save_as("taken", true).unwrap(), 3);
    assert_eq!(storage.file("taken").unwrap(), b"new");
}

#[test]
fn test_failed_load_leaves_document_unchanged() {
    let storage = MemoryStorage::new();
    storage.insert_file("flaky", b"0123456789abcdefghij".to_vec());
    storage.fail_reads_after(1);
    let mut session = memory_session(&storage);
    type_text(&mut session, "hello");

    assert!(matches!(session.open("flaky"), Err(EditorError::Io { .. })));
    assert_eq!(content(&session), "hello");
    assert_eq!(session.document().header.name, "");
    assert_eq!(session.document().buffer.caret(), ContentOffset(5));
}

#[test]
fn test_open_missing_file() {
    let storage = MemoryStorage::new();
    let mut session = memory_session(&storage);
    type_text(&mut session, "keep");

    assert!(matches!(session.open("ghost"), Err(EditorError::NotFound { .. })));
    assert_eq!(content(&session), "keep");
}

#[test]
fn test_failed_save_keeps_modified() {
    let storage = MemoryStorage::new();
    storage.fail_writes_after(0);
    let mut session = memory_session(&storage);
    type_text(&mut session, "abc");

    assert!(session.save_as("out", true).is_err());
    let header = &session.document().header;
    assert!(header.modified);
    assert_eq!(header.name, "");
}

#[test]
fn test_save_selection_exports_only() {
    let storage = MemoryStorage::new();
    let mut session = memory_session(&storage);
    type_text(&mut session, "hello world");

    select(&mut session, 0, 5);
    assert_eq!(session.save_selection("part").unwrap(), 5);
    assert_eq!(storage.file("part").unwrap(), b"hello");
    assert!(session.document().header.modified);
    assert_eq!(session.document().header.name, "");
}

#[test]
fn test_save_selection_requires_selection() {
    let storage = MemoryStorage::new();
    let mut session = memory_session(&storage);
    type_text(&mut session, "abc");

    assert!(matches!(
        session.save_selection("part"),
        Err(EditorError::NoSelection)
    ));
    assert!(storage.file("part").is_none());
}

#[test]
fn test_large_file_spans_segments_and_saves_whole() {
    init_tracing();
    let storage = MemoryStorage::new();
    let source: String = (0..10).map(|i| format!("line number {i}\n")).collect();
    storage.insert_file("big", source.clone().into_bytes());
    let mut session = session_on(Box::new(storage.clone()), 48, 8);

    let report = session.open("big").unwrap();
    assert!(report.segments.len() > 1);
    assert_eq!(session.active(), SegmentId(1));
    assert_eq!(session.document().header.part, 1);

    let parts: Vec<_> = session
        .list_documents()
        .into_iter()
        .filter(|entry| entry.name == "big")
        .collect();
    assert_eq!(parts.len(), report.segments.len());
    assert_eq!(parts.iter().map(|entry| entry.size).sum::<usize>(), source.len());

    assert_eq!(session.save().unwrap(), source.len());
    assert_eq!(storage.file("big").unwrap(), source.as_bytes());
}

#[test]
fn test_boundaries_raise_alerts() {
    let storage = MemoryStorage::new();
    let mut session = memory_session(&storage);
    assert!(!session.take_alert());

    assert!(!session.move_left());
    assert!(session.take_alert());
    assert!(!session.take_alert());

    assert!(!session.delete_left());
    assert!(!session.delete_right());
    assert!(session.take_alert());

    type_text(&mut session, "ab");
    assert!(!session.move_right());
    assert!(session.take_alert());
}

#[test]
fn test_full_segment_refuses_insert() {
    let storage = MemoryStorage::new();
    let mut session = session_on(Box::new(storage), 16, 1);
    type_text(&mut session, "0123456789abcdef");
    assert_eq!(session.document().buffer.free(), 0);
    session.take_alert();

    assert!(!session.insert_char('x'));
    assert!(session.take_alert());
    assert_eq!(content(&session), "0123456789abcdef");
}

#[test]
fn test_tab_inserts_spaces_to_next_stop() {
    let storage = MemoryStorage::new();
    let mut session = memory_session(&storage);
    type_text(&mut session, "ab");

    assert!(session.insert_tab());
    assert_eq!(content(&session), "ab      ");
    assert_eq!(session.surface().cursor(), (0, 8));
}

#[test]
fn test_switching_documents_preserves_each() {
    let storage = MemoryStorage::new();
    let mut session = memory_session(&storage);
    type_text(&mut session, "first");
    session.seek(ContentOffset(2));

    session.cycle_document(true).unwrap();
    assert_eq!(session.active(), SegmentId(2));
    assert_eq!(content(&session), "");
    type_text(&mut session, "second");

    session.switch_to(SegmentId(1)).unwrap();
    assert_eq!(content(&session), "first");
    assert_eq!(session.document().buffer.caret(), ContentOffset(2));
    assert_eq!(session.surface().row_text(0).trim_end(), "first");

    session.cycle_document(false).unwrap();
    assert_eq!(session.active(), SegmentId(4));

    let entries = session.list_documents();
    assert_eq!(entries.len(), 4);
    assert_eq!(entries[0].size, 5);
    assert_eq!(entries[1].size, 6);
    assert!(session.has_unsaved_changes());
}

#[test]
fn test_invalid_segment_is_rejected() {
    let storage = MemoryStorage::new();
    let mut session = memory_session(&storage);
    assert!(matches!(
        session.switch_to(SegmentId(9)),
        Err(EditorError::InvalidSegment(9))
    ));
    assert_eq!(session.active(), SegmentId(1));
}

#[test]
fn test_resize_relays_out_window() {
    let storage = MemoryStorage::new();
    let mut session = memory_session(&storage);
    type_text(&mut session, "abcdefghijkl");

    session.resize(GridSurface::new(3, 5));
    assert_eq!(session.view().cols(), 5);
    assert_eq!(session.surface().row_text(0), "abcde");
    assert_eq!(session.surface().row_text(1), "fghij");
    assert_eq!(session.surface().row_text(2).trim_end(), "kl");
    assert_eq!(session.surface().cursor(), (2, 2));
}

#[test]
fn test_local_storage_round_trip() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("notes.txt"), b"a\r\nb\r\n").unwrap();
    let mut session = session_on(Box::new(LocalStorage::with_base(dir.path())), 256, 2);

    session.open("notes.txt").unwrap();
    assert_eq!(content(&session), "a\nb\n");
    session.document_end();
    type_text(&mut session, "c");
    session.save().unwrap();
    assert_eq!(std::fs::read(dir.path().join("notes.txt")).unwrap(), b"a\nb\nc");

    select(&mut session, 0, 3);
    session.copy().unwrap();
    assert_eq!(std::fs::read(dir.path().join("clip")).unwrap(), b"a\nb");
}

/// Part numbers of every segment in the chain called `name`, sorted.
fn chain_parts(session: &mut EditorSession, name: &str) -> Vec<u8> {
    let mut parts: Vec<u8> = session
        .list_documents()
        .into_iter()
        .filter(|entry| entry.name == name && entry.part > 0)
        .map(|entry| entry.part)
        .collect();
    parts.sort_unstable();
    parts
}

#[test]
fn test_paste_overflow_mid_document() {
    init_tracing();
    let storage = MemoryStorage::new();
    let mut session = session_on(Box::new(storage.clone()), 32, 4);
    type_text(&mut session, "HEAD|TAIL");
    session.save_as("doc", true).unwrap();
    assert!(session.seek(ContentOffset(5)));
    storage.insert_file("clip", vec![b'x'; 40]);

    let report = session.paste().unwrap();
    assert_eq!(report.bytes_stored, 40);
    assert_eq!(report.segments.len(), 2);
    assert_eq!(session.active(), SegmentId(1));
    assert!(content(&session).starts_with("HEAD|x"));
    assert!(!content(&session).contains("TAIL"));
    assert_eq!(chain_parts(&mut session, "doc"), vec![1, 2]);

    session.save_as("out", true).unwrap();
    let expected = format!("HEAD|{}TAIL", "x".repeat(40));
    assert_eq!(storage.file("out").unwrap(), expected.into_bytes());
}

#[test]
fn test_paste_at_start_of_chain_keeps_part_order() {
    let storage = MemoryStorage::new();
    let source: String = (0..10).map(|i| format!("line number {i}\n")).collect();
    storage.insert_file("big", source.clone().into_bytes());
    storage.insert_file("clip", vec![b'x'; 40]);
    let mut session = session_on(Box::new(storage.clone()), 48, 8);
    let opened = session.open("big").unwrap();
    assert!(opened.segments.len() > 1);

    assert!(session.document_start());
    let pasted = session.paste().unwrap();
    assert!(pasted.segments.len() > 1);

    let parts = chain_parts(&mut session, "big");
    assert_eq!(parts.len(), opened.segments.len() + pasted.segments.len() - 1);
    assert_eq!(parts, (1..=parts.len() as u8).collect::<Vec<_>>());

    session.save_as("out", true).unwrap();
    let expected = format!("{}{}", "x".repeat(40), source);
    assert_eq!(storage.file("out").unwrap(), expected.into_bytes());
}
