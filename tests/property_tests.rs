// Property-based tests using proptest
// These tests generate random sequences of operations and verify invariants

use proptest::prelude::*;
use segedit::model::gap_buffer::{ContentOffset, GapBuffer};
use segedit::model::segment::SegmentTable;
use segedit::services::load_save::{self, IoSettings, LineEnding, LoadMode};
use segedit::services::storage::MemoryStorage;
use segedit::session::{EditorSession, SessionOptions};
use segedit::view::surface::GridSurface;
use segedit::view::synchronizer::View;

/// Generate random edit operations
#[derive(Debug, Clone)]
enum EditOp {
    Type(u8),
    Backspace,
    Delete,
    Left,
    Right,
    Up,
    Down,
    Home,
    End,
    PageUp,
    PageDown,
}

impl EditOp {
    fn apply(&self, session: &mut EditorSession) {
        match self {
            Self::Type(byte) => {
                session.insert_byte(*byte);
            }
            Self::Backspace => {
                session.delete_left();
            }
            Self::Delete => {
                session.delete_right();
            }
            Self::Left => {
                session.move_left();
            }
            Self::Right => {
                session.move_right();
            }
            Self::Up => {
                session.move_up();
            }
            Self::Down => {
                session.move_down();
            }
            Self::Home => {
                session.row_start();
            }
            Self::End => {
                session.row_end();
            }
            Self::PageUp => {
                session.page_up();
            }
            Self::PageDown => {
                session.page_down();
            }
        }
    }
}

/// Strategy for generating random edit operations
fn edit_op_strategy() -> impl Strategy<Value = EditOp> {
    prop_oneof![
        // Typing operations (more common)
        6 => (b' '..=b'~').prop_map(EditOp::Type),
        2 => Just(EditOp::Type(b'\n')),
        // Navigation operations
        1 => Just(EditOp::Left),
        1 => Just(EditOp::Right),
        1 => Just(EditOp::Up),
        1 => Just(EditOp::Down),
        1 => Just(EditOp::Home),
        1 => Just(EditOp::End),
        1 => Just(EditOp::PageUp),
        1 => Just(EditOp::PageDown),
        // Editing operations
        2 => Just(EditOp::Backspace),
        2 => Just(EditOp::Delete),
    ]
}

/// Gap buffer operations checked against a plain vector
#[derive(Debug, Clone)]
enum BufferOp {
    Insert(u8),
    DeleteLeft,
    DeleteRight,
    Seek(usize),
}

fn buffer_op_strategy() -> impl Strategy<Value = BufferOp> {
    prop_oneof![
        4 => any::<u8>().prop_map(BufferOp::Insert),
        1 => Just(BufferOp::DeleteLeft),
        1 => Just(BufferOp::DeleteRight),
        2 => (0usize..64).prop_map(BufferOp::Seek),
    ]
}

const ROWS: usize = 5;
const COLS: usize = 8;

fn small_session() -> EditorSession {
    let options = SessionOptions {
        segment_capacity: 200,
        slots: vec![true],
        preferred_row: 2,
        clipboard_file: "clip".to_string(),
        io: IoSettings::default(),
    };
    EditorSession::new(
        options,
        Box::new(MemoryStorage::new()),
        GridSurface::new(ROWS, COLS),
    )
    .unwrap()
}

/// Repaint the session's window from scratch and compare.
fn assert_view_consistent(session: &EditorSession) -> Result<(), TestCaseError> {
    let view = session.view();
    let buffer = &session.document().buffer;
    let mut fresh_surface = GridSurface::new(ROWS, COLS);
    let mut fresh = View::new(ROWS, COLS, 2);
    fresh.redraw_at(&mut fresh_surface, buffer, None, view.window_start());

    prop_assert_eq!(session.surface().lines(), fresh_surface.lines());
    prop_assert_eq!(view.row_lengths(), fresh.row_lengths());
    prop_assert_eq!(view.cursor(), fresh.cursor());
    prop_assert_eq!(session.surface().cursor(), view.cursor());
    prop_assert!(view.cursor().0 < ROWS);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Incremental patches leave the same screen as a full repaint
    #[test]
    fn prop_view_matches_full_redraw(ops in prop::collection::vec(edit_op_strategy(), 1..120)) {
        let mut session = small_session();
        for op in &ops {
            op.apply(&mut session);
            assert_view_consistent(&session)?;
        }
    }

    /// The gap buffer behaves like a vector with a cursor
    #[test]
    fn prop_gap_buffer_matches_model(ops in prop::collection::vec(buffer_op_strategy(), 0..200)) {
        let capacity = 48;
        let mut buffer = GapBuffer::new(capacity);
        let mut model: Vec<u8> = Vec::new();
        let mut caret = 0usize;

        for op in &ops {
            match *op {
                BufferOp::Insert(byte) => {
                    let fits = model.len() < capacity;
                    prop_assert_eq!(buffer.insert(byte), fits);
                    if fits {
                        model.insert(caret, byte);
                        caret += 1;
                    }
                }
                BufferOp::DeleteLeft => {
                    let expected = caret.checked_sub(1).map(|k| model.remove(k));
                    if expected.is_some() {
                        caret -= 1;
                    }
                    prop_assert_eq!(buffer.delete_left(), expected);
                }
                BufferOp::DeleteRight => {
                    let expected = (caret < model.len()).then(|| model.remove(caret));
                    prop_assert_eq!(buffer.delete_right(), expected);
                }
                BufferOp::Seek(target) => {
                    let valid = target <= model.len();
                    prop_assert_eq!(buffer.seek(ContentOffset(target)), valid);
                    if valid {
                        caret = target;
                    }
                }
            }

            prop_assert_eq!(buffer.content(), model.clone());
            prop_assert_eq!(buffer.caret(), ContentOffset(caret));
            prop_assert_eq!(buffer.len() + buffer.free(), capacity);
            prop_assert!(buffer.gap_begin() <= buffer.gap_end());
        }
    }

    /// Loading then saving reproduces LF text, however it was chunked or split
    #[test]
    fn prop_load_save_round_trip(
        text in "[a-z ]{0,20}(\n[a-z ]{0,20}){0,14}",
        load_chunk in 1usize..16,
        save_chunk in 1usize..16,
    ) {
        let storage = MemoryStorage::new();
        storage.insert_file("src", text.clone().into_bytes());
        let settings = IoSettings {
            tab_width: 8,
            load_chunk_size: load_chunk,
            save_chunk_size: save_chunk,
            line_ending: LineEnding::LF,
        };
        let mut table = SegmentTable::contiguous(64, 16).unwrap();

        let report = load_save::load(&mut table, &storage, "src", LoadMode::Replace, &settings).unwrap();
        prop_assert_eq!(report.bytes_stored, text.len());

        let written = load_save::save(&mut table, &storage, "dst", None, &settings).unwrap();
        prop_assert_eq!(written, text.len());
        prop_assert_eq!(storage.file("dst").unwrap(), text.into_bytes());
    }
}
