//! Editor session: the segment table, the view and the clipboard wired
//! together behind the operations the front end invokes.
//!
//! Every operation leaves the view in step with the active document before it
//! returns. Refusals (a full segment, motion past either end, cut with nothing
//! selected) are not errors; they raise an alert the front end turns into a
//! bell.

use crate::config::Config;
use crate::model::document::Document;
use crate::model::error::{EditorError, Result};
use crate::model::gap_buffer::{ContentOffset, GapBuffer};
use crate::model::search::{search_or_replace, ReplaceDecision, SearchOutcome};
use crate::model::segment::{DocumentEntry, SegmentId, SegmentTable};
use crate::model::selection::Selection;
use crate::services::load_save::{self, IoSettings, LoadMode, LoadReport};
use crate::services::storage::Storage;
use crate::view::surface::{GridSurface, Surface};
use crate::view::synchronizer::View;
use std::ops::Range;

/// Everything needed to build a session
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub segment_capacity: usize,
    /// Physical slot presence
    pub slots: Vec<bool>,
    pub preferred_row: usize,
    pub clipboard_file: String,
    pub io: IoSettings,
}

impl From<&Config> for SessionOptions {
    fn from(config: &Config) -> Self {
        Self {
            segment_capacity: config.segment_capacity,
            slots: config.slot_layout(),
            preferred_row: config.preferred_row,
            clipboard_file: config.clipboard_file.clone(),
            io: config.io_settings(),
        }
    }
}

pub struct EditorSession<S: Surface = GridSurface> {
    table: SegmentTable,
    view: View,
    surface: S,
    storage: Box<dyn Storage>,
    selection: Selection,
    io: IoSettings,
    clipboard_file: String,
    /// Name awaiting a repeated save before it is overwritten
    pending_overwrite: Option<String>,
    preferred_row: usize,
    alerts: usize,
    status: Option<String>,
}

impl<S: Surface> EditorSession<S> {
    pub fn new(options: SessionOptions, storage: Box<dyn Storage>, surface: S) -> Result<Self> {
        let table = SegmentTable::new(options.segment_capacity, &options.slots)?;
        let (rows, cols) = surface.size();
        let mut session = Self {
            table,
            view: View::new(rows, cols, options.preferred_row),
            surface,
            storage,
            selection: Selection::none(),
            io: options.io,
            clipboard_file: options.clipboard_file,
            pending_overwrite: None,
            preferred_row: options.preferred_row,
            alerts: 0,
            status: None,
        };
        session.reformat();
        Ok(session)
    }

    pub fn document(&self) -> &Document {
        self.table.current()
    }

    pub fn active(&self) -> SegmentId {
        self.table.active()
    }

    pub fn segment_count(&self) -> usize {
        self.table.len()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Whether any alert was raised since the last call.
    pub fn take_alert(&mut self) -> bool {
        std::mem::take(&mut self.alerts) > 0
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status = Some(message.into());
    }

    pub fn clear_status(&mut self) {
        self.status = None;
    }

    /// Swap in a surface of a new size and lay the window out again.
    pub fn resize(&mut self, surface: S) {
        let (rows, cols) = surface.size();
        self.surface = surface;
        self.view = View::new(rows, cols, self.preferred_row);
        self.reformat();
    }

    fn alert(&mut self, reason: &str) {
        tracing::debug!("alert: {}", reason);
        self.alerts += 1;
    }

    fn highlight(&self) -> Option<Range<usize>> {
        self.selection.non_empty_range()
    }

    fn reformat(&mut self) {
        let highlight = self.highlight();
        self.view
            .full_reformat(&mut self.surface, &self.table.current().buffer, highlight);
    }

    fn refresh(&mut self) {
        let highlight = self.highlight();
        self.view
            .refresh(&mut self.surface, &self.table.current().buffer, highlight);
    }

    /// Drop the selection before a mutation; true if a highlight was on screen.
    fn drop_selection(&mut self) -> bool {
        let visible = self.highlight().is_some();
        self.selection.clear();
        visible
    }

    // ------------------------------------------------------------------
    // Editing
    // ------------------------------------------------------------------

    /// Insert one byte at the caret.
    pub fn insert_byte(&mut self, byte: u8) -> bool {
        let repaint = self.drop_selection();
        let doc = self.table.current_mut();
        if !doc.buffer.insert(byte) {
            if repaint {
                self.refresh();
            }
            self.alert("segment full");
            return false;
        }
        doc.mark_modified();
        if repaint {
            self.refresh();
        } else {
            self.view
                .patch_after_insert(&mut self.surface, &self.table.current().buffer);
        }
        true
    }

    /// Insert a typed character as its UTF-8 bytes.
    pub fn insert_char(&mut self, ch: char) -> bool {
        let mut utf8 = [0u8; 4];
        ch.encode_utf8(&mut utf8)
            .bytes()
            .all(|byte| self.insert_byte(byte))
    }

    /// Insert spaces up to the next tab stop.
    pub fn insert_tab(&mut self) -> bool {
        let width = self.io.tab_width.max(1);
        let spaces = width - self.view.cursor().1 % width;
        (0..spaces).all(|_| self.insert_byte(b' '))
    }

    pub fn delete_left(&mut self) -> bool {
        let repaint = self.drop_selection();
        let doc = self.table.current_mut();
        if doc.buffer.delete_left().is_none() {
            if repaint {
                self.refresh();
            }
            self.alert("start of document");
            return false;
        }
        doc.mark_modified();
        if repaint {
            self.refresh();
        } else {
            self.view
                .patch_after_delete_left(&mut self.surface, &self.table.current().buffer);
        }
        true
    }

    pub fn delete_right(&mut self) -> bool {
        let repaint = self.drop_selection();
        let doc = self.table.current_mut();
        if doc.buffer.delete_right().is_none() {
            if repaint {
                self.refresh();
            }
            self.alert("end of document");
            return false;
        }
        doc.mark_modified();
        if repaint {
            self.refresh();
        } else {
            self.view
                .patch_after_delete_right(&mut self.surface, &self.table.current().buffer);
        }
        true
    }

    // ------------------------------------------------------------------
    // Motion
    // ------------------------------------------------------------------

    /// Move the caret to `target`, or alert when there is nowhere to go.
    fn move_to(&mut self, target: Option<ContentOffset>) -> bool {
        let moved = match target {
            Some(offset) => self.table.current_mut().buffer.seek(offset),
            None => false,
        };
        if !moved {
            self.alert("cannot move there");
            return false;
        }
        self.selection.track(self.table.current().buffer.caret());
        let highlight = self.highlight();
        self.view
            .after_motion(&mut self.surface, &self.table.current().buffer, highlight);
        true
    }

    pub fn move_left(&mut self) -> bool {
        let caret = self.table.current().buffer.caret().0;
        self.move_to(caret.checked_sub(1).map(ContentOffset))
    }

    pub fn move_right(&mut self) -> bool {
        let caret = self.table.current().buffer.caret().0;
        self.move_to(Some(ContentOffset(caret + 1)))
    }

    pub fn move_up(&mut self) -> bool {
        let target = self.view.vertical_target(&self.table.current().buffer, -1);
        self.move_to(target)
    }

    pub fn move_down(&mut self) -> bool {
        let target = self.view.vertical_target(&self.table.current().buffer, 1);
        self.move_to(target)
    }

    pub fn page_up(&mut self) -> bool {
        let rows = self.view.rows().saturating_sub(1).max(1) as isize;
        let target = self.view.vertical_target(&self.table.current().buffer, -rows);
        self.move_to(target)
    }

    pub fn page_down(&mut self) -> bool {
        let rows = self.view.rows().saturating_sub(1).max(1) as isize;
        let target = self.view.vertical_target(&self.table.current().buffer, rows);
        self.move_to(target)
    }

    pub fn row_start(&mut self) -> bool {
        let target = self.view.row_edge(&self.table.current().buffer, false);
        self.move_to(Some(target))
    }

    pub fn row_end(&mut self) -> bool {
        let target = self.view.row_edge(&self.table.current().buffer, true);
        self.move_to(Some(target))
    }

    pub fn document_start(&mut self) -> bool {
        self.move_to(Some(ContentOffset(0)))
    }

    pub fn document_end(&mut self) -> bool {
        let len = self.table.current().buffer.len();
        self.move_to(Some(ContentOffset(len)))
    }

    /// Place the caret anywhere in the document.
    pub fn seek(&mut self, offset: ContentOffset) -> bool {
        self.move_to(Some(offset))
    }

    // ------------------------------------------------------------------
    // Selection and clipboard
    // ------------------------------------------------------------------

    /// Start selecting at the caret, or freeze the selection at the caret.
    pub fn toggle_selection(&mut self) {
        let caret = self.table.current().buffer.caret();
        self.selection.start_or_extend(caret);
        self.refresh();
    }

    fn selected_range(&mut self) -> Option<Range<usize>> {
        let range = self.selection.non_empty_range();
        if range.is_none() {
            self.alert("nothing selected");
        }
        range
    }

    fn export_range(&mut self, name: &str, range: Range<usize>) -> Result<usize> {
        load_save::save(&mut self.table, self.storage.as_ref(), name, Some(range), &self.io)
    }

    /// Copy the selection to the clipboard file.
    pub fn copy(&mut self) -> Result<bool> {
        let Some(range) = self.selected_range() else {
            return Ok(false);
        };
        let clipboard = self.clipboard_file.clone();
        let written = self.export_range(&clipboard, range)?;
        self.selection.clear();
        self.refresh();
        self.set_status(format!("Copied {written} bytes"));
        Ok(true)
    }

    /// Copy the selection to the clipboard file and delete it.
    pub fn cut(&mut self) -> Result<bool> {
        let Some(range) = self.selected_range() else {
            return Ok(false);
        };
        let clipboard = self.clipboard_file.clone();
        let written = self.export_range(&clipboard, range.clone())?;
        let doc = self.table.current_mut();
        doc.buffer
            .delete_range(ContentOffset(range.start), ContentOffset(range.end));
        doc.mark_modified();
        self.selection.clear();
        self.refresh();
        self.set_status(format!("Cut {written} bytes"));
        Ok(true)
    }

    /// Insert the clipboard file at the caret.
    pub fn paste(&mut self) -> Result<LoadReport> {
        let clipboard = self.clipboard_file.clone();
        self.insert_file(&clipboard)
    }

    // ------------------------------------------------------------------
    // Search and replace
    // ------------------------------------------------------------------

    /// Find the next occurrence of `needle`, wrapping once.
    pub fn find(&mut self, needle: &[u8]) -> SearchOutcome {
        self.run_search(needle, None, false, &mut |_, _, _| ReplaceDecision::Replace)
    }

    /// Replace every occurrence without asking.
    pub fn replace_all(&mut self, needle: &[u8], replacement: &[u8]) -> SearchOutcome {
        self.run_search(needle, Some(replacement), false, &mut |_, _, _| {
            ReplaceDecision::Replace
        })
    }

    /// Offer every occurrence to `decide`.
    ///
    /// Before each question the view is repainted with the match selected, so
    /// `decide` can show the surface to the user.
    pub fn query_replace(
        &mut self,
        needle: &[u8],
        replacement: &[u8],
        decide: &mut dyn FnMut(&GapBuffer, &Selection, &S) -> ReplaceDecision,
    ) -> SearchOutcome {
        self.run_search(needle, Some(replacement), true, decide)
    }

    fn run_search(
        &mut self,
        needle: &[u8],
        replacement: Option<&[u8]>,
        ask: bool,
        decide: &mut dyn FnMut(&GapBuffer, &Selection, &S) -> ReplaceDecision,
    ) -> SearchOutcome {
        let view = &mut self.view;
        let surface = &mut self.surface;
        let mut prompt = |buffer: &GapBuffer, selection: &Selection| {
            view.refresh(surface, buffer, selection.non_empty_range());
            decide(buffer, selection, surface)
        };
        let doc = self.table.current_mut();
        let outcome = search_or_replace(
            &mut doc.buffer,
            &mut self.selection,
            needle,
            replacement,
            ask,
            &mut prompt,
        );

        match outcome {
            SearchOutcome::NotFound => {
                self.alert("not found");
                self.set_status("Not found");
            }
            SearchOutcome::Found { wrapped, .. } => {
                if wrapped {
                    self.set_status("Search wrapped");
                }
            }
            SearchOutcome::Finished(summary) => {
                if summary.replaced > 0 {
                    self.table.current_mut().mark_modified();
                }
                if summary.out_of_space {
                    self.alert("replacement does not fit");
                }
                self.set_status(format!(
                    "Replaced {} of {} matches",
                    summary.replaced, summary.matches
                ));
            }
        }
        self.refresh();
        tracing::info!("search {:?}: {:?}", String::from_utf8_lossy(needle), outcome);
        outcome
    }

    // ------------------------------------------------------------------
    // Files
    // ------------------------------------------------------------------

    /// Replace the active document with the contents of `name`.
    pub fn open(&mut self, name: &str) -> Result<LoadReport> {
        let report = load_save::load(
            &mut self.table,
            self.storage.as_ref(),
            name,
            LoadMode::Replace,
            &self.io,
        )?;
        self.selection.clear();
        self.reformat();
        self.set_status(format!(
            "Read {} bytes from {} ({} part(s))",
            report.bytes_read,
            name,
            report.segments.len()
        ));
        Ok(report)
    }

    /// Insert the contents of `name` at the caret.
    pub fn insert_file(&mut self, name: &str) -> Result<LoadReport> {
        self.drop_selection();
        let report = load_save::load(
            &mut self.table,
            self.storage.as_ref(),
            name,
            LoadMode::Insert,
            &self.io,
        )?;
        self.reformat();
        Ok(report)
    }

    /// Save the active document under its own name.
    pub fn save(&mut self) -> Result<usize> {
        let name = self.table.current().header.name.clone();
        if name.is_empty() {
            return Err(EditorError::Unnamed);
        }
        self.save_as(&name, true)
    }

    /// Save the active document (all of its parts) as `name`.
    ///
    /// Saving over a different existing file needs either `force` or a second
    /// call with the same name.
    pub fn save_as(&mut self, name: &str, force: bool) -> Result<usize> {
        let own_name = self.table.current().header.name.clone();
        let confirmed = force || self.pending_overwrite.as_deref() == Some(name);
        if name != own_name && !confirmed && self.storage.exists(name) {
            self.table.current_mut().header.needs_overwrite_confirm = true;
            self.pending_overwrite = Some(name.to_string());
            return Err(EditorError::OverwriteConfirmationRequired {
                name: name.to_string(),
            });
        }
        self.pending_overwrite = None;
        let written = load_save::save(
            &mut self.table,
            self.storage.as_ref(),
            name,
            None,
            &self.io,
        )?;
        self.set_status(format!("Wrote {written} bytes to {name}"));
        Ok(written)
    }

    /// Write the selection to `name` without changing the document.
    pub fn save_selection(&mut self, name: &str) -> Result<usize> {
        let Some(range) = self.selected_range() else {
            return Err(EditorError::NoSelection);
        };
        self.export_range(name, range)
    }

    // ------------------------------------------------------------------
    // Documents
    // ------------------------------------------------------------------

    /// Make segment `id` the active document.
    pub fn switch_to(&mut self, id: SegmentId) -> Result<()> {
        self.table.activate(id)?;
        self.selection.clear();
        self.pending_overwrite = None;
        self.reformat();
        Ok(())
    }

    /// Cycle to the next (`forward`) or previous segment.
    pub fn cycle_document(&mut self, forward: bool) -> Result<()> {
        let count = self.table.len();
        let current = self.table.active().0;
        let next = if forward {
            current % count + 1
        } else {
            (current + count - 2) % count + 1
        };
        self.switch_to(SegmentId(next))
    }

    pub fn list_documents(&mut self) -> Vec<DocumentEntry> {
        self.table.list().collect()
    }

    /// Whether any segment holds unsaved changes.
    pub fn has_unsaved_changes(&mut self) -> bool {
        self.table.list().any(|entry| entry.modified)
    }
}
