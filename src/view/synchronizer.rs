//! Keeps a fixed R×C character grid in step with the active document.
//!
//! Layout rules: every byte takes one cell; the line terminator ends a row and
//! takes no cell; a row holds at most `cols` bytes and wraps after that. A full
//! row is always followed by a new row, even when the next byte is the
//! terminator. Bytes outside printable ASCII are shown as `.`.
//!
//! After a single-byte edit only the rows whose layout actually changed are
//! repainted; painting stops at the first row whose end lines up with the old
//! layout shifted by the edit delta.

use crate::model::gap_buffer::{ContentOffset, GapBuffer, LINE_TERMINATOR};
use crate::model::selection::highlighter;
use crate::view::surface::Surface;
use std::ops::Range;

/// Layout of one row starting at some content offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RowLayout {
    len: usize,
    /// The row ends by consuming a terminator.
    terminated: bool,
    /// Start of the following row.
    next: usize,
}

fn layout_row(buffer: &GapBuffer, start: usize, cols: usize) -> RowLayout {
    let mut len = 0;
    let mut terminated = false;
    let mut next = start;
    for byte in buffer.bytes_from(ContentOffset(start)) {
        if len == cols {
            break;
        }
        next += 1;
        if byte == LINE_TERMINATOR {
            terminated = true;
            break;
        }
        len += 1;
    }
    RowLayout {
        len,
        terminated,
        next,
    }
}

fn display_byte(byte: u8) -> u8 {
    if byte.is_ascii_graphic() || byte == b' ' {
        byte
    } else {
        b'.'
    }
}

/// Start of the line holding `offset`, scanning back no further than `floor`.
fn line_start(buffer: &GapBuffer, offset: usize, floor: usize) -> usize {
    let mut k = offset;
    while k > floor && buffer.byte_at(ContentOffset(k - 1)) != Some(LINE_TERMINATOR) {
        k -= 1;
    }
    k
}

/// Which edit a patch follows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edit {
    Insert,
    DeleteLeft,
    DeleteRight,
}

#[derive(Debug, Clone)]
pub struct View {
    rows: usize,
    cols: usize,
    preferred_row: usize,
    window_start: usize,
    row_length: Vec<usize>,
    row_terminated: Vec<bool>,
    cursor: (usize, usize),
}

impl View {
    pub fn new(rows: usize, cols: usize, preferred_row: usize) -> Self {
        let rows = rows.max(1);
        Self {
            rows,
            cols: cols.max(1),
            preferred_row: preferred_row.min(rows - 1),
            window_start: 0,
            row_length: vec![0; rows],
            row_terminated: vec![false; rows],
            cursor: (0, 0),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn window_start(&self) -> usize {
        self.window_start
    }

    pub fn row_lengths(&self) -> &[usize] {
        &self.row_length
    }

    /// Caret position on the grid as `(row, col)`.
    pub fn cursor(&self) -> (usize, usize) {
        self.cursor
    }

    /// Content offset where grid row `row` starts.
    fn row_start(&self, row: usize) -> usize {
        self.window_start
            + (0..row)
                .map(|r| self.row_length[r] + self.row_terminated[r] as usize)
                .sum::<usize>()
    }

    /// Grid position of `offset` in the current layout, if it is on screen.
    fn locate(&self, offset: usize) -> Option<(usize, usize)> {
        if offset < self.window_start {
            return None;
        }
        let mut start = self.window_start;
        for r in 0..self.rows {
            let len = self.row_length[r];
            if offset < start + len || (offset == start + len && len < self.cols) {
                return Some((r, offset - start));
            }
            start += len + self.row_terminated[r] as usize;
        }
        None
    }

    /// Recompute row lengths from `window_start` without painting.
    fn relayout(&mut self, buffer: &GapBuffer) {
        let mut start = self.window_start;
        for r in 0..self.rows {
            let row = layout_row(buffer, start, self.cols);
            self.row_length[r] = row.len;
            self.row_terminated[r] = row.terminated;
            start = row.next;
        }
    }

    fn paint_row(
        &self,
        surface: &mut dyn Surface,
        buffer: &GapBuffer,
        highlight: &dyn Fn(usize) -> bool,
        row: usize,
        start: usize,
        from_col: usize,
    ) {
        let len = self.row_length[row];
        for col in from_col..len {
            let raw = buffer.to_raw(ContentOffset(start + col));
            surface.set_reverse(highlight(raw.0));
            surface.put(row, col, display_byte(buffer.read_at(raw)));
        }
        surface.set_reverse(false);
        surface.clear_to_eol(row, len);
    }

    fn place_cursor(&mut self, surface: &mut dyn Surface, buffer: &GapBuffer) {
        if let Some(pos) = self.locate(buffer.caret().0) {
            self.cursor = pos;
            surface.place_cursor(pos.0, pos.1);
        }
    }

    /// Repaint every row from the current window start.
    pub fn redraw(
        &mut self,
        surface: &mut dyn Surface,
        buffer: &GapBuffer,
        selection: Option<Range<usize>>,
    ) {
        self.window_start = self.window_start.min(buffer.len());
        self.relayout(buffer);
        let highlight = highlighter(selection, buffer.gap_begin(), buffer.free());
        let mut start = self.window_start;
        for r in 0..self.rows {
            self.paint_row(surface, buffer, &highlight, r, start, 0);
            start += self.row_length[r] + self.row_terminated[r] as usize;
        }
        self.place_cursor(surface, buffer);
    }

    /// Repaint everything with the window starting at `window_start`.
    pub fn redraw_at(
        &mut self,
        surface: &mut dyn Surface,
        buffer: &GapBuffer,
        selection: Option<Range<usize>>,
        window_start: usize,
    ) {
        self.window_start = window_start;
        self.redraw(surface, buffer, selection);
    }

    /// Repaint from the current window if the caret is still on it, otherwise
    /// reformat around the caret.
    pub fn refresh(
        &mut self,
        surface: &mut dyn Surface,
        buffer: &GapBuffer,
        selection: Option<Range<usize>>,
    ) {
        self.window_start = self.window_start.min(buffer.len());
        self.relayout(buffer);
        if self.locate(buffer.caret().0).is_some() {
            self.redraw(surface, buffer, selection);
        } else {
            self.full_reformat(surface, buffer, selection);
        }
    }

    /// Choose a window around the caret and repaint everything.
    ///
    /// Scans back at most `rows * cols` bytes for line starts so the caret
    /// lands on the preferred row when enough text precedes it, otherwise on
    /// its natural row counted from the top of the document.
    pub fn full_reformat(
        &mut self,
        surface: &mut dyn Surface,
        buffer: &GapBuffer,
        selection: Option<Range<usize>>,
    ) {
        let caret = buffer.caret().0;
        let floor = caret.saturating_sub(self.rows * self.cols);

        // Row starts of the caret's line, up to and including the caret's row.
        let mut line = line_start(buffer, caret, floor);
        let mut starts = Vec::new();
        let mut start = line;
        loop {
            let row = layout_row(buffer, start, self.cols);
            starts.push(start);
            if caret < start + row.len || (caret == start + row.len && row.len < self.cols) {
                break;
            }
            if row.next == start {
                break;
            }
            start = row.next;
        }

        // Prepend rows of preceding lines until the preferred row is reachable.
        while starts.len() <= self.preferred_row && line > floor {
            let prev = line_start(buffer, line - 1, floor);
            let mut prev_rows = Vec::new();
            let mut s = prev;
            while s < line {
                prev_rows.push(s);
                s = layout_row(buffer, s, self.cols).next;
            }
            prev_rows.extend(starts);
            starts = prev_rows;
            line = prev;
        }

        let caret_index = starts.len() - 1;
        self.window_start = starts[caret_index.saturating_sub(self.preferred_row)];
        tracing::trace!(
            "reformat: caret {} window_start {} ({} rows scanned)",
            caret,
            self.window_start,
            starts.len()
        );
        self.redraw(surface, buffer, selection);
    }

    /// Start of the row before the one starting at `start`, if it can be found.
    ///
    /// Rows inside a line are full, so only a line start needs a scan for the
    /// previous line's start. That scan covers at most `limit` bytes; a longer
    /// line yields `None`.
    fn prev_row_start(&self, buffer: &GapBuffer, start: usize, limit: usize) -> Option<usize> {
        if start == 0 {
            return None;
        }
        if buffer.byte_at(ContentOffset(start - 1)) != Some(LINE_TERMINATOR) {
            return Some(start.saturating_sub(self.cols));
        }
        let end = start - 1;
        let floor = end.saturating_sub(limit);
        let line = line_start(buffer, end, floor);
        if line == floor
            && floor > 0
            && buffer.byte_at(ContentOffset(floor - 1)) != Some(LINE_TERMINATOR)
        {
            return None;
        }
        Some(line + (end - line) / self.cols * self.cols)
    }

    /// Shift the window until the caret is visible and repaint.
    fn scroll_to_caret(
        &mut self,
        surface: &mut dyn Surface,
        buffer: &GapBuffer,
        selection: Option<Range<usize>>,
    ) {
        let caret = buffer.caret().0;
        for _ in 0..self.rows {
            if self.locate(caret).is_some() {
                self.redraw(surface, buffer, selection);
                return;
            }
            if caret < self.window_start {
                // A line above longer than the grid ends in full_reformat.
                match self.prev_row_start(buffer, self.window_start, self.rows * self.cols) {
                    Some(prev) => self.window_start = prev,
                    None => break,
                }
            } else {
                self.window_start = self.row_start(1);
            }
            self.relayout(buffer);
        }
        if self.locate(caret).is_some() {
            self.redraw(surface, buffer, selection);
        } else {
            self.full_reformat(surface, buffer, selection);
        }
    }

    /// Repaint after a one-byte edit at grid position `(row, col)`.
    fn patch(
        &mut self,
        surface: &mut dyn Surface,
        buffer: &GapBuffer,
        edit: Edit,
        row: usize,
        col: usize,
    ) {
        let delta: isize = if edit == Edit::Insert { 1 } else { -1 };
        let highlight = highlighter(None, buffer.gap_begin(), buffer.free());
        let mut start = self.row_start(row);
        let mut old_start = start;
        let mut painted = 0;
        for r in row..self.rows {
            let new = layout_row(buffer, start, self.cols);
            let old_next =
                old_start + self.row_length[r] + self.row_terminated[r] as usize;
            self.row_length[r] = new.len;
            self.row_terminated[r] = new.terminated;
            let from_col = if r == row { col.min(new.len) } else { 0 };
            self.paint_row(surface, buffer, &highlight, r, start, from_col);
            painted += 1;
            if new.next as isize == old_next as isize + delta {
                break;
            }
            start = new.next;
            old_start = old_next;
        }
        tracing::trace!("patched {} row(s) from row {} after {:?}", painted, row, edit);

        if self.locate(buffer.caret().0).is_some() {
            self.place_cursor(surface, buffer);
        } else {
            self.scroll_to_caret(surface, buffer, None);
        }
    }

    /// The byte before the caret was just inserted.
    pub fn patch_after_insert(&mut self, surface: &mut dyn Surface, buffer: &GapBuffer) {
        let (row, col) = self.cursor;
        self.patch(surface, buffer, Edit::Insert, row, col);
    }

    /// The byte after the caret was just deleted.
    pub fn patch_after_delete_right(&mut self, surface: &mut dyn Surface, buffer: &GapBuffer) {
        let (row, col) = self.cursor;
        self.patch(surface, buffer, Edit::DeleteRight, row, col);
    }

    /// The byte before the caret was just deleted.
    ///
    /// At column 0 the deleted byte belonged to the previous row: either its
    /// terminator or, for a full row, its last byte.
    pub fn patch_after_delete_left(&mut self, surface: &mut dyn Surface, buffer: &GapBuffer) {
        match self.cursor {
            (row, col) if col > 0 => self.patch(surface, buffer, Edit::DeleteLeft, row, col - 1),
            (row, _) if row > 0 => {
                let prev = row - 1;
                let col = if self.row_terminated[prev] {
                    self.row_length[prev]
                } else {
                    self.row_length[prev].saturating_sub(1)
                };
                self.patch(surface, buffer, Edit::DeleteLeft, prev, col);
            }
            _ => self.full_reformat(surface, buffer, None),
        }
    }

    /// Update the screen after the caret moved without editing.
    ///
    /// While a selection is live, the rows between the old and new caret
    /// positions are repainted so the highlight follows.
    pub fn after_motion(
        &mut self,
        surface: &mut dyn Surface,
        buffer: &GapBuffer,
        selection: Option<Range<usize>>,
    ) {
        let old_row = self.cursor.0;
        let Some((row, _)) = self.locate(buffer.caret().0) else {
            self.scroll_to_caret(surface, buffer, selection);
            return;
        };
        if selection.is_some() {
            let highlight = highlighter(selection, buffer.gap_begin(), buffer.free());
            for r in old_row.min(row)..=old_row.max(row) {
                let start = self.row_start(r);
                self.paint_row(surface, buffer, &highlight, r, start, 0);
            }
        }
        self.place_cursor(surface, buffer);
    }

    /// Offset of the caret's row start and the caret's column, independent of
    /// the grid.
    fn caret_row(&self, buffer: &GapBuffer) -> (usize, usize) {
        let caret = buffer.caret().0;
        match self.locate(caret) {
            Some((row, col)) => (self.row_start(row), col),
            None => {
                let mut start = line_start(buffer, caret, 0);
                loop {
                    let row = layout_row(buffer, start, self.cols);
                    if caret < start + row.len
                        || (caret == start + row.len && row.len < self.cols)
                        || row.next == start
                    {
                        return (start, caret - start);
                    }
                    start = row.next;
                }
            }
        }
    }

    /// Offset in the row starting at `start` closest to column `col`.
    fn column_in_row(&self, buffer: &GapBuffer, start: usize, col: usize) -> usize {
        let row = layout_row(buffer, start, self.cols);
        let last = if row.len < self.cols {
            row.len
        } else {
            row.len - 1
        };
        start + col.min(last)
    }

    /// Target offset `rows` rows up (negative) or down, keeping the column.
    /// `None` when the caret is already on the first or last row.
    pub fn vertical_target(&self, buffer: &GapBuffer, rows: isize) -> Option<ContentOffset> {
        let (mut start, col) = self.caret_row(buffer);
        let mut moved = 0;
        for _ in 0..rows.unsigned_abs() {
            let next = if rows < 0 {
                self.prev_row_start(buffer, start, usize::MAX)
            } else {
                let row = layout_row(buffer, start, self.cols);
                (row.terminated || row.len == self.cols).then_some(row.next)
            };
            match next {
                Some(s) => {
                    start = s;
                    moved += 1;
                }
                None => break,
            }
        }
        (moved > 0).then(|| ContentOffset(self.column_in_row(buffer, start, col)))
    }

    /// Offset of the start (`end == false`) or end of the caret's row.
    pub fn row_edge(&self, buffer: &GapBuffer, end: bool) -> ContentOffset {
        let (start, _) = self.caret_row(buffer);
        if end {
            ContentOffset(self.column_in_row(buffer, start, self.cols))
        } else {
            ContentOffset(start)
        }
    }
}
