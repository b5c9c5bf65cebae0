//! Streaming load and save between segments and external storage.
//!
//! Loading translates every recognized line terminator (CR, LF, CRLF) to the
//! internal LF and expands tabs. When the active segment runs low on free space
//! the load continues in an overflow segment, so one external file may become a
//! chain of same-named documents. A failed load leaves every segment as it was.
//!
//! Saving streams a document (all parts of a chain, in part order) or a byte
//! range to a sink in fixed-size chunks, and only marks documents saved once
//! every chunk has been written.

use crate::model::document::DocumentHeader;
use crate::model::error::{EditorError, IoOp, Result};
use crate::model::gap_buffer::{ContentOffset, LINE_TERMINATOR};
use crate::model::segment::{SegmentId, SegmentTable};
use crate::services::storage::{OpenMode, Storage, StreamHandle};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Line ending written on save
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LineEnding {
    /// Unix/Linux/Mac format (\n)
    #[default]
    LF,
    /// Windows format (\r\n)
    CRLF,
    /// Old Mac format (\r)
    CR,
}

impl LineEnding {
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            Self::LF => b"\n",
            Self::CRLF => b"\r\n",
            Self::CR => b"\r",
        }
    }
}

/// Knobs for load and save
#[derive(Debug, Clone)]
pub struct IoSettings {
    pub tab_width: usize,
    /// Bytes read per chunk; also the free-space threshold for overflow.
    pub load_chunk_size: usize,
    pub save_chunk_size: usize,
    pub line_ending: LineEnding,
}

impl Default for IoSettings {
    fn default() -> Self {
        Self {
            tab_width: 8,
            load_chunk_size: 1024,
            save_chunk_size: 1024,
            line_ending: LineEnding::LF,
        }
    }
}

/// How loaded bytes land in the document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// The document becomes the file, unmodified, caret at 0. Overflow parts
    /// are split on line boundaries.
    Replace,
    /// The bytes are inserted at the caret and the document is modified.
    Insert,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    /// Bytes read from the source
    pub bytes_read: usize,
    /// Bytes stored after translation
    pub bytes_stored: usize,
    /// Segments that received content, in order; the first is the one that was
    /// active when the load started.
    pub segments: Vec<SegmentId>,
}

/// State kept to undo a failed load.
struct Checkpoint {
    origin: SegmentId,
    header: DocumentHeader,
    content: Vec<u8>,
    caret: ContentOffset,
}

impl Checkpoint {
    fn take(table: &SegmentTable) -> Self {
        let doc = table.current();
        Self {
            origin: table.active(),
            header: doc.header.clone(),
            content: doc.buffer.content(),
            caret: doc.buffer.caret(),
        }
    }

    fn restore(self, table: &mut SegmentTable, allocated: &[SegmentId]) {
        for &id in allocated {
            if let Err(e) = table.release(id) {
                tracing::warn!("rollback could not release segment {}: {}", id, e);
            }
        }
        if let Err(e) = table.activate(self.origin) {
            tracing::warn!("rollback could not reactivate {}: {}", self.origin, e);
            return;
        }
        let doc = table.current_mut();
        doc.header = self.header;
        doc.buffer.reset();
        doc.buffer.insert_slice(&self.content);
        doc.buffer.seek(self.caret);
    }
}

/// Writes translated bytes into the active segment, moving to overflow
/// segments as needed.
struct LoadSink<'a> {
    table: &'a mut SegmentTable,
    mode: LoadMode,
    threshold: usize,
    tab_width: usize,
    column: usize,
    pending_cr: bool,
    overflow_due: bool,
    stored: usize,
    segments: Vec<SegmentId>,
    /// Insert mode: the text that followed the caret, detached from the origin
    /// segment on the first overflow and put back after the inserted bytes.
    tail: Option<Vec<u8>>,
    /// Where the inserted text ends once the tail is back in place.
    resume: Option<(SegmentId, ContentOffset)>,
}

impl LoadSink<'_> {
    fn finish_segment(&mut self) {
        let doc = self.table.current_mut();
        match self.mode {
            LoadMode::Replace => {
                doc.header.modified = false;
                doc.buffer.seek(ContentOffset(0));
            }
            LoadMode::Insert => doc.header.modified = true,
        }
    }

    fn overflow(&mut self) -> Result<()> {
        if self.mode == LoadMode::Insert && self.tail.is_none() {
            let buffer = &mut self.table.current_mut().buffer;
            let (caret, end) = (buffer.caret(), ContentOffset(buffer.len()));
            self.tail = Some(buffer.content_range(caret, end));
            buffer.delete_range(caret, end);
        }
        self.finish_segment();
        let id = self.table.allocate_overflow_segment()?;
        self.segments.push(id);
        self.overflow_due = false;
        Ok(())
    }

    /// Store one byte, moving to an overflow segment first when due.
    fn place(&mut self, byte: u8) -> Result<()> {
        if self.overflow_due || self.table.current().buffer.free() == 0 {
            self.overflow()?;
        }
        self.table.current_mut().buffer.insert(byte);
        Ok(())
    }

    fn emit(&mut self, byte: u8) -> Result<()> {
        self.place(byte)?;
        self.stored += 1;
        if byte == LINE_TERMINATOR {
            self.column = 0;
            if self.mode == LoadMode::Replace && self.low_on_space() {
                self.overflow_due = true;
            }
        } else {
            self.column += 1;
        }
        Ok(())
    }

    /// Put the detached tail back after the inserted text.
    fn reattach_tail(&mut self) -> Result<()> {
        let Some(tail) = self.tail.take() else {
            return Ok(());
        };
        // No more reads follow, so the tail may fill the segment.
        self.overflow_due = false;
        self.resume = Some((self.table.active(), self.table.current().buffer.caret()));
        for &byte in &tail {
            self.place(byte)?;
        }
        Ok(())
    }

    fn low_on_space(&self) -> bool {
        self.table.current().buffer.free() < self.threshold
    }

    fn feed(&mut self, chunk: &[u8]) -> Result<()> {
        for &byte in chunk {
            if std::mem::take(&mut self.pending_cr) && byte == b'\n' {
                continue;
            }
            match byte {
                b'\r' => {
                    self.emit(LINE_TERMINATOR)?;
                    self.pending_cr = true;
                }
                b'\t' => {
                    let spaces = self.tab_width - self.column % self.tab_width;
                    for _ in 0..spaces {
                        self.emit(b' ')?;
                    }
                }
                other => self.emit(other)?,
            }
        }
        if self.low_on_space() {
            self.overflow_due = true;
        }
        Ok(())
    }
}

/// Column of the caret, counted from the previous line terminator.
fn caret_column(table: &SegmentTable) -> usize {
    let buffer = &table.current().buffer;
    let (before, _) = buffer.as_slices();
    before
        .iter()
        .rev()
        .take_while(|&&b| b != LINE_TERMINATOR)
        .count()
}

/// Load `name` into the active document.
///
/// Leaves the segment that was active at the start active again. On any error
/// the documents are restored to their state before the call.
pub fn load(
    table: &mut SegmentTable,
    storage: &dyn Storage,
    name: &str,
    mode: LoadMode,
    settings: &IoSettings,
) -> Result<LoadReport> {
    let mut stream = storage
        .open(name, OpenMode::Read)
        .map_err(|e| EditorError::io(name, IoOp::Open, e))?;

    let checkpoint = Checkpoint::take(table);
    let origin = checkpoint.origin;

    // Older parts of a chain being replaced are dropped once the load succeeds.
    let stale_parts: Vec<SegmentId> = if mode == LoadMode::Replace {
        let header = &table.current().header;
        if header.part > 0 {
            let old_name = header.name.clone();
            table
                .find_parts(&old_name)
                .into_iter()
                .filter(|&id| id != origin)
                .collect()
        } else {
            Vec::new()
        }
    } else {
        Vec::new()
    };

    // Inserting into part k of a chain pushes parts after k further down.
    let later_parts: Vec<SegmentId> = if mode == LoadMode::Insert {
        let header = &table.current().header;
        if header.part > 0 {
            let chain_name = header.name.clone();
            let chain = table.find_parts(&chain_name);
            chain
                .iter()
                .position(|&id| id == origin)
                .map(|at| chain[at + 1..].to_vec())
                .unwrap_or_default()
        } else {
            Vec::new()
        }
    } else {
        Vec::new()
    };

    let column = match mode {
        LoadMode::Replace => {
            let doc = table.current_mut();
            doc.buffer.reset();
            doc.header = DocumentHeader::default();
            doc.header.set_name(name);
            0
        }
        LoadMode::Insert => caret_column(table),
    };

    let mut sink = LoadSink {
        table: &mut *table,
        mode,
        threshold: settings.load_chunk_size,
        tab_width: settings.tab_width.max(1),
        column,
        pending_cr: false,
        overflow_due: false,
        stored: 0,
        segments: vec![origin],
        tail: None,
        resume: None,
    };

    let mut chunk = vec![0u8; settings.load_chunk_size.max(1)];
    let mut bytes_read = 0;
    let outcome: Result<()> = loop {
        let n = match stream.read_chunk(&mut chunk) {
            Ok(0) => break Ok(()),
            Ok(n) => n,
            Err(e) => break Err(EditorError::io(name, IoOp::Read, e)),
        };
        bytes_read += n;
        if let Err(e) = sink.feed(&chunk[..n]) {
            break Err(e);
        }
    };

    if let Err(e) = stream.close() {
        tracing::warn!("closing {} after load: {}", name, e);
    }
    let outcome = outcome.and_then(|()| sink.reattach_tail());

    let LoadSink {
        stored,
        segments,
        resume,
        ..
    } = match outcome {
        Ok(()) => {
            sink.finish_segment();
            sink
        }
        Err(e) => {
            let allocated: Vec<SegmentId> = sink.segments[1..].to_vec();
            tracing::warn!("load of {} failed, rolling back: {}", name, e);
            checkpoint.restore(table, &allocated);
            return Err(e);
        }
    };

    for id in stale_parts {
        table.release(id)?;
    }
    let added = segments.len() - 1;
    if added > 0 {
        for &id in &later_parts {
            table.activate(id)?;
            let header = &mut table.current_mut().header;
            header.part = header.part.saturating_add(added as u8);
        }
    }
    if let Some((id, caret)) = resume {
        table.activate(id)?;
        table.current_mut().buffer.seek(caret);
    }
    table.activate(origin)?;

    tracing::info!(
        "loaded {} ({} bytes read, {} stored) into segments {:?}",
        name,
        bytes_read,
        stored,
        segments
    );
    Ok(LoadReport {
        bytes_read,
        bytes_stored: stored,
        segments,
    })
}

/// Write all of `bytes` to the stream, converting line terminators.
fn write_chunked(
    stream: &mut dyn StreamHandle,
    name: &str,
    bytes: &[u8],
    settings: &IoSettings,
) -> Result<usize> {
    let mut written_total = 0;
    for piece in bytes.chunks(settings.save_chunk_size.max(1)) {
        let converted: Vec<u8> = if settings.line_ending == LineEnding::LF {
            piece.to_vec()
        } else {
            let mut out = Vec::with_capacity(piece.len());
            for &b in piece {
                if b == LINE_TERMINATOR {
                    out.extend_from_slice(settings.line_ending.as_bytes());
                } else {
                    out.push(b);
                }
            }
            out
        };

        let mut done = 0;
        while done < converted.len() {
            let n = stream
                .write_chunk(&converted[done..])
                .map_err(|e| EditorError::io(name, IoOp::Write, e))?;
            if n == 0 {
                return Err(EditorError::ShortWrite {
                    name: name.to_string(),
                    written: written_total + done,
                    expected: written_total + converted.len(),
                });
            }
            done += n;
        }
        written_total += done;
    }
    Ok(written_total)
}

/// Write content `[lo, hi)` of the active document.
fn write_active_range(
    table: &SegmentTable,
    stream: &mut dyn StreamHandle,
    name: &str,
    range: Range<usize>,
    settings: &IoSettings,
) -> Result<usize> {
    let (before, after) = table.current().buffer.as_slices();
    let split = before.len();
    let lo = range.start.min(split + after.len());
    let hi = range.end.min(split + after.len()).max(lo);
    let first = &before[lo.min(split)..hi.min(split)];
    let second = &after[lo.saturating_sub(split)..hi.saturating_sub(split)];
    Ok(write_chunked(stream, name, first, settings)? + write_chunked(stream, name, second, settings)?)
}

/// Save the active document to `name`.
///
/// With `range`, only that byte range of the active segment is exported and
/// no document state changes. Without it, the whole document is written
/// (every part of a multi-part chain, in order) and, once the stream is
/// closed, every part is renamed to `name` and marked unmodified.
///
/// The segment active at the start is active again when this returns.
pub fn save(
    table: &mut SegmentTable,
    storage: &dyn Storage,
    name: &str,
    range: Option<Range<usize>>,
    settings: &IoSettings,
) -> Result<usize> {
    let origin = table.active();
    let parts = match (&range, table.current().header.part) {
        (None, part) if part > 0 => {
            let chain_name = table.current().header.name.clone();
            table.find_parts(&chain_name)
        }
        _ => vec![origin],
    };

    let mut stream = storage
        .open(name, OpenMode::Write)
        .map_err(|e| EditorError::io(name, IoOp::Open, e))?;

    let mut written = 0;
    let mut outcome: Result<()> = Ok(());
    for &id in &parts {
        if let Err(e) = table.activate(id) {
            outcome = Err(e);
            break;
        }
        let range = range
            .clone()
            .unwrap_or(0..table.current().buffer.len());
        match write_active_range(table, stream.as_mut(), name, range, settings) {
            Ok(n) => written += n,
            Err(e) => {
                outcome = Err(e);
                break;
            }
        }
    }

    let closed = stream
        .close()
        .map_err(|e| EditorError::io(name, IoOp::Close, e));
    let committed = outcome.and(closed);
    if let Err(e) = committed {
        tracing::warn!("save of {} failed after {} bytes: {}", name, written, e);
        table.activate(origin)?;
        return Err(e);
    }

    if range.is_none() {
        for &id in &parts {
            table.activate(id)?;
            let header = &mut table.current_mut().header;
            header.set_name(name);
            header.modified = false;
            header.needs_overwrite_confirm = false;
        }
    }
    table.activate(origin)?;

    tracing::info!("saved {} bytes to {} from {} part(s)", written, name, parts.len());
    Ok(written)
}
