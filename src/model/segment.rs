//! Segment table: fixed-size storage segments with a single active page.
//!
//! Every segment owns a boxed byte array of the same capacity plus a fixed-size
//! control block. Exactly one segment is active at a time; its bytes are moved
//! out of the table into the current [`Document`] and moved back when another
//! segment is activated. Nothing can hold a reference into two segments at once
//! because all switching goes through `&mut SegmentTable`.
//!
//! Physical slots may be missing (not every slot is present); logical ids
//! `1..=N` always number the present slots contiguously.

use crate::model::document::{Document, DocumentHeader, HEADER_SIZE};
use crate::model::error::{EditorError, Result};
use crate::model::gap_buffer::GapBuffer;

/// Upper bound on physical segment slots.
pub const MAX_SEGMENTS: usize = 128;

/// Logical, 1-based segment id
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SegmentId(pub usize);

impl std::fmt::Display for SegmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug)]
struct Segment {
    header: [u8; HEADER_SIZE],
    /// `None` while the segment is active: the bytes live in the current document.
    bytes: Option<Box<[u8]>>,
}

/// One row of the document listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentEntry {
    pub id: SegmentId,
    pub size: usize,
    pub modified: bool,
    pub part: u8,
    pub name: String,
}

#[derive(Debug)]
pub struct SegmentTable {
    capacity: usize,
    /// Physical slots; `None` for slots that are not present.
    slots: Vec<Option<Segment>>,
    /// Logical index (id - 1) to physical slot.
    logical: Vec<usize>,
    active: SegmentId,
    current: Document,
}

impl SegmentTable {
    /// Create a table where `present[i]` tells whether physical slot `i` exists.
    pub fn new(capacity: usize, present: &[bool]) -> Result<Self> {
        if present.len() > MAX_SEGMENTS {
            return Err(EditorError::TooManySegments {
                requested: present.len(),
                max: MAX_SEGMENTS,
            });
        }
        let empty_header = DocumentHeader::default().encode(0, capacity);
        let mut slots: Vec<Option<Segment>> = present
            .iter()
            .map(|&here| {
                here.then(|| Segment {
                    header: empty_header,
                    bytes: Some(vec![0; capacity].into_boxed_slice()),
                })
            })
            .collect();
        let logical: Vec<usize> = present
            .iter()
            .enumerate()
            .filter_map(|(phys, &here)| here.then_some(phys))
            .collect();

        let first = *logical.first().ok_or(EditorError::NoSegments)?;
        let slot = slots[first].as_mut().ok_or(EditorError::NoSegments)?;
        let bytes = slot.bytes.take().ok_or(EditorError::NoSegments)?;
        let current = Document::new(
            DocumentHeader::default(),
            GapBuffer::from_raw_parts(bytes, 0, capacity),
        );

        tracing::debug!(
            "segment table: {} logical segments over {} slots, capacity {}",
            logical.len(),
            present.len(),
            capacity
        );

        Ok(Self {
            capacity,
            slots,
            logical,
            active: SegmentId(1),
            current,
        })
    }

    /// Create a table with `count` contiguous slots.
    pub fn contiguous(capacity: usize, count: usize) -> Result<Self> {
        Self::new(capacity, &vec![true; count])
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of logical segments.
    pub fn len(&self) -> usize {
        self.logical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logical.is_empty()
    }

    pub fn active(&self) -> SegmentId {
        self.active
    }

    /// Physical slot behind a logical id.
    pub fn physical(&self, id: SegmentId) -> Option<usize> {
        id.0.checked_sub(1).and_then(|i| self.logical.get(i).copied())
    }

    /// The active segment's document.
    pub fn current(&self) -> &Document {
        &self.current
    }

    pub fn current_mut(&mut self) -> &mut Document {
        &mut self.current
    }

    /// Make `id` the active segment.
    ///
    /// The outgoing document's control block and bytes are stored back into its
    /// slot; the incoming slot's bytes become the current gap buffer, positioned
    /// where it was left.
    pub fn activate(&mut self, id: SegmentId) -> Result<()> {
        if id == self.active {
            return Ok(());
        }
        let incoming = self.physical(id).ok_or(EditorError::InvalidSegment(id.0))?;
        let outgoing = self
            .physical(self.active)
            .ok_or(EditorError::InvalidSegment(self.active.0))?;

        let placeholder = Document::new(DocumentHeader::default(), GapBuffer::new(0));
        let Document { header, buffer } = std::mem::replace(&mut self.current, placeholder);
        let (bytes, gap_begin, gap_end) = buffer.into_raw_parts();
        if let Some(slot) = self.slots[outgoing].as_mut() {
            slot.header = header.encode(gap_begin, gap_end);
            slot.bytes = Some(bytes);
        }

        let slot = self.slots[incoming]
            .as_mut()
            .ok_or(EditorError::InvalidSegment(id.0))?;
        let bytes = slot
            .bytes
            .take()
            .ok_or(EditorError::InvalidSegment(id.0))?;
        let (header, gap_begin, gap_end) = DocumentHeader::decode(&slot.header);
        self.current = Document::new(header, GapBuffer::from_raw_parts(bytes, gap_begin, gap_end));

        tracing::debug!(
            "activated segment {} (slot {}), was {} (slot {})",
            id,
            incoming,
            self.active,
            outgoing
        );
        self.active = id;
        Ok(())
    }

    /// Whether a segment holds nothing, judged from its stored control block.
    fn is_unused(&self, id: SegmentId) -> bool {
        if id == self.active {
            return self.current.is_unused();
        }
        let Some(slot) = self.physical(id).and_then(|p| self.slots[p].as_ref()) else {
            return false;
        };
        let (header, gap_begin, gap_end) = DocumentHeader::decode(&slot.header);
        header.name.is_empty()
            && !header.modified
            && gap_begin == 0
            && gap_end == self.capacity
    }

    /// Continue the current document in a fresh segment.
    ///
    /// Picks the next unused id (searching upward from the active one, then from
    /// 1), gives it the current name and the next part number, and activates it.
    /// A standalone document becomes part 1 of the chain first.
    pub fn allocate_overflow_segment(&mut self) -> Result<SegmentId> {
        let count = self.len();
        let start = self.active.0;
        let next = (start + 1..=count)
            .chain(1..start)
            .map(SegmentId)
            .find(|&id| self.is_unused(id))
            .ok_or(EditorError::OutOfSegments)?;

        if self.current.header.part == 0 {
            self.current.header.part = 1;
        }
        let name = self.current.header.name.clone();
        let part = self.current.header.part.saturating_add(1);

        self.activate(next)?;
        self.current.header = DocumentHeader {
            name,
            part,
            ..DocumentHeader::default()
        };
        tracing::info!(
            "allocated overflow segment {} as part {} of {:?}",
            next,
            part,
            self.current.header.name
        );
        Ok(next)
    }

    /// Reset a segment to the unused state.
    pub fn release(&mut self, id: SegmentId) -> Result<()> {
        if id == self.active {
            self.current.header = DocumentHeader::default();
            self.current.buffer.reset();
            return Ok(());
        }
        let phys = self.physical(id).ok_or(EditorError::InvalidSegment(id.0))?;
        let empty = DocumentHeader::default().encode(0, self.capacity);
        if let Some(slot) = self.slots[phys].as_mut() {
            slot.header = empty;
        }
        Ok(())
    }

    /// Lazily enumerate all segments.
    ///
    /// Each step activates the next segment to read its control block; the
    /// originally active segment is reactivated when the listing is dropped.
    pub fn list(&mut self) -> DocumentList<'_> {
        let origin = self.active;
        DocumentList {
            table: self,
            origin,
            next: 1,
        }
    }

    /// Ids of the segments forming the named multi-part chain, in part order.
    pub fn find_parts(&mut self, name: &str) -> Vec<SegmentId> {
        let mut parts: Vec<(u8, SegmentId)> = self
            .list()
            .filter(|entry| entry.part > 0 && entry.name == name)
            .map(|entry| (entry.part, entry.id))
            .collect();
        parts.sort();
        parts.into_iter().map(|(_, id)| id).collect()
    }
}

/// Restartable listing over all segments; see [`SegmentTable::list`].
#[derive(Debug)]
pub struct DocumentList<'a> {
    table: &'a mut SegmentTable,
    origin: SegmentId,
    next: usize,
}

impl DocumentList<'_> {
    /// Start again from the first segment.
    pub fn restart(&mut self) {
        self.next = 1;
    }
}

impl Iterator for DocumentList<'_> {
    type Item = DocumentEntry;

    fn next(&mut self) -> Option<DocumentEntry> {
        if self.next > self.table.len() {
            return None;
        }
        let id = SegmentId(self.next);
        self.next += 1;
        if let Err(e) = self.table.activate(id) {
            tracing::warn!("listing could not activate segment {}: {}", id, e);
            return None;
        }
        let doc = self.table.current();
        Some(DocumentEntry {
            id,
            size: doc.buffer.len(),
            modified: doc.header.modified,
            part: doc.header.part,
            name: doc.header.name.clone(),
        })
    }
}

impl Drop for DocumentList<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.table.activate(self.origin) {
            tracing::warn!("could not restore segment {}: {}", self.origin, e);
        }
    }
}
