//! Fixed-capacity gap buffer.
//!
//! The buffer stores bytes as `[pre-gap content | gap | post-gap content]` in a
//! single allocation whose size never changes. The gap sits at the caret, so
//! inserting or deleting next to the caret is O(1), and moving the caret costs
//! exactly the distance moved.
//!
//! Two kinds of position are used and must not be mixed up:
//! - [`ContentOffset`]: a logical byte position in the text, independent of the gap
//! - [`RawIndex`]: an index into the backing storage, which may point into the gap

/// The single internal line terminator.
pub const LINE_TERMINATOR: u8 = b'\n';

/// Logical byte position in a document's text
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ContentOffset(pub usize);

/// Index into a segment's raw storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct RawIndex(pub usize);

/// A gap buffer over a fixed-size byte array.
///
/// The gap is the half-open range `[gap_begin, gap_end)`. `gap_begin` is the
/// caret's content offset. Text occupies `[0, gap_begin)` and `[gap_end, capacity)`.
#[derive(Debug)]
pub struct GapBuffer {
    data: Box<[u8]>,
    gap_begin: usize,
    gap_end: usize,
}

impl GapBuffer {
    /// Create an empty buffer with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity].into_boxed_slice(),
            gap_begin: 0,
            gap_end: capacity,
        }
    }

    /// Rebuild a buffer from storage and a saved gap position.
    ///
    /// A gap that does not fit the storage (e.g. from a corrupt header) is
    /// replaced by an empty buffer.
    pub fn from_raw_parts(data: Box<[u8]>, gap_begin: usize, gap_end: usize) -> Self {
        if gap_begin <= gap_end && gap_end <= data.len() {
            Self {
                data,
                gap_begin,
                gap_end,
            }
        } else {
            tracing::warn!(
                "discarding invalid gap {}..{} for capacity {}",
                gap_begin,
                gap_end,
                data.len()
            );
            let gap_end = data.len();
            Self {
                data,
                gap_begin: 0,
                gap_end,
            }
        }
    }

    /// Give up the storage and the gap position.
    pub fn into_raw_parts(self) -> (Box<[u8]>, usize, usize) {
        (self.data, self.gap_begin, self.gap_end)
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Total content length (DATASIZE).
    pub fn len(&self) -> usize {
        self.gap_begin + (self.data.len() - self.gap_end)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Free space, i.e. the gap width.
    pub fn free(&self) -> usize {
        self.gap_end - self.gap_begin
    }

    pub fn gap_begin(&self) -> usize {
        self.gap_begin
    }

    pub fn gap_end(&self) -> usize {
        self.gap_end
    }

    /// The caret's content offset.
    pub fn caret(&self) -> ContentOffset {
        ContentOffset(self.gap_begin)
    }

    /// Map a content offset to its raw storage index.
    pub fn to_raw(&self, offset: ContentOffset) -> RawIndex {
        if offset.0 < self.gap_begin {
            RawIndex(offset.0)
        } else {
            RawIndex(offset.0 + self.free())
        }
    }

    /// Map a raw index back to a content offset; `None` inside the gap.
    pub fn to_content(&self, raw: RawIndex) -> Option<ContentOffset> {
        if raw.0 < self.gap_begin {
            Some(ContentOffset(raw.0))
        } else if raw.0 >= self.gap_end && raw.0 < self.data.len() {
            Some(ContentOffset(raw.0 - self.free()))
        } else {
            None
        }
    }

    /// Insert a byte at the caret. Returns `false` when the buffer is full.
    pub fn insert(&mut self, byte: u8) -> bool {
        if self.gap_begin == self.gap_end {
            return false;
        }
        self.data[self.gap_begin] = byte;
        self.gap_begin += 1;
        true
    }

    /// Insert a run of bytes at the caret, all or nothing.
    pub fn insert_slice(&mut self, bytes: &[u8]) -> bool {
        if bytes.len() > self.free() {
            return false;
        }
        self.data[self.gap_begin..self.gap_begin + bytes.len()].copy_from_slice(bytes);
        self.gap_begin += bytes.len();
        true
    }

    /// Delete the byte before the caret (backspace).
    pub fn delete_left(&mut self) -> Option<u8> {
        if self.gap_begin == 0 {
            return None;
        }
        self.gap_begin -= 1;
        Some(self.data[self.gap_begin])
    }

    /// Delete the byte after the caret.
    pub fn delete_right(&mut self) -> Option<u8> {
        if self.gap_end == self.data.len() {
            return None;
        }
        let byte = self.data[self.gap_end];
        self.gap_end += 1;
        Some(byte)
    }

    /// Delete `[lo, hi)` by moving the caret to `lo` and widening the gap over
    /// the range. Returns `false` if the range is not inside the content.
    pub fn delete_range(&mut self, lo: ContentOffset, hi: ContentOffset) -> bool {
        if lo > hi || hi.0 > self.len() {
            return false;
        }
        self.seek(lo);
        self.gap_end += hi.0 - lo.0;
        true
    }

    /// Move the gap so the caret sits at `target`.
    ///
    /// Moves exactly `|target - caret|` bytes. Returns `false` without changing
    /// anything when `target` lies beyond the content.
    pub fn seek(&mut self, target: ContentOffset) -> bool {
        let target = target.0;
        if target > self.len() {
            return false;
        }
        if target < self.gap_begin {
            // Bytes [target, gap_begin) move to just below gap_end.
            let shift = self.gap_begin - target;
            self.data
                .copy_within(target..self.gap_begin, self.gap_end - shift);
            self.gap_begin = target;
            self.gap_end -= shift;
        } else if target > self.gap_begin {
            // Bytes [gap_end, gap_end + shift) move down to gap_begin.
            let shift = target - self.gap_begin;
            self.data
                .copy_within(self.gap_end..self.gap_end + shift, self.gap_begin);
            self.gap_begin += shift;
            self.gap_end += shift;
        }
        true
    }

    /// Read storage directly.
    pub fn read_at(&self, raw: RawIndex) -> u8 {
        self.data[raw.0]
    }

    /// Write storage directly.
    pub fn write_at(&mut self, raw: RawIndex, byte: u8) {
        self.data[raw.0] = byte;
    }

    /// Read the byte at a content offset, looking through the gap.
    pub fn byte_at(&self, offset: ContentOffset) -> Option<u8> {
        if offset.0 >= self.len() {
            return None;
        }
        Some(self.read_at(self.to_raw(offset)))
    }

    /// The two contiguous content regions: before and after the gap.
    pub fn as_slices(&self) -> (&[u8], &[u8]) {
        (&self.data[..self.gap_begin], &self.data[self.gap_end..])
    }

    /// Copy of the logical content.
    pub fn content(&self) -> Vec<u8> {
        let (before, after) = self.as_slices();
        let mut out = Vec::with_capacity(before.len() + after.len());
        out.extend_from_slice(before);
        out.extend_from_slice(after);
        out
    }

    /// Copy of the content in `[lo, hi)`.
    pub fn content_range(&self, lo: ContentOffset, hi: ContentOffset) -> Vec<u8> {
        let hi = hi.0.min(self.len());
        (lo.0..hi)
            .map(|k| self.read_at(self.to_raw(ContentOffset(k))))
            .collect()
    }

    /// Iterate content bytes starting at `from`.
    pub fn bytes_from(&self, from: ContentOffset) -> impl Iterator<Item = u8> + '_ {
        let (before, after) = self.as_slices();
        let skip_before = from.0.min(before.len());
        let skip_after = from.0.saturating_sub(before.len());
        before[skip_before..]
            .iter()
            .chain(after.iter().skip(skip_after))
            .copied()
    }

    /// Drop all content and put the caret at offset 0.
    pub fn reset(&mut self) {
        self.gap_begin = 0;
        self.gap_end = self.data.len();
    }
}
