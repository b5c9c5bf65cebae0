//! Anchor/extent selection over content offsets of the active document

use crate::model::gap_buffer::ContentOffset;
use std::ops::Range;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selection {
    /// `None` means no selection.
    bounds: Option<(ContentOffset, ContentOffset)>,
    /// While selecting, the extent follows the caret.
    selecting: bool,
}

impl Selection {
    pub fn none() -> Self {
        Self::default()
    }

    /// A frozen selection over `[anchor, extent)`.
    pub fn span(anchor: ContentOffset, extent: ContentOffset) -> Self {
        Self {
            bounds: Some((anchor, extent)),
            selecting: false,
        }
    }

    pub fn is_selecting(&self) -> bool {
        self.selecting
    }

    pub fn anchor(&self) -> Option<ContentOffset> {
        self.bounds.map(|(anchor, _)| anchor)
    }

    /// Toggle selection mode.
    ///
    /// The first call anchors at the caret; the second freezes the extent at
    /// the caret and leaves selection mode.
    pub fn start_or_extend(&mut self, caret: ContentOffset) {
        if self.selecting {
            if let Some((anchor, _)) = self.bounds {
                self.bounds = Some((anchor, caret));
            }
            self.selecting = false;
        } else {
            self.bounds = Some((caret, caret));
            self.selecting = true;
        }
    }

    /// Follow the caret while in selection mode.
    pub fn track(&mut self, caret: ContentOffset) {
        if self.selecting {
            if let Some((anchor, _)) = self.bounds {
                self.bounds = Some((anchor, caret));
            }
        }
    }

    pub fn clear(&mut self) {
        *self = Self::none();
    }

    /// Order-normalized range, `None` if there is no selection.
    pub fn range(&self) -> Option<Range<usize>> {
        self.bounds.map(|(a, b)| a.0.min(b.0)..a.0.max(b.0))
    }

    /// Normalized range only when it selects at least one byte.
    pub fn non_empty_range(&self) -> Option<Range<usize>> {
        self.range().filter(|r| !r.is_empty())
    }

    /// Whether the selection is a frozen span starting exactly at `offset`.
    pub fn starts_at(&self, offset: ContentOffset) -> bool {
        !self.selecting && self.non_empty_range().is_some_and(|r| r.start == offset.0)
    }
}

/// Build the per-paint highlight predicate over raw storage indices.
///
/// Bytes before the gap sit at their content offset, so they are compared
/// against `[lo, hi)`; bytes after the gap sit `gap_width` further on and are
/// compared against the shifted bounds `[lo + gap_width, hi + gap_width)`.
pub fn highlighter(
    range: Option<Range<usize>>,
    gap_begin: usize,
    gap_width: usize,
) -> impl Fn(usize) -> bool {
    move |raw: usize| match &range {
        None => false,
        Some(r) if raw < gap_begin => raw >= r.start && raw < r.end,
        Some(r) => raw >= r.start + gap_width && raw < r.end + gap_width,
    }
}
